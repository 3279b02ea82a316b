#![cfg(target_arch = "wasm32")]

use sapwood::{children, fragment, keyed, node, web::WebHost, Attrs, RenderOptions, Renderer, Vnode};
use std::sync::Once;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlBodyElement, Node};

wasm_bindgen_test_configure!(run_in_browser);

static LOG: Once = Once::new();

/// A fresh container in the page body, so the test harness' own output stays untouched.
fn container() -> Node {
	LOG.call_once(tracing_wasm::set_as_global_default);

	let document = window().unwrap().document().unwrap();
	let body = document.body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();
	let container = document.create_element("div").unwrap();
	body.append_child(&container).unwrap();
	container.into()
}

fn create_rerender_remove(tree: impl Fn() -> Vnode<WebHost>, html: &str) {
	let target = container();
	let host = WebHost::new().unwrap();
	let renderer = Renderer::new(host);
	let options = RenderOptions::default();
	let html_of = |node: &Node| node.dyn_ref::<web_sys::Element>().unwrap().inner_html();

	renderer.render(&target, tree(), &options).unwrap();
	assert_eq!(html_of(&target), html);
	let first = target.first_child();

	renderer.render(&target, tree(), &options).unwrap();
	assert_eq!(html_of(&target), html);
	assert_eq!(target.first_child(), first);

	renderer.render(&target, (), &options).unwrap();
	assert_eq!(html_of(&target), "");
}

#[wasm_bindgen_test]
fn text() {
	create_rerender_remove(|| sapwood::text("Hello sapwood!"), "Hello sapwood!");
}

#[wasm_bindgen_test]
fn multi() {
	create_rerender_remove(|| fragment(children!["Hello sapwood", " multiple ", "nodes!"]), "Hello sapwood multiple nodes!");
}

#[wasm_bindgen_test]
fn keyed_texts() {
	create_rerender_remove(|| keyed([(0, "Hello sapwood"), (1, " keyed "), (2, "nodes.")], |pair| pair).unwrap(), "Hello sapwood keyed nodes.");
}

#[wasm_bindgen_test]
fn minimal_div() {
	create_rerender_remove(|| node("div", (), ()).unwrap(), "<div></div>");
}

#[wasm_bindgen_test]
fn decorated_div() {
	create_rerender_remove(
		|| node("div#main.box", Attrs::new().set("title", "boxed"), "content").unwrap(),
		r#"<div title="boxed" id="main" class="box">content</div>"#,
	);
}

#[wasm_bindgen_test]
fn minimal_svg() {
	create_rerender_remove(|| node("svg", (), node::<WebHost>("circle", Attrs::new().set("r", 5), ()).unwrap()).unwrap(), r#"<svg><circle r="5"></circle></svg>"#);
}
