use sapwood::{
	children, entry, fragment, gate, inline, keyed, keyed_pairs, layout,
	host::{Host, Prop, SVG_NAMESPACE, XLINK_NAMESPACE},
	mem::{MemoryHost, Mutation},
	node, on_remove, retain, set_context, text, Attrs, Child, Component, Error, Init, RenderOptions, Renderer, ViewCx, ViewResult, Vnode,
};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

type H = MemoryHost;

fn setup() -> (H, Renderer<H>) {
	let host = MemoryHost::new();
	(host.clone(), Renderer::new(host))
}

fn badge(cx: &ViewCx<'_, H>) -> ViewResult<Init<H>> {
	let label = cx.attrs.get_str("label").unwrap_or_default().to_owned();
	Ok(Init::view(node::<H>("span.badge", (), label)?))
}

fn page(items: &[(&'static str, &'static str)]) -> Vnode<H> {
	node(
		"main#app.page",
		Attrs::new().set("data-count", items.len()).style([("color", "red"), ("--accent", "blue")]),
		children![
			node::<H>("h1", (), "Items").unwrap(),
			keyed(items.iter().copied(), |(key, label)| (key, node::<H>("li", Attrs::<H>::new().on("click", |_| ()), label).unwrap())).unwrap(),
			node(Component::new(badge), Attrs::new().set("label", "new"), ()).unwrap(),
			"footer",
			false,
		],
	)
	.unwrap()
}

fn numbers(order: &[i32]) -> Vnode<H> {
	keyed(order.iter().copied(), |i| (i, node::<H>("p", (), i).unwrap())).unwrap()
}

#[test]
fn identical_rerender_is_silent() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();

	renderer.render(&body, page(&[("a", "A"), ("b", "B")]), &options).unwrap();
	let main = host.children(&body)[0];
	assert_eq!(host.get_attribute(&main, None, "id").as_deref(), Some("app"));
	assert_eq!(host.get_attribute(&main, None, "class").as_deref(), Some("page"));
	assert_eq!(host.get_attribute(&main, None, "data-count").as_deref(), Some("2"));
	assert_eq!(host.style(&main, "--accent").as_deref(), Some("blue"));
	assert_eq!(host.inner_html(&main), r#"<h1>Items</h1><li>A</li><li>B</li><span class="badge">new</span>footer"#);
	assert!(!host.take_log().is_empty());

	renderer.render(&body, page(&[("a", "A"), ("b", "B")]), &options).unwrap();
	assert_eq!(host.take_log(), vec![]);
}

#[test]
fn keyed_swap_moves_once() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();

	renderer.render(&body, numbers(&[1, 2]), &options).unwrap();
	let before = host.children(&body);
	host.take_log();

	renderer.render(&body, numbers(&[2, 1]), &options).unwrap();
	let log = host.take_log();
	assert_eq!(log.iter().filter(|mutation| mutation.is_move()).count(), 1);
	assert!(!log.iter().any(Mutation::is_create));
	assert!(!log.iter().any(|mutation| matches!(mutation, Mutation::Remove { .. })));
	assert_eq!(host.children(&body), vec![before[1], before[0]]);
}

#[test]
fn keyed_entries_keep_their_nodes() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();

	renderer.render(&body, numbers(&[1, 2, 3]), &options).unwrap();
	let before = host.children(&body);
	renderer.render(&body, numbers(&[3, 4, 1]), &options).unwrap();
	let after = host.children(&body);

	assert_eq!(host.text_content(&body), "341");
	assert_eq!(after[0], before[2]);
	assert_eq!(after[2], before[0]);
	assert!(!host.is_connected(&before[1]));
}

#[test]
fn duplicate_keys_are_rejected() {
	let result = keyed_pairs::<H, _, _>([(1, "a"), (1, "b")]);
	assert!(matches!(result, Err(Error::DuplicateKey(_))));
}

#[test]
fn focus_survives_moves() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let inputs = |order: &[i32]| -> Vnode<H> { keyed(order.iter().copied(), |i| (i, node::<H>("input", Attrs::new().set("name", i), ()).unwrap())).unwrap() };

	renderer.render(&body, inputs(&[1, 2]), &options).unwrap();
	let second = host.children(&body)[1];
	host.focus(&second);

	renderer.render(&body, inputs(&[2, 1]), &options).unwrap();
	assert_eq!(host.children(&body)[0], second);
	assert_eq!(host.active_element(), Some(second));
}

#[test]
fn fatal_failure_keeps_committed_prefix() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let row = |label: &str| node::<H>("p", (), label.to_owned()).unwrap();

	renderer.render(&body, fragment(vec![row("a"), row("b"), row("c"), row("d")]), &options).unwrap();

	let failing: Vnode<H> = inline(|_| Err(Error::Locked.into()));
	let result = renderer.render(&body, fragment(children![row("A"), row("B"), failing, row("D")]), &options);
	assert!(matches!(result, Err(Error::View(_))));
	assert!(result.unwrap_err().is_fatal());
	assert_eq!(host.inner_html(&body), "<p>A</p><p>B</p>");

	renderer.render(&body, fragment(vec![row("x")]), &options).unwrap();
	assert_eq!(host.inner_html(&body), "<p>x</p>");
}

#[test]
fn attribute_failures_are_contained() {
	let (host, renderer) = setup();
	let body = host.body();

	let tree: Vnode<H> = fragment(children![
		node::<H>("p", (), "before").unwrap(),
		node::<H>("p", Attrs::new().set("bad name", 1), "broken").unwrap(),
		node::<H>("p", (), "after").unwrap(),
	]);
	renderer.render(&body, tree, &RenderOptions::default()).unwrap();
	assert_eq!(host.inner_html(&body), "<p>before</p><p>after</p>");
}

#[test]
fn strict_policy_tears_down_ancestors() {
	let (host, renderer) = setup();
	let body = host.body();

	let tree: Vnode<H> = node(
		"div",
		(),
		children![node::<H>("p", (), "fine").unwrap(), node::<H>("p", Attrs::new().set("bad name", 1), ()).unwrap()],
	)
	.unwrap();
	let result = renderer.render(&body, tree, &RenderOptions::new().remove_on_throw(true));
	assert!(matches!(result, Err(Error::Attribute { ref name, .. }) if name == "bad name"));
	assert_eq!(host.inner_html(&body), "");
}

#[test]
fn failed_view_update_keeps_previous_output() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let fail = Rc::new(Cell::new(false));
	let view = |label: &'static str| {
		let fail = fail.clone();
		inline::<H>(move |_| if fail.get() { Err("boom".into()) } else { Ok(label.into()) })
	};

	renderer.render(&body, view("one"), &options).unwrap();
	fail.set(true);
	renderer.render(&body, view("two"), &options).unwrap();
	assert_eq!(host.text_content(&body), "one");
	fail.set(false);
	renderer.render(&body, view("three"), &options).unwrap();
	assert_eq!(host.text_content(&body), "three");
}

#[test]
fn reused_attrs_are_fatal() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let attrs = Rc::new(Attrs::<H>::new().set("title", "shared"));

	renderer.render(&body, node::<H>("div", Rc::clone(&attrs), ()).unwrap(), &options).unwrap();
	let result = renderer.render(&body, node::<H>("div", attrs, ()).unwrap(), &options);
	assert!(matches!(result, Err(Error::AttrsReused(ref tag)) if tag == "div"));
}

#[test]
fn reused_attrs_are_fatal_through_selectors() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let attrs = Rc::new(Attrs::<H>::new().set("title", "shared"));

	renderer.render(&body, node::<H>("div.card", Rc::clone(&attrs), ()).unwrap(), &options).unwrap();
	let result = renderer.render(&body, node::<H>("div.card", attrs, ()).unwrap(), &options);
	assert!(matches!(result, Err(Error::AttrsReused(ref tag)) if tag == "div"));

	let fresh = Rc::new(Attrs::<H>::new().set("title", "fresh"));
	renderer.render(&body, node::<H>("div.card", fresh, ()).unwrap(), &options).unwrap();
	let card = host.children(&body)[0];
	assert_eq!(host.get_attribute(&card, None, "title").as_deref(), Some("fresh"));
}

#[test]
fn depth_limit() {
	fn nest(depth: usize) -> Vnode<H> {
		if depth == 0 {
			text("leaf")
		} else {
			node("div", (), nest(depth - 1)).unwrap()
		}
	}

	let (host, renderer) = setup();
	let result = renderer.render(&host.body(), nest(10), &RenderOptions::new().depth_limit(3));
	assert!(matches!(result, Err(Error::DepthLimit(3))));

	renderer.render(&host.body(), nest(10), &RenderOptions::default()).unwrap();
	assert_eq!(host.text_content(&host.body()), "leaf");
}

#[test]
fn layout_hooks_run_after_commit_in_order() {
	let (host, renderer) = setup();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let hook = |name: &'static str| {
		let seen = seen.clone();
		let host = host.clone();
		layout::<H>(move |container| {
			seen.borrow_mut().push(format!("{}:{}", name, host.inner_html(container)));
			Ok(())
		})
	};

	let tree: Vnode<H> = node("div", (), children![hook("first"), node::<H>("b", (), "x").unwrap(), hook("second")]).unwrap();
	renderer.render(&host.body(), tree, &RenderOptions::default()).unwrap();
	assert_eq!(*seen.borrow(), ["first:<b>x</b>", "second:<b>x</b>"]);
}

#[test]
fn removal_aborts_views_and_runs_hooks() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let removed = Rc::new(Cell::new(0));
	let signal = Rc::new(RefCell::new(None));

	let tree = {
		let signal = signal.clone();
		let removed = removed.clone();
		fragment(children![
			inline::<H>(move |cx| {
				signal.borrow_mut().get_or_insert_with(|| cx.signal().clone());
				Ok(Child::Null)
			}),
			on_remove::<H>(move || {
				removed.set(removed.get() + 1);
				Ok(())
			}),
		])
	};
	renderer.render(&body, tree, &options).unwrap();
	let signal = signal.borrow().clone().unwrap();
	assert!(!signal.is_aborted());
	assert_eq!(removed.get(), 0);

	renderer.render(&body, (), &options).unwrap();
	assert!(signal.is_aborted());
	assert_eq!(removed.get(), 1);
}

#[test]
fn constructor_components_keep_state() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let inits = Rc::new(Cell::new(0));
	let counter = || {
		let inits = inits.clone();
		Component::<H>::new(move |_| {
			inits.set(inits.get() + 1);
			let renders = Rc::new(Cell::new(0));
			Ok(Init::render(move |cx| {
				renders.set(renders.get() + 1);
				let previous = cx.old.and_then(|old| old.get_str("name")).unwrap_or("-");
				Ok(format!("{}>{}:{}", previous, cx.attrs.get_str("name").unwrap_or_default(), renders.get()).into())
			}))
		})
	};

	renderer.render(&body, node::<H>(counter(), Attrs::new().set("name", "a"), ()).unwrap(), &options).unwrap();
	assert_eq!(host.text_content(&body), "->a:1");
	renderer.render(&body, node::<H>(counter(), Attrs::new().set("name", "b"), ()).unwrap(), &options).unwrap();
	assert_eq!(host.text_content(&body), "a>b:2");
	assert_eq!(inits.get(), 1);
}

#[test]
fn flat_components_use_the_latest_closure() {
	fn labelled(label: String) -> Vnode<H> {
		node(Component::<H>::new(move |_| Ok(Init::view(label.clone()))), (), ()).unwrap()
	}

	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	for i in 1..=3 {
		renderer.render(&body, labelled(format!("v{}", i)), &options).unwrap();
		assert_eq!(host.text_content(&body), format!("v{}", i));
	}
}

#[test]
fn context_reaches_components() {
	fn themed(cx: &ViewCx<'_, H>) -> ViewResult<Init<H>> {
		let theme = cx.context().get::<String>("theme").cloned().unwrap_or_default();
		Ok(Init::view(node::<H>("span", Attrs::new().set("class", theme), ())?))
	}

	let (host, renderer) = setup();
	let tree: Vnode<H> = set_context([entry("theme", "dark".to_owned())], node(Component::new(themed), (), ()).unwrap());
	renderer.render(&host.body(), tree, &RenderOptions::default()).unwrap();
	assert_eq!(host.inner_html(&host.body()), r#"<span class="dark"></span>"#);
}

#[test]
fn context_ends_with_its_subtree() {
	fn themed(cx: &ViewCx<'_, H>) -> ViewResult<Init<H>> {
		let theme = cx.context().get::<String>("theme").cloned().unwrap_or_else(|| "plain".to_owned());
		Ok(Init::view(node::<H>("i", (), theme)?))
	}
	let instance = || node::<H>(Component::new(themed), (), ()).unwrap();

	let (host, renderer) = setup();
	let tree: Vnode<H> = fragment(children![set_context([entry("theme", "dark".to_owned())], instance()), instance()]);
	renderer.render(&host.body(), tree, &RenderOptions::default()).unwrap();
	assert_eq!(host.inner_html(&host.body()), "<i>dark</i><i>plain</i>");
}

#[test]
fn gates_rebuild_on_changed_dependencies() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let gated = |dep: i32| gate::<H, _>([dep], node::<H>("p", (), "x").unwrap());

	renderer.render(&body, gated(1), &options).unwrap();
	let first = host.children(&body)[0];
	renderer.render(&body, gated(1), &options).unwrap();
	assert_eq!(host.children(&body)[0], first);
	renderer.render(&body, gated(2), &options).unwrap();
	assert_ne!(host.children(&body)[0], first);
	assert_eq!(host.children(&body).len(), 1);
}

#[test]
fn retain_keeps_committed_output() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();

	renderer.render(&body, fragment(children![node::<H>("p", (), "a").unwrap(), node::<H>("p", (), "b").unwrap()]), &options).unwrap();
	let kept = host.children(&body)[0];
	host.take_log();

	renderer.render(&body, fragment(children![retain::<H>(), node::<H>("p", (), "c").unwrap()]), &options).unwrap();
	assert_eq!(host.inner_html(&body), "<p>a</p><p>c</p>");
	assert_eq!(host.children(&body)[0], kept);
	assert_eq!(host.take_log().len(), 1, "only the text changes");
}

#[test]
fn form_state_is_forced() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let field = || node::<H>("input", Attrs::new().set("value", "x"), ()).unwrap();

	renderer.render(&body, field(), &options).unwrap();
	let input = host.children(&body)[0];
	host.set_property(&input, "value", Prop::Str("typed".to_owned())).unwrap();
	renderer.render(&body, field(), &options).unwrap();
	assert_eq!(host.get_property(&input, "value"), Prop::Str("x".to_owned()));
}

#[test]
fn select_value_applies_after_options() {
	let (host, renderer) = setup();
	let option = |value: &str| node::<H>("option", Attrs::new().set("value", value), value.to_uppercase()).unwrap();
	let tree: Vnode<H> = node("select", Attrs::new().set("value", "b"), vec![option("a"), option("b")]).unwrap();

	renderer.render(&host.body(), tree, &RenderOptions::default()).unwrap();
	let select = host.children(&host.body())[0];
	assert_eq!(host.get_property(&select, "value"), Prop::Str("b".to_owned()));
	assert_eq!(host.get_property(&select, "selectedIndex"), Prop::Number(1.0));
}

#[test]
fn svg_children_inherit_the_namespace() {
	let (host, renderer) = setup();
	let tree: Vnode<H> = node(
		"svg",
		(),
		children![
			node::<H>("circle", Attrs::new().set("r", 5), ()).unwrap(),
			node::<H>("foreignObject", (), node::<H>("div", (), ()).unwrap()).unwrap(),
		],
	)
	.unwrap();
	renderer.render(&host.body(), tree, &RenderOptions::default()).unwrap();

	let svg = host.children(&host.body())[0];
	let children = host.children(&svg);
	assert_eq!(host.namespace_of(&children[0]).as_deref(), Some(SVG_NAMESPACE));
	assert_eq!(host.get_attribute(&children[0], None, "r").as_deref(), Some("5"));
	let div = host.children(&children[1])[0];
	assert_eq!(host.namespace_of(&div).as_deref(), Some(sapwood::host::HTML_NAMESPACE));
}

#[test]
fn removed_attributes_are_cleared() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();

	renderer.render(&body, node::<H>("a.link", Attrs::new().set("href", "/x").set("hidden", true).style([("color", "red")]), ()).unwrap(), &options).unwrap();
	let link = host.children(&body)[0];
	assert_eq!(host.outer_html(&link), r#"<a href="/x" hidden="" class="link" style="color: red;"></a>"#);

	renderer.render(&body, node::<H>("a", (), ()).unwrap(), &options).unwrap();
	assert_eq!(host.outer_html(&link), "<a></a>");
}

#[test]
fn keyed_failure_tears_down_the_rest() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let row = |label: &str| node::<H>("p", (), label.to_owned()).unwrap();

	let tree = keyed_pairs::<H, _, _>(vec![("a", row("a")), ("b", row("b")), ("c", row("c")), ("d", row("d"))]).unwrap();
	renderer.render(&body, tree, &options).unwrap();
	let kept = host.children(&body)[0];

	let failing: Vnode<H> = inline(|_| Err(Error::Locked.into()));
	let tree = keyed_pairs::<H, _, _>(vec![("a", row("A")), ("b", failing), ("c", row("C")), ("e", row("E"))]).unwrap();
	let result = renderer.render(&body, tree, &options);
	assert!(matches!(result, Err(Error::View(_))));
	assert_eq!(host.inner_html(&body), "<p>A</p>");
	assert_eq!(host.children(&body), vec![kept]);

	let tree = keyed_pairs::<H, _, _>(vec![("a", row("a")), ("c", row("c"))]).unwrap();
	renderer.render(&body, tree, &options).unwrap();
	assert_eq!(host.inner_html(&body), "<p>a</p><p>c</p>");
	assert_eq!(host.children(&body)[0], kept);
}

#[test]
fn file_inputs_ignore_value_writes() {
	let (host, renderer) = setup();
	let body = host.body();
	let field = |value: &str| node::<H>("input", Attrs::new().set("type", "file").set("value", value), ()).unwrap();

	renderer.render(&body, field("C:\\fake\\photo.png"), &RenderOptions::default()).unwrap();
	let input = host.children(&body)[0];
	assert_eq!(host.get_attribute(&input, None, "type").as_deref(), Some("file"));
	assert_eq!(host.get_property(&input, "value"), Prop::Str(String::new()));
	assert!(!host.take_log().iter().any(|mutation| matches!(mutation, Mutation::SetProperty { name, .. } if name == "value")));

	renderer.render(&body, field(""), &RenderOptions::default()).unwrap();
	assert_eq!(host.get_property(&input, "value"), Prop::Str(String::new()));
}

#[test]
fn focused_inputs_skip_redundant_value_writes() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let field = |value: &str| node::<H>("input", Attrs::new().set("value", value), ()).unwrap();
	let value_writes = |log: Vec<Mutation>| log.into_iter().filter(|mutation| matches!(mutation, Mutation::SetProperty { name, .. } if name == "value")).count();

	renderer.render(&body, field("x"), &options).unwrap();
	let input = host.children(&body)[0];
	host.focus(&input);
	host.take_log();

	renderer.render(&body, field("x"), &options).unwrap();
	assert_eq!(value_writes(host.take_log()), 0);

	renderer.render(&body, field("y"), &options).unwrap();
	assert_eq!(value_writes(host.take_log()), 1);
	assert_eq!(host.get_property(&input, "value"), Prop::Str("y".to_owned()));
	assert_eq!(host.active_element(), Some(input));
}

#[test]
fn xlink_attributes_use_their_namespace() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();
	let icon = |attrs: Attrs<H>| node::<H>("svg", (), node::<H>("use", attrs, ()).unwrap()).unwrap();

	renderer.render(&body, icon(Attrs::new().set("xlink:href", "#a")), &options).unwrap();
	let used = host.children(&host.children(&body)[0])[0];
	assert_eq!(host.get_attribute(&used, Some(XLINK_NAMESPACE), "href").as_deref(), Some("#a"));
	assert_eq!(host.get_attribute(&used, None, "href"), None);

	renderer.render(&body, icon(Attrs::new().set("xlink:href", "#b")), &options).unwrap();
	assert_eq!(host.get_attribute(&used, Some(XLINK_NAMESPACE), "href").as_deref(), Some("#b"));

	renderer.render(&body, icon(Attrs::new()), &options).unwrap();
	assert_eq!(host.get_attribute(&used, Some(XLINK_NAMESPACE), "href"), None);
}

#[test]
fn dynamic_classes_merge_with_the_selector() {
	let (host, renderer) = setup();
	let body = host.body();
	let options = RenderOptions::default();

	renderer.render(&body, node::<H>("div.card", Attrs::new().set("class", "active"), ()).unwrap(), &options).unwrap();
	let card = host.children(&body)[0];
	assert_eq!(host.get_attribute(&card, None, "class").as_deref(), Some("card active"));

	renderer.render(&body, node::<H>("div.card", Attrs::new().set("className", "other"), ()).unwrap(), &options).unwrap();
	assert_eq!(host.children(&body)[0], card);
	assert_eq!(host.get_attribute(&card, None, "class").as_deref(), Some("card other"));

	renderer.render(&body, node::<H>("div.card", (), ()).unwrap(), &options).unwrap();
	assert_eq!(host.get_attribute(&card, None, "class").as_deref(), Some("card"));
}

#[test]
fn inline_views_see_no_previous_attrs() {
	let (host, renderer) = setup();
	let body = host.body();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let view = || {
		let seen = seen.clone();
		inline::<H>(move |cx| {
			seen.borrow_mut().push(cx.old.is_some());
			Ok(Child::Null)
		})
	};

	renderer.render(&body, view(), &RenderOptions::default()).unwrap();
	renderer.render(&body, view(), &RenderOptions::default()).unwrap();
	assert_eq!(*seen.borrow(), [false, false]);
}
