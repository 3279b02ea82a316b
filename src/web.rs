//! [`Host`] implementation for the browser DOM, through [***web-sys***](https://docs.rs/web-sys).

use crate::{
	host::{Dispatch, FrameId, Host, HostError, Prop},
	rate::{Timer, TimerId},
	router::Location,
};
use futures::future::LocalBoxFuture;
use js_sys::{Date, Function, Reflect};
use tracing::{error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{CssStyleDeclaration, Document, Element, HtmlElement, Node, Window};

fn host_error(error: JsValue) -> HostError {
	HostError::new(error.as_string().unwrap_or_else(|| format!("{:?}", error)))
}

/// The document of the current browser window.
#[derive(Debug, Clone)]
pub struct WebHost {
	window: Window,
	document: Document,
}

/// An event listener installed by [`WebHost`]. Dropping it makes the listener throw when invoked.
pub type WebListener = Closure<dyn Fn(web_sys::Event)>;

impl WebHost {
	/// # Errors
	///
	/// Outside of a window context.
	pub fn new() -> Result<Self, HostError> {
		let window = web_sys::window().ok_or_else(|| HostError::new("There is no global `window`."))?;
		let document = window.document().ok_or_else(|| HostError::new("The window has no document."))?;
		Ok(Self { window, document })
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	#[must_use]
	pub fn body(&self) -> Option<Node> {
		self.document.body().map(Into::into)
	}

	fn style_of(node: &Node) -> Result<CssStyleDeclaration, HostError> {
		Reflect::get(node, &JsValue::from_str("style")).map_err(host_error).and_then(|style| {
			style
				.dyn_into::<CssStyleDeclaration>()
				.map_err(|_| HostError::new("The node has no inline style."))
		})
	}

	fn element(node: &Node) -> Result<&Element, HostError> {
		node.dyn_ref::<Element>().ok_or_else(|| HostError::new("The node is not an element."))
	}
}

impl Host for WebHost {
	type Node = Node;
	type Event = web_sys::Event;
	type Listener = WebListener;

	fn create_element(&self, tag: &str, namespace: Option<&str>, is: Option<&str>) -> Result<Node, HostError> {
		// The `is` option bag isn't exposed without extra features, but the string overloads are well-supported.
		let element = match (namespace, is) {
			(Some(namespace), Some(is)) => self.document.create_element_ns_with_str(Some(namespace), tag, is),
			(Some(namespace), None) => self.document.create_element_ns(Some(namespace), tag),
			(None, Some(is)) => self.document.create_element_with_str(tag, is),
			(None, None) => self.document.create_element(tag),
		};
		element.map(Into::into).map_err(host_error)
	}

	fn create_text(&self, data: &str) -> Node {
		self.document.create_text_node(data).into()
	}

	fn set_text(&self, node: &Node, data: &str) {
		node.set_text_content(Some(data));
	}

	fn first_child(&self, parent: &Node) -> Option<Node> {
		parent.first_child()
	}

	fn next_sibling(&self, node: &Node) -> Option<Node> {
		node.next_sibling()
	}

	fn insert_before(&self, parent: &Node, node: &Node, reference: Option<&Node>) -> Result<(), HostError> {
		parent.insert_before(node, reference).map(drop).map_err(host_error)
	}

	fn remove(&self, node: &Node) {
		if let Some(parent) = node.parent_node() {
			if let Err(error) = parent.remove_child(node) {
				error!("Failed to remove node: {:?}", error);
			}
		}
	}

	fn contains(&self, ancestor: &Node, node: &Node) -> bool {
		ancestor.contains(Some(node))
	}

	fn is_connected(&self, node: &Node) -> bool {
		node.is_connected()
	}

	fn namespace_of(&self, node: &Node) -> Option<String> {
		node.dyn_ref::<Element>().and_then(Element::namespace_uri)
	}

	fn has_property(&self, node: &Node, name: &str) -> bool {
		Reflect::has(node, &JsValue::from_str(name)).unwrap_or(false)
	}

	fn get_property(&self, node: &Node, name: &str) -> Prop {
		let value = match Reflect::get(node, &JsValue::from_str(name)) {
			Ok(value) => value,
			Err(error) => {
				error!("Failed to read property {:?}: {:?}", name, error);
				return Prop::Null;
			}
		};
		if let Some(value) = value.as_bool() {
			Prop::Bool(value)
		} else if let Some(value) = value.as_f64() {
			Prop::Number(value)
		} else if let Some(value) = value.as_string() {
			Prop::Str(value)
		} else {
			if !value.is_null() && !value.is_undefined() {
				warn!("Property {:?} doesn't hold a primitive value.", name);
			}
			Prop::Null
		}
	}

	fn set_property(&self, node: &Node, name: &str, value: Prop) -> Result<(), HostError> {
		let value = match value {
			Prop::Null => JsValue::NULL,
			Prop::Bool(value) => JsValue::from_bool(value),
			Prop::Number(value) => JsValue::from_f64(value),
			Prop::Str(value) => JsValue::from_str(&value),
		};
		match Reflect::set(node, &JsValue::from_str(name), &value) {
			Ok(true) => Ok(()),
			Ok(false) => Err(HostError::new(format!("Property {:?} is read-only.", name))),
			Err(error) => Err(host_error(error)),
		}
	}

	fn get_attribute(&self, node: &Node, namespace: Option<&str>, name: &str) -> Option<String> {
		let element = node.dyn_ref::<Element>()?;
		match namespace {
			Some(_) => element.get_attribute_ns(namespace, name),
			None => element.get_attribute(name),
		}
	}

	fn set_attribute(&self, node: &Node, namespace: Option<&str>, name: &str, value: &str) -> Result<(), HostError> {
		let element = Self::element(node)?;
		match namespace {
			Some(_) => element.set_attribute_ns(namespace, name, value),
			None => element.set_attribute(name, value),
		}
		.map_err(host_error)
	}

	fn remove_attribute(&self, node: &Node, namespace: Option<&str>, name: &str) -> Result<(), HostError> {
		let element = Self::element(node)?;
		match namespace {
			Some(_) => element.remove_attribute_ns(namespace, name),
			None => element.remove_attribute(name),
		}
		.map_err(host_error)
	}

	fn set_style(&self, node: &Node, name: &str, value: Option<&str>) -> Result<(), HostError> {
		let style = Self::style_of(node)?;
		Reflect::set(&style, &JsValue::from_str(name), &JsValue::from_str(value.unwrap_or_default()))
			.map(drop)
			.map_err(host_error)
	}

	fn set_style_raw(&self, node: &Node, name: &str, value: Option<&str>) -> Result<(), HostError> {
		let style = Self::style_of(node)?;
		match value {
			Some(value) => style.set_property(name, value),
			None => style.remove_property(name).map(drop),
		}
		.map_err(host_error)
	}

	fn event_type(&self, event: &web_sys::Event) -> String {
		event.type_()
	}

	#[instrument(skip(self, dispatch))]
	fn listen(&self, node: &Node, event_type: &str, dispatch: Dispatch<web_sys::Event>) -> Result<WebListener, HostError> {
		let listener = Closure::wrap(Box::new(move |event: web_sys::Event| dispatch(&event)) as Box<dyn Fn(web_sys::Event)>);
		node.add_event_listener_with_callback(event_type, listener.as_ref().unchecked_ref())
			.map_err(host_error)?;
		trace!("Created Closure.");
		Ok(listener)
	}

	#[instrument(skip(self, listener))]
	fn unlisten(&self, node: &Node, event_type: &str, listener: WebListener) {
		if let Err(error) = node.remove_event_listener_with_callback(event_type, listener.as_ref().unchecked_ref()) {
			error!("Failed to remove event listener {:?}: {:?}", event_type, error);
		}
		trace!("Destroyed Closure.");
	}

	fn active_element(&self) -> Option<Node> {
		self.document.active_element().map(Into::into)
	}

	fn focus(&self, node: &Node) {
		if let Some(element) = node.dyn_ref::<HtmlElement>() {
			if let Err(error) = element.focus() {
				error!("Failed to restore focus: {:?}", error);
			}
		}
	}

	fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Result<FrameId, HostError> {
		let callback = Closure::once_into_js(move || callback());
		self.window
			.request_animation_frame(callback.unchecked_ref::<Function>())
			.map(FrameId)
			.map_err(host_error)
	}

	fn cancel_frame(&self, frame: FrameId) {
		if let Err(error) = self.window.cancel_animation_frame(frame.0) {
			error!("Failed to cancel animation frame: {:?}", error);
		}
	}

	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
		wasm_bindgen_futures::spawn_local(future);
	}
}

impl Timer for WebHost {
	fn now(&self) -> f64 {
		Date::now()
	}

	#[allow(clippy::cast_possible_truncation)]
	fn set_timeout(&self, delay: f64, callback: Box<dyn FnOnce()>) -> Result<TimerId, HostError> {
		let callback = Closure::once_into_js(move || callback());
		self.window
			.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref::<Function>(), delay.max(0.0).ceil() as i32)
			.map(TimerId)
			.map_err(host_error)
	}

	fn clear_timeout(&self, id: TimerId) {
		self.window.clear_timeout_with_handle(id.0);
	}
}

impl Location for WebHost {
	fn href(&self) -> String {
		let location = self.window.location();
		let part = |part: Result<String, JsValue>| part.unwrap_or_default();
		format!("{}{}{}", part(location.pathname()), part(location.search()), part(location.hash()))
	}

	fn push(&self, href: &str) -> Result<(), HostError> {
		self.window
			.history()
			.and_then(|history| history.push_state_with_url(&JsValue::NULL, "", Some(href)))
			.map_err(host_error)
	}

	fn replace(&self, href: &str) -> Result<(), HostError> {
		self.window
			.history()
			.and_then(|history| history.replace_state_with_url(&JsValue::NULL, "", Some(href)))
			.map_err(host_error)
	}
}
