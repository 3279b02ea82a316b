//! The live document a [`Renderer`](`crate::Renderer`) writes into.
//!
//! Everything the reconciler does to the outside world goes through [`Host`].
//! [`MemoryHost`](`crate::mem::MemoryHost`) implements it in-process, [`WebHost`](`crate::web::WebHost`) on top of [***web-sys***](https://docs.rs/web-sys).

use core::fmt::{self, Debug, Display};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A failed host operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

/// A primitive value as stored in a live property.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
	Null,
	Bool(bool),
	Number(f64),
	Str(String),
}

impl Prop {
	/// Stringifies the value the way a script engine would concatenate it with `""`.
	#[must_use]
	pub fn to_text(&self) -> String {
		match self {
			Prop::Null => "null".to_owned(),
			Prop::Bool(value) => value.to_string(),
			Prop::Number(value) => format_number(*value),
			Prop::Str(value) => value.clone(),
		}
	}
}

impl Display for Prop {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_text())
	}
}

/// Formats integral floats without a fractional part, so `42.0` becomes `"42"`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(value: f64) -> String {
	if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
		(value as i64).to_string()
	} else if value.is_nan() {
		"NaN".to_owned()
	} else if value.is_infinite() {
		if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
	} else {
		value.to_string()
	}
}

/// Identifies a pending animation frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub i32);

/// Shared event entry point installed once per element and event type.
pub type Dispatch<E> = Rc<dyn Fn(&E)>;

/// Access to a live, mutable document tree.
///
/// Node handles are cheap to clone and compare by identity.
/// Mutating methods report failures as [`HostError`] instead of panicking.
pub trait Host: Clone + 'static {
	type Node: Clone + PartialEq + Debug;
	type Event;
	type Listener;

	fn create_element(&self, tag: &str, namespace: Option<&str>, is: Option<&str>) -> Result<Self::Node, HostError>;
	fn create_text(&self, data: &str) -> Self::Node;
	fn set_text(&self, node: &Self::Node, data: &str);

	fn first_child(&self, parent: &Self::Node) -> Option<Self::Node>;
	fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
	/// Inserts (or moves) `node` into `parent` before `reference`, or at the end if `reference` is [`None`].
	fn insert_before(&self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>) -> Result<(), HostError>;
	/// Detaches `node` from its parent, if it has one.
	fn remove(&self, node: &Self::Node);
	/// Whether `node` is `ancestor` or one of its descendants.
	fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;
	fn is_connected(&self, node: &Self::Node) -> bool;
	/// The namespace URI of an element, or [`None`] for text nodes.
	fn namespace_of(&self, node: &Self::Node) -> Option<String>;

	fn has_property(&self, node: &Self::Node, name: &str) -> bool;
	fn get_property(&self, node: &Self::Node, name: &str) -> Prop;
	fn set_property(&self, node: &Self::Node, name: &str, value: Prop) -> Result<(), HostError>;
	fn get_attribute(&self, node: &Self::Node, namespace: Option<&str>, name: &str) -> Option<String>;
	fn set_attribute(&self, node: &Self::Node, namespace: Option<&str>, name: &str, value: &str) -> Result<(), HostError>;
	fn remove_attribute(&self, node: &Self::Node, namespace: Option<&str>, name: &str) -> Result<(), HostError>;
	/// Assigns a camel-case style property. [`None`] clears it.
	fn set_style(&self, node: &Self::Node, name: &str, value: Option<&str>) -> Result<(), HostError>;
	/// Writes a style property in raw (`--custom-property`) syntax. [`None`] clears it.
	fn set_style_raw(&self, node: &Self::Node, name: &str, value: Option<&str>) -> Result<(), HostError>;

	fn event_type(&self, event: &Self::Event) -> String;
	fn listen(&self, node: &Self::Node, event_type: &str, dispatch: Dispatch<Self::Event>) -> Result<Self::Listener, HostError>;
	fn unlisten(&self, node: &Self::Node, event_type: &str, listener: Self::Listener);

	fn active_element(&self) -> Option<Self::Node>;
	fn focus(&self, node: &Self::Node);

	fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Result<FrameId, HostError>;
	fn cancel_frame(&self, frame: FrameId);
	/// Drives `future` to completion outside of the current call stack.
	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>);
}
