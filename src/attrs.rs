//! Attribute snapshots and the values they carry.

use crate::{
	host::{format_number, Host, Prop},
	vnode::Child,
};
use core::{any::Any, fmt};
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use std::rc::Rc;

/// What a listener asks of the renderer once it has run.
pub enum Reaction {
	/// Schedule a redraw. This is what handlers normally return.
	Redraw,
	/// Don't redraw.
	Skip,
	/// Decide once the future resolves.
	Later(LocalBoxFuture<'static, Reaction>),
}

impl From<()> for Reaction {
	fn from((): ()) -> Self {
		Reaction::Redraw
	}
}

impl fmt::Debug for Reaction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Reaction::Redraw => f.write_str("Redraw"),
			Reaction::Skip => f.write_str("Skip"),
			Reaction::Later(_) => f.write_str("Later(..)"),
		}
	}
}

/// An event handler, stored under an `on<type>` attribute.
pub struct Handler<H: Host>(pub(crate) Rc<dyn Fn(&H::Event) -> Reaction>);

impl<H: Host> Handler<H> {
	pub fn new<R: Into<Reaction>>(handler: impl Fn(&H::Event) -> R + 'static) -> Self {
		Self(Rc::new(move |event| handler(event).into()))
	}

	pub fn call(&self, event: &H::Event) -> Reaction {
		(self.0)(event)
	}
}

impl<H: Host> Clone for Handler<H> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

/// Inline style declarations, in insertion order.
pub type Style = IndexMap<Rc<str>, Rc<str>>;

/// An attribute value.
pub enum Value<H: Host> {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	Style(Rc<Style>),
	Handler(Handler<H>),
	/// Opaque data for components. Never written to the host.
	Object(Rc<dyn Any>),
}

impl<H: Host> Clone for Value<H> {
	fn clone(&self) -> Self {
		match self {
			Value::Null => Value::Null,
			Value::Bool(value) => Value::Bool(*value),
			Value::Int(value) => Value::Int(*value),
			Value::Float(value) => Value::Float(*value),
			Value::Str(value) => Value::Str(value.clone()),
			Value::Style(value) => Value::Style(value.clone()),
			Value::Handler(value) => Value::Handler(value.clone()),
			Value::Object(value) => Value::Object(value.clone()),
		}
	}
}

impl<H: Host> fmt::Debug for Value<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(value) => write!(f, "Bool({:?})", value),
			Value::Int(value) => write!(f, "Int({:?})", value),
			Value::Float(value) => write!(f, "Float({:?})", value),
			Value::Str(value) => write!(f, "Str({:?})", value),
			Value::Style(value) => f.debug_tuple("Style").field(value).finish(),
			Value::Handler(_) => f.write_str("Handler(..)"),
			Value::Object(_) => f.write_str("Object(..)"),
		}
	}
}

impl<H: Host> Value<H> {
	/// `null` and `false` count as absent.
	#[must_use]
	pub fn is_absent(&self) -> bool {
		matches!(self, Value::Null | Value::Bool(false))
	}

	/// Identity comparison: strings by content, floats by bit pattern, reference types by pointer.
	#[must_use]
	pub fn same(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::Style(a), Value::Style(b)) => Rc::ptr_eq(a, b),
			(Value::Handler(a), Value::Handler(b)) => Rc::as_ptr(&a.0).cast::<()>() == Rc::as_ptr(&b.0).cast::<()>(),
			(Value::Object(a), Value::Object(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			_ => false,
		}
	}

	/// The string form used for attributes and `value` comparisons. [`None`] for values without one.
	#[must_use]
	pub fn to_text(&self) -> Option<String> {
		match self {
			Value::Null => Some("null".to_owned()),
			Value::Bool(value) => Some(value.to_string()),
			Value::Int(value) => Some(value.to_string()),
			Value::Float(value) => Some(format_number(*value)),
			Value::Str(value) => Some(value.to_string()),
			Value::Style(_) | Value::Handler(_) | Value::Object(_) => None,
		}
	}

	/// The host representation of this value, if it has one.
	#[must_use]
	#[allow(clippy::cast_precision_loss)]
	pub fn to_prop(&self) -> Option<Prop> {
		match self {
			Value::Null => Some(Prop::Null),
			Value::Bool(value) => Some(Prop::Bool(*value)),
			Value::Int(value) => Some(Prop::Number(*value as f64)),
			Value::Float(value) => Some(Prop::Number(*value)),
			Value::Str(value) => Some(Prop::Str(value.to_string())),
			Value::Style(_) | Value::Handler(_) | Value::Object(_) => None,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_object<T: Any>(&self) -> Option<&T> {
		match self {
			Value::Object(value) => value.downcast_ref(),
			_ => None,
		}
	}
}

macro_rules! value_from {
	($($ty:ty => |$v:ident| $e:expr),* $(,)?) => {$(
		impl<H: Host> From<$ty> for Value<H> {
			fn from($v: $ty) -> Self {
				$e
			}
		}
	)*};
}

value_from! {
	bool => |v| Value::Bool(v),
	i32 => |v| Value::Int(v.into()),
	i64 => |v| Value::Int(v),
	u32 => |v| Value::Int(v.into()),
	usize => |v| Value::Int(i64::try_from(v).unwrap_or(i64::MAX)),
	f64 => |v| Value::Float(v),
	&str => |v| Value::Str(v.into()),
	String => |v| Value::Str(v.into()),
	Rc<str> => |v| Value::Str(v),
	Style => |v| Value::Style(Rc::new(v)),
	Handler<H> => |v| Value::Handler(v),
}

impl<H: Host, T: Into<Value<H>>> From<Option<T>> for Value<H> {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

/// An attribute set.
///
/// Once handed to a vnode, an attribute set is an immutable snapshot. Elements reject receiving the very same
/// (`Rc`-identical) snapshot twice.
pub struct Attrs<H: Host> {
	entries: IndexMap<Rc<str>, Value<H>>,
	children: Option<Vec<Child<H>>>,
}

impl<H: Host> Default for Attrs<H> {
	fn default() -> Self {
		Self { entries: IndexMap::new(), children: None }
	}
}

impl<H: Host> Clone for Attrs<H> {
	fn clone(&self) -> Self {
		Self {
			entries: self.entries.clone(),
			children: self.children.clone(),
		}
	}
}

impl<H: Host> fmt::Debug for Attrs<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.entries.iter()).finish()
	}
}

impl<H: Host> Attrs<H> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn set(mut self, name: impl Into<Rc<str>>, value: impl Into<Value<H>>) -> Self {
		self.insert(name, value);
		self
	}

	/// Installs `handler` for events of `event_type` (the `on<type>` attribute).
	#[must_use]
	pub fn on<R: Into<Reaction>>(self, event_type: &str, handler: impl Fn(&H::Event) -> R + 'static) -> Self {
		self.set(format!("on{}", event_type), Handler::<H>::new(handler))
	}

	/// Stores opaque data for a component.
	#[must_use]
	pub fn object<T: Any>(self, name: impl Into<Rc<str>>, value: T) -> Self {
		self.set(name, Value::Object(Rc::new(value)))
	}

	#[must_use]
	pub fn style<K: Into<Rc<str>>, V: Into<Rc<str>>>(self, declarations: impl IntoIterator<Item = (K, V)>) -> Self {
		let style: Style = declarations.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
		self.set("style", style)
	}

	/// Supplies children through the attribute set. Used when no explicit children are given.
	#[must_use]
	pub fn children(mut self, children: impl Into<Child<H>>) -> Self {
		self.children = Some(match children.into() {
			Child::List(list) => list,
			other => vec![other],
		});
		self
	}

	pub fn insert(&mut self, name: impl Into<Rc<str>>, value: impl Into<Value<H>>) -> Option<Value<H>> {
		self.entries.insert(name.into(), value.into())
	}

	pub fn remove(&mut self, name: &str) -> Option<Value<H>> {
		self.entries.shift_remove(name)
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value<H>> {
		self.entries.get(name)
	}

	/// The value of `name` if it is present and not [absent](`Value::is_absent`).
	#[must_use]
	pub fn present(&self, name: &str) -> Option<&Value<H>> {
		self.get(name).filter(|value| !value.is_absent())
	}

	#[must_use]
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(Value::as_str)
	}

	#[must_use]
	pub fn get_object<T: Any>(&self, name: &str) -> Option<&T> {
		self.get(name).and_then(Value::as_object)
	}

	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value<H>)> {
		self.entries.iter().map(|(name, value)| (&**name, value))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Children passed through the attribute set, for components to place in their output.
	#[must_use]
	pub fn child_list(&self) -> &[Child<H>] {
		self.children.as_deref().unwrap_or(&[])
	}

	pub(crate) fn put_children(&mut self, children: Vec<Child<H>>) {
		self.children = Some(children);
	}
}
