//! The virtual node model and the functions that build it.

use crate::{
	attrs::{Attrs, Value},
	closure_map::ClosureMap,
	context::Context,
	error::{Error, ViewError},
	host::Host,
	render::Redraw,
	selector,
	signal::{AbortController, Signal},
};
use bitflags::bitflags;
use core::{
	any::{type_name, Any, TypeId},
	fmt::{self, Display},
};
use indexmap::{map::Entry, IndexMap};
use std::rc::Rc;

bitflags! {
	/// Per-instance facts established once, when a vnode is first committed.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Flags: u16 {
		const USED = 1;
		const REMOVING = 1 << 1;
		const HTML = 1 << 2;
		const CUSTOM = 1 << 3;
		const INPUT = 1 << 4;
		const SELECT = 1 << 5;
		const OPTION = 1 << 6;
		const TEXTAREA = 1 << 7;
		const FILE_INPUT = 1 << 8;
	}
}

/// The kind discriminant of a [`Vnode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
	Retain,
	Fragment,
	Keyed,
	Text,
	Element,
	Component,
	Layout,
	Removal,
	SetContext,
	Gate,
	Inline,
}

/// An application-supplied identity within a keyed group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	Int(i64),
	Str(Rc<str>),
}

impl Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::Int(key) => write!(f, "{}", key),
			Key::Str(key) => write!(f, "{:?}", key),
		}
	}
}

impl From<i64> for Key {
	fn from(key: i64) -> Self {
		Key::Int(key)
	}
}

impl From<i32> for Key {
	fn from(key: i32) -> Self {
		Key::Int(key.into())
	}
}

impl From<u32> for Key {
	fn from(key: u32) -> Self {
		Key::Int(key.into())
	}
}

impl From<usize> for Key {
	fn from(key: usize) -> Self {
		i64::try_from(key).map_or_else(|_| Key::Str(key.to_string().into()), Key::Int)
	}
}

impl From<&str> for Key {
	fn from(key: &str) -> Self {
		Key::Str(key.into())
	}
}

impl From<String> for Key {
	fn from(key: String) -> Self {
		Key::Str(key.into())
	}
}

impl From<Rc<str>> for Key {
	fn from(key: Rc<str>) -> Self {
		Key::Str(key)
	}
}

pub type Slot<H> = Option<Vnode<H>>;
pub type ViewResult<T> = Result<T, ViewError>;
/// A view body: component render function or inline view.
pub type ViewFn<H> = Rc<dyn Fn(&ViewCx<'_, H>) -> ViewResult<Child<H>>>;
pub(crate) type LayoutFn<H> = Rc<dyn Fn(&<H as Host>::Node) -> ViewResult<()>>;
pub(crate) type RemovalFn = Rc<dyn Fn() -> ViewResult<()>>;
pub(crate) type ContextEntries = Rc<[(Rc<str>, Rc<dyn Any>)]>;

/// What a view receives.
pub struct ViewCx<'a, H: Host> {
	pub attrs: &'a Attrs<H>,
	/// The attributes of the previous render, if there was one.
	pub old: Option<&'a Attrs<H>>,
	pub(crate) context: &'a Context,
	pub(crate) signal: &'a Signal,
	pub(crate) redraw: Option<&'a Redraw>,
}

impl<'a, H: Host> ViewCx<'a, H> {
	#[must_use]
	pub fn context(&self) -> &'a Context {
		self.context
	}

	/// Aborted once this instance is removed.
	#[must_use]
	pub fn signal(&self) -> &'a Signal {
		self.signal
	}

	/// Requests a redraw, if the current render has a redraw callback.
	pub fn redraw(&self) {
		if let Some(redraw) = self.redraw {
			redraw();
		}
	}

	#[must_use]
	pub fn redraw_handle(&self) -> Option<Redraw> {
		self.redraw.cloned()
	}
}

/// The result of a component's first invocation.
pub enum Init<H: Host> {
	/// The component renders directly and will be invoked again on every update.
	View(Child<H>),
	/// The component was a constructor. This function renders now and on every update.
	Render(ViewFn<H>),
}

impl<H: Host> Init<H> {
	pub fn view(child: impl Into<Child<H>>) -> Self {
		Init::View(child.into())
	}

	pub fn render(view: impl Fn(&ViewCx<'_, H>) -> ViewResult<Child<H>> + 'static) -> Self {
		Init::Render(Rc::new(view))
	}
}

/// A component reference.
///
/// Identity is the type of the function passed to [`Component::new`],
/// so the same closure or `fn` item matches itself across renders.
pub struct Component<H: Host> {
	id: TypeId,
	name: &'static str,
	pub(crate) init: Rc<dyn Fn(&ViewCx<'_, H>) -> ViewResult<Init<H>>>,
}

impl<H: Host> Component<H> {
	pub fn new<F>(init: F) -> Self
	where
		F: Fn(&ViewCx<'_, H>) -> ViewResult<Init<H>> + 'static,
	{
		Self {
			id: TypeId::of::<F>(),
			name: type_name::<F>(),
			init: Rc::new(init),
		}
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		self.name
	}

	#[must_use]
	pub fn same(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl<H: Host> Clone for Component<H> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			name: self.name,
			init: self.init.clone(),
		}
	}
}

impl<H: Host> fmt::Debug for Component<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Component").field(&self.name).finish()
	}
}

pub(crate) enum Render<H: Host> {
	Flat,
	View(ViewFn<H>),
}

impl<H: Host> Clone for Render<H> {
	fn clone(&self) -> Self {
		match self {
			Render::Flat => Render::Flat,
			Render::View(view) => Render::View(view.clone()),
		}
	}
}

pub(crate) struct ElementNode<H: Host> {
	pub tag: Rc<str>,
	pub is: Option<Rc<str>>,
	pub attrs: Rc<Attrs<H>>,
	/// The shared snapshot `attrs` was merged from, if the selector added to it.
	pub source: Option<Rc<Attrs<H>>>,
	pub children: Vec<Slot<H>>,
	pub namespace: Option<Rc<str>>,
	pub node: Option<H::Node>,
	pub listeners: Option<Rc<ClosureMap<H>>>,
}

impl<H: Host> ElementNode<H> {
	/// The attribute set as the caller passed it in.
	#[must_use]
	pub fn origin(&self) -> &Rc<Attrs<H>> {
		self.source.as_ref().unwrap_or(&self.attrs)
	}
}

pub(crate) struct ComponentNode<H: Host> {
	pub component: Component<H>,
	pub attrs: Rc<Attrs<H>>,
	pub render: Option<Render<H>>,
	pub instance: Option<Box<Vnode<H>>>,
	pub controller: Option<Rc<AbortController>>,
}

pub(crate) struct InlineNode<H: Host> {
	pub view: ViewFn<H>,
	pub instance: Option<Box<Vnode<H>>>,
	pub controller: Option<Rc<AbortController>>,
}

pub(crate) enum Kind<H: Host> {
	Retain,
	Fragment(Vec<Slot<H>>),
	Keyed(IndexMap<Key, Slot<H>>),
	Text { data: Rc<str>, node: Option<H::Node> },
	Element(Box<ElementNode<H>>),
	Component(Box<ComponentNode<H>>),
	Layout { callback: LayoutFn<H> },
	Removal { callback: RemovalFn },
	SetContext { entries: ContextEntries, children: Vec<Slot<H>> },
	Gate { deps: Rc<[Value<H>]>, children: Vec<Slot<H>> },
	Inline(Box<InlineNode<H>>),
}

/// A virtual description of one unit of output.
///
/// A vnode is consumed by the render it is passed to.
pub struct Vnode<H: Host> {
	pub(crate) kind: Kind<H>,
	pub(crate) flags: Flags,
}

impl<H: Host> Vnode<H> {
	pub(crate) fn new(kind: Kind<H>) -> Self {
		Self { kind, flags: Flags::empty() }
	}

	#[must_use]
	pub fn kind(&self) -> KindTag {
		match &self.kind {
			Kind::Retain => KindTag::Retain,
			Kind::Fragment(_) => KindTag::Fragment,
			Kind::Keyed(_) => KindTag::Keyed,
			Kind::Text { .. } => KindTag::Text,
			Kind::Element(_) => KindTag::Element,
			Kind::Component(_) => KindTag::Component,
			Kind::Layout { .. } => KindTag::Layout,
			Kind::Removal { .. } => KindTag::Removal,
			Kind::SetContext { .. } => KindTag::SetContext,
			Kind::Gate { .. } => KindTag::Gate,
			Kind::Inline(_) => KindTag::Inline,
		}
	}

	#[must_use]
	pub fn flags(&self) -> Flags {
		self.flags
	}

	#[must_use]
	pub fn is_retain(&self) -> bool {
		matches!(self.kind, Kind::Retain)
	}

	/// The element tag name, if this is an element.
	#[must_use]
	pub fn tag(&self) -> Option<&str> {
		match &self.kind {
			Kind::Element(element) => Some(&element.tag),
			_ => None,
		}
	}

	/// The attribute snapshot of an element or component.
	#[must_use]
	pub fn attrs(&self) -> Option<&Attrs<H>> {
		match &self.kind {
			Kind::Element(element) => Some(&element.attrs),
			Kind::Component(component) => Some(&component.attrs),
			_ => None,
		}
	}

	/// The live node owned by a committed element or text vnode.
	#[must_use]
	pub fn host_node(&self) -> Option<&H::Node> {
		match &self.kind {
			Kind::Text { node, .. } => node.as_ref(),
			Kind::Element(element) => element.node.as_ref(),
			_ => None,
		}
	}

	/// Whether `self` can be updated in place into `other`: same kind and same tag identity.
	pub(crate) fn matches(&self, other: &Self) -> bool {
		match (&self.kind, &other.kind) {
			(Kind::Element(a), Kind::Element(b)) => a.tag == b.tag && a.is == b.is,
			(Kind::Component(a), Kind::Component(b)) => a.component.same(&b.component),
			(a, b) => core::mem::discriminant(a) == core::mem::discriminant(b),
		}
	}
}

impl<H: Host> Clone for Vnode<H> {
	fn clone(&self) -> Self {
		let kind = match &self.kind {
			Kind::Retain => Kind::Retain,
			Kind::Fragment(children) => Kind::Fragment(children.clone()),
			Kind::Keyed(children) => Kind::Keyed(children.clone()),
			Kind::Text { data, node } => Kind::Text { data: data.clone(), node: node.clone() },
			Kind::Element(element) => Kind::Element(Box::new(ElementNode {
				tag: element.tag.clone(),
				is: element.is.clone(),
				attrs: element.attrs.clone(),
				source: element.source.clone(),
				children: element.children.clone(),
				namespace: element.namespace.clone(),
				node: element.node.clone(),
				listeners: element.listeners.clone(),
			})),
			Kind::Component(component) => Kind::Component(Box::new(ComponentNode {
				component: component.component.clone(),
				attrs: component.attrs.clone(),
				render: component.render.clone(),
				instance: component.instance.clone(),
				controller: component.controller.clone(),
			})),
			Kind::Layout { callback } => Kind::Layout { callback: callback.clone() },
			Kind::Removal { callback } => Kind::Removal { callback: callback.clone() },
			Kind::SetContext { entries, children } => Kind::SetContext {
				entries: entries.clone(),
				children: children.clone(),
			},
			Kind::Gate { deps, children } => Kind::Gate {
				deps: deps.clone(),
				children: children.clone(),
			},
			Kind::Inline(inline) => Kind::Inline(Box::new(InlineNode {
				view: inline.view.clone(),
				instance: inline.instance.clone(),
				controller: inline.controller.clone(),
			})),
		};
		Self { kind, flags: self.flags }
	}
}

impl<H: Host> fmt::Debug for Vnode<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.kind {
			Kind::Text { data, .. } => {
				if cfg!(feature = "dangerous-logging") {
					f.debug_tuple("Text").field(data).finish()
				} else {
					f.debug_tuple("Text").field(&data.len()).finish()
				}
			}
			Kind::Element(element) => f
				.debug_struct("Element")
				.field("tag", &element.tag)
				.field("attrs", &element.attrs)
				.field("children", &element.children)
				.finish(),
			Kind::Component(component) => f.debug_tuple("Component").field(&component.component.name()).finish(),
			Kind::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
			Kind::Keyed(children) => f.debug_map().entries(children.iter()).finish(),
			_ => write!(f, "{:?}", self.kind()),
		}
	}
}

/// Unnormalized child input. Anything convertible into this can be placed in a tree.
pub enum Child<H: Host> {
	Null,
	Bool(bool),
	Text(Rc<str>),
	Int(i64),
	Float(f64),
	List(Vec<Child<H>>),
	Node(Vnode<H>),
}

impl<H: Host> Clone for Child<H> {
	fn clone(&self) -> Self {
		match self {
			Child::Null => Child::Null,
			Child::Bool(value) => Child::Bool(*value),
			Child::Text(value) => Child::Text(value.clone()),
			Child::Int(value) => Child::Int(*value),
			Child::Float(value) => Child::Float(*value),
			Child::List(list) => Child::List(list.clone()),
			Child::Node(vnode) => Child::Node(vnode.clone()),
		}
	}
}

impl<H: Host> fmt::Debug for Child<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Child::Null => f.write_str("Null"),
			Child::Bool(value) => write!(f, "Bool({:?})", value),
			Child::Text(value) => write!(f, "Text({:?})", value),
			Child::Int(value) => write!(f, "Int({:?})", value),
			Child::Float(value) => write!(f, "Float({:?})", value),
			Child::List(list) => f.debug_list().entries(list).finish(),
			Child::Node(vnode) => vnode.fmt(f),
		}
	}
}

impl<H: Host> From<()> for Child<H> {
	fn from((): ()) -> Self {
		Child::Null
	}
}

impl<H: Host> From<bool> for Child<H> {
	fn from(value: bool) -> Self {
		Child::Bool(value)
	}
}

impl<H: Host> From<&str> for Child<H> {
	fn from(value: &str) -> Self {
		Child::Text(value.into())
	}
}

impl<H: Host> From<String> for Child<H> {
	fn from(value: String) -> Self {
		Child::Text(value.into())
	}
}

impl<H: Host> From<Rc<str>> for Child<H> {
	fn from(value: Rc<str>) -> Self {
		Child::Text(value)
	}
}

impl<H: Host> From<i32> for Child<H> {
	fn from(value: i32) -> Self {
		Child::Int(value.into())
	}
}

impl<H: Host> From<i64> for Child<H> {
	fn from(value: i64) -> Self {
		Child::Int(value)
	}
}

impl<H: Host> From<u32> for Child<H> {
	fn from(value: u32) -> Self {
		Child::Int(value.into())
	}
}

impl<H: Host> From<usize> for Child<H> {
	fn from(value: usize) -> Self {
		i64::try_from(value).map_or_else(|_| Child::Text(value.to_string().into()), Child::Int)
	}
}

impl<H: Host> From<f64> for Child<H> {
	fn from(value: f64) -> Self {
		Child::Float(value)
	}
}

impl<H: Host> From<Vnode<H>> for Child<H> {
	fn from(vnode: Vnode<H>) -> Self {
		Child::Node(vnode)
	}
}

impl<H: Host, T: Into<Child<H>>> From<Vec<T>> for Child<H> {
	fn from(list: Vec<T>) -> Self {
		Child::List(list.into_iter().map(Into::into).collect())
	}
}

impl<H: Host, T: Into<Child<H>>> From<Option<T>> for Child<H> {
	fn from(child: Option<T>) -> Self {
		child.map_or(Child::Null, Into::into)
	}
}

/// Builds a [`Child::List`] from heterogeneous children.
#[macro_export]
macro_rules! children {
	($($child:expr),* $(,)?) => {
		$crate::Child::List(vec![$($crate::Child::from($child)),*])
	};
}

/// Turns child input into an optional vnode: `null` and booleans become holes, primitives text, lists fragments.
pub fn normalize<H: Host>(child: Child<H>) -> Slot<H> {
	match child {
		Child::Null | Child::Bool(_) => None,
		Child::Text(data) => Some(Vnode::new(Kind::Text { data, node: None })),
		Child::Int(value) => Some(Vnode::new(Kind::Text { data: value.to_string().into(), node: None })),
		Child::Float(value) => Some(Vnode::new(Kind::Text {
			data: crate::host::format_number(value).into(),
			node: None,
		})),
		Child::List(list) => Some(Vnode::new(Kind::Fragment(normalize_list(list)))),
		Child::Node(vnode) => Some(vnode),
	}
}

fn normalize_list<H: Host>(list: Vec<Child<H>>) -> Vec<Slot<H>> {
	list.into_iter().map(normalize).collect()
}

/// Children of a structural node: a list is spliced in directly, anything else becomes a single child.
fn normalize_children<H: Host>(children: Child<H>) -> Vec<Slot<H>> {
	match children {
		Child::List(list) => normalize_list(list),
		Child::Null => Vec::new(),
		other => vec![normalize(other)],
	}
}

/// The first argument of [`node`].
pub enum Tag<H: Host> {
	Selector(Rc<str>),
	Component(Component<H>),
}

impl<H: Host> From<&str> for Tag<H> {
	fn from(selector: &str) -> Self {
		Tag::Selector(selector.into())
	}
}

impl<H: Host> From<String> for Tag<H> {
	fn from(selector: String) -> Self {
		Tag::Selector(selector.into())
	}
}

impl<H: Host> From<Component<H>> for Tag<H> {
	fn from(component: Component<H>) -> Self {
		Tag::Component(component)
	}
}

/// The attribute argument of [`node`]: nothing, a fresh set, or a shared snapshot.
pub enum AttrsArg<H: Host> {
	None,
	Owned(Attrs<H>),
	Shared(Rc<Attrs<H>>),
}

impl<H: Host> AttrsArg<H> {
	pub(crate) fn into_owned(self) -> Attrs<H> {
		match self {
			AttrsArg::None => Attrs::new(),
			AttrsArg::Owned(attrs) => attrs,
			AttrsArg::Shared(attrs) => Rc::try_unwrap(attrs).unwrap_or_else(|shared| (*shared).clone()),
		}
	}

	pub(crate) fn into_shared(self) -> Rc<Attrs<H>> {
		match self {
			AttrsArg::None => Rc::new(Attrs::new()),
			AttrsArg::Owned(attrs) => Rc::new(attrs),
			AttrsArg::Shared(attrs) => attrs,
		}
	}

	pub(crate) fn get(&self, name: &str) -> Option<&Value<H>> {
		match self {
			AttrsArg::None => None,
			AttrsArg::Owned(attrs) => attrs.get(name),
			AttrsArg::Shared(attrs) => attrs.get(name),
		}
	}
}

impl<H: Host> From<()> for AttrsArg<H> {
	fn from((): ()) -> Self {
		AttrsArg::None
	}
}

impl<H: Host> From<Attrs<H>> for AttrsArg<H> {
	fn from(attrs: Attrs<H>) -> Self {
		AttrsArg::Owned(attrs)
	}
}

impl<H: Host> From<Rc<Attrs<H>>> for AttrsArg<H> {
	fn from(attrs: Rc<Attrs<H>>) -> Self {
		AttrsArg::Shared(attrs)
	}
}

/// Builds an element from a `tag#id.class[attr=value]` selector, or a component instance.
///
/// Explicit `children` take precedence over children supplied through the attribute set.
///
/// # Errors
///
/// [`Error::Selector`] if the selector is malformed.
pub fn node<H: Host>(tag: impl Into<Tag<H>>, attrs: impl Into<AttrsArg<H>>, children: impl Into<Child<H>>) -> Result<Vnode<H>, Error> {
	let children = children.into();
	match tag.into() {
		Tag::Component(component) => {
			let attrs = match (attrs.into(), children) {
				(attrs, Child::Null) => attrs.into_shared(),
				(attrs, children) => {
					let mut attrs = attrs.into_owned();
					attrs.put_children(match children {
						Child::List(list) => list,
						other => vec![other],
					});
					Rc::new(attrs)
				}
			};
			Ok(Vnode::new(Kind::Component(Box::new(ComponentNode {
				component,
				attrs,
				render: None,
				instance: None,
				controller: None,
			}))))
		}
		Tag::Selector(selector) => {
			let compiled = selector::compile(&selector)?;
			let attrs = attrs.into();
			let shared = match &attrs {
				AttrsArg::Shared(shared) => Some(Rc::clone(shared)),
				AttrsArg::None | AttrsArg::Owned(_) => None,
			};
			let attrs = compiled.apply(attrs);
			let source = shared.filter(|shared| !Rc::ptr_eq(shared, &attrs));
			let children = match children {
				Child::Null => attrs.child_list().iter().cloned().map(normalize).collect(),
				children => normalize_children(children),
			};
			let is = attrs.get_str("is").map(Rc::from);
			Ok(Vnode::new(Kind::Element(Box::new(ElementNode {
				tag: compiled.tag.clone(),
				is,
				attrs,
				source,
				children,
				namespace: None,
				node: None,
				listeners: None,
			}))))
		}
	}
}

/// A text node.
pub fn text<H: Host>(data: impl Into<Rc<str>>) -> Vnode<H> {
	Vnode::new(Kind::Text { data: data.into(), node: None })
}

/// A positional group of children.
pub fn fragment<H: Host>(children: impl Into<Child<H>>) -> Vnode<H> {
	Vnode::new(Kind::Fragment(normalize_children(children.into())))
}

/// A keyed group built from `(key, child)` pairs. Sibling order follows iteration order.
///
/// # Errors
///
/// [`Error::DuplicateKey`] if a key repeats.
pub fn keyed_pairs<H: Host, K: Into<Key>, C: Into<Child<H>>>(pairs: impl IntoIterator<Item = (K, C)>) -> Result<Vnode<H>, Error> {
	let mut group = IndexMap::new();
	for (key, child) in pairs {
		match group.entry(key.into()) {
			Entry::Occupied(occupied) => return Err(Error::DuplicateKey(occupied.key().clone())),
			Entry::Vacant(vacant) => {
				vacant.insert(normalize(child.into()));
			}
		}
	}
	Ok(Vnode::new(Kind::Keyed(group)))
}

/// Maps `values` through `view` into a keyed group.
///
/// # Errors
///
/// [`Error::DuplicateKey`] if `view` produces a key twice.
pub fn keyed<H: Host, T, K: Into<Key>, C: Into<Child<H>>>(values: impl IntoIterator<Item = T>, mut view: impl FnMut(T) -> (K, C)) -> Result<Vnode<H>, Error> {
	keyed_pairs(values.into_iter().map(|value| view(value)))
}

/// Keeps whatever is currently committed in this position.
#[must_use]
pub fn retain<H: Host>() -> Vnode<H> {
	Vnode::new(Kind::Retain)
}

/// Runs `callback` with the nearest live container once the whole tree has been committed.
pub fn layout<H: Host>(callback: impl Fn(&H::Node) -> ViewResult<()> + 'static) -> Vnode<H> {
	Vnode::new(Kind::Layout { callback: Rc::new(callback) })
}

/// Runs `callback` as soon as this position is torn down.
pub fn on_remove<H: Host>(callback: impl Fn() -> ViewResult<()> + 'static) -> Vnode<H> {
	Vnode::new(Kind::Removal { callback: Rc::new(callback) })
}

/// A context entry for [`set_context`].
pub fn entry<T: Any>(key: &str, value: T) -> (Rc<str>, Rc<dyn Any>) {
	(key.into(), Rc::new(value))
}

/// Layers `entries` over the current context while `children` are reconciled.
pub fn set_context<H: Host>(entries: impl IntoIterator<Item = (Rc<str>, Rc<dyn Any>)>, children: impl Into<Child<H>>) -> Vnode<H> {
	Vnode::new(Kind::SetContext {
		entries: entries.into_iter().collect(),
		children: normalize_children(children.into()),
	})
}

/// Rebuilds `children` from scratch whenever `deps` change (by identity or length).
pub fn gate<H: Host, D: Into<Value<H>>>(deps: impl IntoIterator<Item = D>, children: impl Into<Child<H>>) -> Vnode<H> {
	Vnode::new(Kind::Gate {
		deps: deps.into_iter().map(Into::into).collect(),
		children: normalize_children(children.into()),
	})
}

/// An anonymous view, invoked on every render.
pub fn inline<H: Host>(view: impl Fn(&ViewCx<'_, H>) -> ViewResult<Child<H>> + 'static) -> Vnode<H> {
	Vnode::new(Kind::Inline(Box::new(InlineNode {
		view: Rc::new(view),
		instance: None,
		controller: None,
	})))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mem::MemoryHost;

	type V = Vnode<MemoryHost>;

	#[test]
	fn selector_defaults_merge_with_attrs() {
		let vnode: V = node("input#name.field.wide[type=text]", Attrs::new().set("class", "big"), ()).unwrap();
		let attrs = vnode.attrs().unwrap();
		assert_eq!(vnode.tag(), Some("input"));
		assert_eq!(attrs.get_str("id"), Some("name"));
		assert_eq!(attrs.get_str("type"), Some("text"));
		assert_eq!(attrs.get_str("class"), Some("field wide big"));
	}

	#[test]
	fn children_normalize() {
		let vnode: V = fragment(children![(), true, "a", 1, vec!["b", "c"], None::<V>]);
		match &vnode.kind {
			Kind::Fragment(children) => {
				assert_eq!(children.len(), 6);
				assert!(children[0].is_none());
				assert!(children[1].is_none());
				assert_eq!(children[2].as_ref().map(Vnode::kind), Some(KindTag::Text));
				assert_eq!(children[3].as_ref().map(Vnode::kind), Some(KindTag::Text));
				assert_eq!(children[4].as_ref().map(Vnode::kind), Some(KindTag::Fragment));
				assert!(children[5].is_none());
			}
			_ => panic!("expected a fragment"),
		}
	}

	#[test]
	fn attribute_children_apply_without_explicit_children() {
		let vnode: V = node("ul", Attrs::new().children(vec!["x", "y"]), ()).unwrap();
		match &vnode.kind {
			Kind::Element(element) => assert_eq!(element.children.len(), 2),
			_ => panic!("expected an element"),
		}

		let vnode: V = node("ul", Attrs::new().children(vec!["x", "y"]), "z").unwrap();
		match &vnode.kind {
			Kind::Element(element) => assert_eq!(element.children.len(), 1),
			_ => panic!("expected an element"),
		}
	}

	#[test]
	fn duplicate_keys_are_rejected() {
		let result: Result<V, _> = keyed(vec![1, 2, 1], |n| (n, n));
		assert!(matches!(result, Err(Error::DuplicateKey(Key::Int(1)))));
	}

	#[test]
	fn components_fold_children_into_attrs() {
		let component = Component::new(|cx: &ViewCx<'_, MemoryHost>| Ok(Init::view(cx.attrs.child_list().to_vec())));
		let vnode: V = node(component, (), children!["a", "b"]).unwrap();
		assert_eq!(vnode.kind(), KindTag::Component);
		assert_eq!(vnode.attrs().unwrap().child_list().len(), 2);
	}

	#[test]
	fn component_identity_follows_the_function() {
		fn a(_: &ViewCx<'_, MemoryHost>) -> ViewResult<Init<MemoryHost>> {
			Ok(Init::view(()))
		}
		fn b(_: &ViewCx<'_, MemoryHost>) -> ViewResult<Init<MemoryHost>> {
			Ok(Init::view(()))
		}
		assert!(Component::new(a).same(&Component::new(a)));
		assert!(!Component::new(a).same(&Component::new(b)));
	}
}
