//! An in-memory [`Host`] with a mutation log, a manual frame queue, a virtual clock and an in-memory history.
//!
//! ```
//! use sapwood::{mem::MemoryHost, node, RenderOptions, Renderer, Vnode};
//!
//! let host = MemoryHost::new();
//! let renderer = Renderer::new(host.clone());
//! let tree: Vnode<MemoryHost> = node("p.note", (), "Hi!").unwrap();
//! renderer.render(&host.body(), tree, &RenderOptions::default()).unwrap();
//! assert_eq!(host.inner_html(&host.body()), r#"<p class="note">Hi!</p>"#);
//! ```

use crate::{
	host::{format_number, Dispatch, FrameId, Host, HostError, Prop, HTML_NAMESPACE},
	rate::{Timer, TimerId},
	router::Location,
};
use core::{cell::RefCell, fmt};
use futures::{
	executor::{LocalPool, LocalSpawner},
	future::LocalBoxFuture,
	task::LocalSpawnExt,
};
use hashbrown::HashMap;
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{error, trace};

/// A node of a [`MemoryHost`] document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Registration token of a [`MemoryHost`] listener.
#[derive(Debug)]
pub struct MemoryListener(u64);

/// An event dispatched through [`MemoryHost::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEvent {
	pub event_type: String,
	pub target: NodeId,
	/// The node whose listener is running.
	pub current_target: NodeId,
}

/// One recorded change to a [`MemoryHost`] document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	CreateElement { node: NodeId, tag: String },
	CreateText { node: NodeId },
	SetText { node: NodeId },
	/// `moved` if `node` was attached somewhere before.
	Insert { parent: NodeId, node: NodeId, moved: bool },
	Remove { node: NodeId },
	SetProperty { node: NodeId, name: String },
	SetAttribute { node: NodeId, name: String },
	RemoveAttribute { node: NodeId, name: String },
	SetStyle { node: NodeId, name: String },
	Listen { node: NodeId, event_type: String },
	Unlisten { node: NodeId, event_type: String },
	Focus { node: NodeId },
}

impl Mutation {
	/// Whether this is an insertion that moved an attached node.
	#[must_use]
	pub fn is_move(&self) -> bool {
		matches!(self, Mutation::Insert { moved: true, .. })
	}

	#[must_use]
	pub fn is_create(&self) -> bool {
		matches!(self, Mutation::CreateElement { .. } | Mutation::CreateText { .. })
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PropKind {
	Str,
	Bool,
	Number,
}

/// A property backed by an attribute.
struct Reflection {
	property: &'static str,
	attribute: &'static str,
	kind: PropKind,
	/// Empty for properties all HTML elements have.
	tags: &'static [&'static str],
}

const fn reflect(property: &'static str, attribute: &'static str, kind: PropKind, tags: &'static [&'static str]) -> Reflection {
	Reflection { property, attribute, kind, tags }
}

const FORM_CONTROLS: &[&str] = &["input", "select", "textarea", "button"];

static REFLECTED: &[Reflection] = &[
	reflect("id", "id", PropKind::Str, &[]),
	reflect("className", "class", PropKind::Str, &[]),
	reflect("title", "title", PropKind::Str, &[]),
	reflect("lang", "lang", PropKind::Str, &[]),
	reflect("dir", "dir", PropKind::Str, &[]),
	reflect("hidden", "hidden", PropKind::Bool, &[]),
	reflect("tabIndex", "tabindex", PropKind::Number, &[]),
	reflect("href", "href", PropKind::Str, &["a", "area", "base", "link"]),
	reflect("target", "target", PropKind::Str, &["a", "area", "base", "form"]),
	reflect("rel", "rel", PropKind::Str, &["a", "area", "link"]),
	reflect("src", "src", PropKind::Str, &["img", "script", "iframe", "video", "audio", "source", "input"]),
	reflect("alt", "alt", PropKind::Str, &["img", "area", "input"]),
	reflect("width", "width", PropKind::Number, &["img", "canvas", "video", "iframe", "input"]),
	reflect("height", "height", PropKind::Number, &["img", "canvas", "video", "iframe", "input"]),
	reflect("name", "name", PropKind::Str, &["input", "select", "textarea", "button", "form", "iframe"]),
	reflect("type", "type", PropKind::Str, &["input", "button", "script"]),
	reflect("placeholder", "placeholder", PropKind::Str, &["input", "textarea"]),
	reflect("disabled", "disabled", PropKind::Bool, &["input", "select", "textarea", "button", "option", "optgroup", "fieldset"]),
	reflect("required", "required", PropKind::Bool, FORM_CONTROLS),
	reflect("readOnly", "readonly", PropKind::Bool, &["input", "textarea"]),
	reflect("multiple", "multiple", PropKind::Bool, &["input", "select"]),
	reflect("htmlFor", "for", PropKind::Str, &["label", "output"]),
	reflect("label", "label", PropKind::Str, &["option", "optgroup"]),
];

/// Properties that hold state of their own instead of mirroring an attribute.
static STATEFUL: &[(&str, &[&str])] = &[
	("value", &["input", "textarea", "select", "option", "button"]),
	("checked", &["input"]),
	("selected", &["option"]),
	("selectedIndex", &["select"]),
];

const VOID_ELEMENTS: &[&str] = &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr"];

struct Attribute {
	namespace: Option<String>,
	name: String,
}

impl Attribute {
	fn local_name(&self) -> &str {
		self.name.split_once(':').map_or(&*self.name, |(_, local)| local)
	}

	fn matches(&self, namespace: Option<&str>, name: &str) -> bool {
		match namespace {
			Some(namespace) => self.namespace.as_deref() == Some(namespace) && self.local_name() == name,
			None => self.name == name,
		}
	}
}

struct Element {
	tag: String,
	namespace: String,
	attributes: Vec<(Attribute, String)>,
	properties: HashMap<String, Prop>,
	style: IndexMap<String, String>,
	/// A `select` whose value was set to something none of its options has.
	no_selection: bool,
}

enum Data {
	Element(Element),
	Text(String),
}

struct NodeData {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	data: Data,
	listeners: Vec<(String, u64, Dispatch<MemoryEvent>)>,
}

struct Document {
	nodes: Vec<NodeData>,
	body: NodeId,
	log: Vec<Mutation>,
	focused: Option<NodeId>,
	next_listener: u64,
	next_frame: i32,
	frames: Vec<(FrameId, Box<dyn FnOnce()>)>,
	now: f64,
	next_timer: i32,
	/// `(id, due, callback)` in scheduling order.
	timers: Vec<(TimerId, f64, Box<dyn FnOnce()>)>,
	history: Vec<String>,
	history_index: usize,
}

impl Document {
	fn node(&self, id: NodeId) -> &NodeData {
		&self.nodes[id.0]
	}

	fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
		&mut self.nodes[id.0]
	}

	fn element(&self, id: NodeId) -> Option<&Element> {
		match &self.node(id).data {
			Data::Element(element) => Some(element),
			Data::Text(_) => None,
		}
	}

	fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
		match &mut self.node_mut(id).data {
			Data::Element(element) => Some(element),
			Data::Text(_) => None,
		}
	}

	fn push(&mut self, data: Data) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(NodeData {
			parent: None,
			children: Vec::new(),
			data,
			listeners: Vec::new(),
		});
		id
	}

	fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut current = Some(node);
		while let Some(id) = current {
			if id == ancestor {
				return true;
			}
			current = self.node(id).parent;
		}
		false
	}

	fn detach(&mut self, node: NodeId) -> bool {
		let Some(parent) = self.node_mut(node).parent.take() else { return false };
		self.node_mut(parent).children.retain(|&child| child != node);
		if let Some(focused) = self.focused {
			if self.contains(node, focused) {
				trace!("Blurring detached focus.");
				self.focused = None;
			}
		}
		true
	}

	fn text_content(&self, node: NodeId) -> String {
		match &self.node(node).data {
			Data::Text(text) => text.clone(),
			Data::Element(_) => self.node(node).children.iter().map(|&child| self.text_content(child)).collect(),
		}
	}

	fn tag(&self, node: NodeId) -> Option<&str> {
		self.element(node).filter(|element| element.namespace == HTML_NAMESPACE).map(|element| &*element.tag)
	}

	fn attribute(&self, node: NodeId, namespace: Option<&str>, name: &str) -> Option<String> {
		let element = self.element(node)?;
		if namespace.is_none() && name == "style" {
			return (!element.style.is_empty()).then(|| serialize_style(&element.style));
		}
		element.attributes.iter().find(|(attribute, _)| attribute.matches(namespace, name)).map(|(_, value)| value.clone())
	}

	fn write_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str, value: &str) -> Result<(), HostError> {
		let element = self.element_mut(node).ok_or_else(|| HostError::new("Attributes can only be set on elements."))?;
		if namespace.is_none() && name == "style" {
			element.style = parse_style(value);
			return Ok(());
		}
		let local = name.split_once(':').map_or(name, |(_, local)| local);
		match element.attributes.iter_mut().find(|(attribute, _)| attribute.matches(namespace, if namespace.is_some() { local } else { name })) {
			Some((_, existing)) => value.clone_into(existing),
			None => element.attributes.push((
				Attribute {
					namespace: namespace.map(ToOwned::to_owned),
					name: name.to_owned(),
				},
				value.to_owned(),
			)),
		}
		Ok(())
	}

	fn erase_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str) {
		if let Some(element) = self.element_mut(node) {
			if namespace.is_none() && name == "style" {
				element.style.clear();
			} else {
				element.attributes.retain(|(attribute, _)| !attribute.matches(namespace, name));
			}
		}
	}

	fn options(&self, select: NodeId, options: &mut Vec<NodeId>) {
		for &child in &self.node(select).children {
			match self.tag(child) {
				Some("option") => options.push(child),
				Some("optgroup") => self.options(child, options),
				_ => (),
			}
		}
	}

	fn option_value(&self, option: NodeId) -> String {
		self.attribute(option, None, "value").unwrap_or_else(|| self.text_content(option).trim().to_owned())
	}

	fn option_selected(&self, option: NodeId) -> bool {
		match self.element(option).and_then(|element| element.properties.get("selected")) {
			Some(Prop::Bool(selected)) => *selected,
			_ => self.attribute(option, None, "selected").is_some(),
		}
	}

	fn selected_index(&self, select: NodeId) -> Option<usize> {
		let mut options = Vec::new();
		self.options(select, &mut options);
		if let Some(i) = options.iter().position(|&option| self.option_selected(option)) {
			return Some(i);
		}
		let cleared = self.element(select).map_or(false, |element| element.no_selection);
		(!cleared && !options.is_empty()).then(|| 0)
	}

	fn select(&mut self, select: NodeId, pick: impl Fn(usize, &str) -> bool) {
		let mut options = Vec::new();
		self.options(select, &mut options);
		let mut any = false;
		for (i, option) in options.into_iter().enumerate() {
			let selected = !any && pick(i, &self.option_value(option));
			any |= selected;
			if let Some(element) = self.element_mut(option) {
				element.properties.insert("selected".to_owned(), Prop::Bool(selected));
			}
		}
		if let Some(element) = self.element_mut(select) {
			element.no_selection = !any;
		}
	}

	fn has_property(&self, node: NodeId, name: &str) -> bool {
		let Some(element) = self.element(node) else { return false };
		if element.properties.contains_key(name) {
			return true;
		}
		let Some(tag) = self.tag(node) else { return false };
		reflection(tag, name).is_some() || STATEFUL.iter().any(|(property, tags)| *property == name && tags.contains(&tag))
	}

	fn get_property(&self, node: NodeId, name: &str) -> Prop {
		let Some(element) = self.element(node) else { return Prop::Null };
		let tag = self.tag(node).unwrap_or_default();
		match (tag, name) {
			("input" | "textarea", "value") => element.properties.get("value").cloned().unwrap_or_else(|| {
				Prop::Str(if tag == "input" { self.attribute(node, None, "value").unwrap_or_default() } else { self.text_content(node) })
			}),
			("option", "value") => Prop::Str(self.option_value(node)),
			("button", "value") => Prop::Str(self.attribute(node, None, "value").unwrap_or_default()),
			("select", "value") => {
				let mut options = Vec::new();
				self.options(node, &mut options);
				Prop::Str(self.selected_index(node).and_then(|i| options.get(i)).map(|&option| self.option_value(option)).unwrap_or_default())
			}
			("select", "selectedIndex") => Prop::Number(self.selected_index(node).map_or(-1.0, index_number)),
			("input", "checked") => element.properties.get("checked").cloned().unwrap_or_else(|| Prop::Bool(self.attribute(node, None, "checked").is_some())),
			("option", "selected") => Prop::Bool(self.option_selected(node)),
			_ => match reflection(tag, name) {
				Some(reflection) => {
					let attribute = self.attribute(node, None, reflection.attribute);
					match reflection.kind {
						PropKind::Str => Prop::Str(attribute.unwrap_or_default()),
						PropKind::Bool => Prop::Bool(attribute.is_some()),
						PropKind::Number => Prop::Number(attribute.and_then(|text| text.trim().parse().ok()).unwrap_or(if name == "tabIndex" { -1.0 } else { 0.0 })),
					}
				}
				None => element.properties.get(name).cloned().unwrap_or(Prop::Null),
			},
		}
	}

	fn set_property(&mut self, node: NodeId, name: &str, value: Prop) -> Result<(), HostError> {
		let tag = self.tag(node).unwrap_or_default().to_owned();
		match (&*tag, name) {
			("input" | "textarea", "value") => {
				let text = if value == Prop::Null { String::new() } else { value.to_text() };
				if tag == "input" && self.attribute(node, None, "type").as_deref() == Some("file") && !text.is_empty() {
					return Err(HostError::new("InvalidStateError: file inputs only accept an empty value."));
				}
				self.stateful(node, "value", Prop::Str(text));
			}
			("option" | "button", "value") => self.write_attribute(node, None, "value", &value.to_text())?,
			("select", "value") => {
				let wanted = value.to_text();
				self.select(node, |_, value| value == wanted);
			}
			("select", "selectedIndex") => {
				let wanted = to_number(&value);
				self.select(node, |i, _| index_number(i) == wanted);
			}
			("input", "checked") => self.stateful(node, "checked", Prop::Bool(truthy(&value))),
			("option", "selected") => {
				let selected = truthy(&value);
				let select = self.node(node).parent.filter(|&parent| self.tag(parent) == Some("select"));
				match select {
					Some(select) if selected && self.attribute(select, None, "multiple").is_none() => self.select(select, |_, _| false),
					_ => (),
				}
				self.stateful(node, "selected", Prop::Bool(selected));
				if let Some(element) = select.and_then(|select| self.element_mut(select)) {
					element.no_selection &= !selected;
				}
			}
			_ => match reflection(&tag, name) {
				Some(reflection) => match reflection.kind {
					PropKind::Bool if !truthy(&value) => self.erase_attribute(node, None, reflection.attribute),
					PropKind::Bool => self.write_attribute(node, None, reflection.attribute, "")?,
					PropKind::Number => self.write_attribute(node, None, reflection.attribute, &format_number(to_number(&value)))?,
					PropKind::Str => self.write_attribute(node, None, reflection.attribute, &value.to_text())?,
				},
				None => self.stateful(node, name, value),
			},
		}
		Ok(())
	}

	fn stateful(&mut self, node: NodeId, name: &str, value: Prop) {
		if let Some(element) = self.element_mut(node) {
			element.properties.insert(name.to_owned(), value);
		}
	}

	fn serialize(&self, node: NodeId, out: &mut String) {
		match &self.node(node).data {
			Data::Text(text) => out.push_str(&escape(text, false)),
			Data::Element(element) => {
				out.push('<');
				out.push_str(&element.tag);
				for (attribute, value) in &element.attributes {
					out.push(' ');
					out.push_str(&attribute.name);
					out.push_str("=\"");
					out.push_str(&escape(value, true));
					out.push('"');
				}
				if !element.style.is_empty() {
					out.push_str(" style=\"");
					out.push_str(&escape(&serialize_style(&element.style), true));
					out.push('"');
				}
				out.push('>');
				if element.namespace == HTML_NAMESPACE && VOID_ELEMENTS.contains(&&*element.tag) {
					return;
				}
				for &child in &self.node(node).children {
					self.serialize(child, out);
				}
				out.push_str("</");
				out.push_str(&element.tag);
				out.push('>');
			}
		}
	}
}

fn reflection(tag: &str, name: &str) -> Option<&'static Reflection> {
	REFLECTED.iter().find(|reflection| reflection.property == name && (reflection.tags.is_empty() || reflection.tags.contains(&tag)))
}

#[allow(clippy::cast_precision_loss)]
fn index_number(index: usize) -> f64 {
	index as f64
}

fn truthy(value: &Prop) -> bool {
	match value {
		Prop::Null => false,
		Prop::Bool(value) => *value,
		Prop::Number(value) => *value != 0.0 && !value.is_nan(),
		Prop::Str(value) => !value.is_empty(),
	}
}

fn to_number(value: &Prop) -> f64 {
	match value {
		Prop::Null | Prop::Bool(false) => 0.0,
		Prop::Bool(true) => 1.0,
		Prop::Number(value) => *value,
		Prop::Str(value) if value.trim().is_empty() => 0.0,
		Prop::Str(value) => value.trim().parse().unwrap_or(f64::NAN),
	}
}

fn escape(text: &str, attribute: bool) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'"' if attribute => escaped.push_str("&quot;"),
			'<' if !attribute => escaped.push_str("&lt;"),
			'>' if !attribute => escaped.push_str("&gt;"),
			c => escaped.push(c),
		}
	}
	escaped
}

/// `backgroundColor` → `background-color`
fn kebab_case(name: &str) -> String {
	let mut kebab = String::with_capacity(name.len() + 2);
	for c in name.chars() {
		if c.is_ascii_uppercase() {
			kebab.push('-');
			kebab.push(c.to_ascii_lowercase());
		} else {
			kebab.push(c);
		}
	}
	kebab
}

fn serialize_style(style: &IndexMap<String, String>) -> String {
	style.iter().map(|(name, value)| format!("{}: {};", name, value)).collect::<Vec<_>>().join(" ")
}

fn parse_style(text: &str) -> IndexMap<String, String> {
	text.split(';')
		.filter_map(|declaration| declaration.split_once(':'))
		.map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
		.filter(|(name, value)| !name.is_empty() && !value.is_empty())
		.collect()
}

fn valid_name(name: &str) -> bool {
	!name.is_empty() && !name.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<' | '\0'))
}

/// An in-memory document.
///
/// All clones share the same document. The root of the document is [`body`](`MemoryHost::body`).
#[derive(Clone)]
pub struct MemoryHost {
	document: Rc<RefCell<Document>>,
	pool: Rc<RefCell<LocalPool>>,
	spawner: LocalSpawner,
}

impl Default for MemoryHost {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for MemoryHost {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let document = self.document.borrow();
		f.debug_struct("MemoryHost")
			.field("nodes", &document.nodes.len())
			.field("log", &document.log.len())
			.field("frames", &document.frames.len())
			.field("timers", &document.timers.len())
			.field("now", &document.now)
			.finish()
	}
}

impl MemoryHost {
	#[must_use]
	pub fn new() -> Self {
		let mut document = Document {
			nodes: Vec::new(),
			body: NodeId(0),
			log: Vec::new(),
			focused: None,
			next_listener: 0,
			next_frame: 1,
			frames: Vec::new(),
			now: 0.0,
			next_timer: 1,
			timers: Vec::new(),
			history: vec!["/".to_owned()],
			history_index: 0,
		};
		document.body = document.push(Data::Element(Element {
			tag: "body".to_owned(),
			namespace: HTML_NAMESPACE.to_owned(),
			attributes: Vec::new(),
			properties: HashMap::new(),
			style: IndexMap::new(),
			no_selection: false,
		}));
		let pool = LocalPool::new();
		let spawner = pool.spawner();
		Self {
			document: Rc::new(RefCell::new(document)),
			pool: Rc::new(RefCell::new(pool)),
			spawner,
		}
	}

	/// The document root. It is always connected.
	#[must_use]
	pub fn body(&self) -> NodeId {
		self.document.borrow().body
	}

	/// Drains the mutation log.
	pub fn take_log(&self) -> Vec<Mutation> {
		core::mem::take(&mut self.document.borrow_mut().log)
	}

	fn log(&self, mutation: Mutation) {
		self.document.borrow_mut().log.push(mutation);
	}

	#[must_use]
	pub fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.document.borrow().node(*node).parent
	}

	#[must_use]
	pub fn children(&self, node: &NodeId) -> Vec<NodeId> {
		self.document.borrow().node(*node).children.clone()
	}

	/// The tag name of an element.
	#[must_use]
	pub fn tag(&self, node: &NodeId) -> Option<String> {
		self.document.borrow().element(*node).map(|element| element.tag.clone())
	}

	/// The data of a text node.
	#[must_use]
	pub fn text(&self, node: &NodeId) -> Option<String> {
		match &self.document.borrow().node(*node).data {
			Data::Text(text) => Some(text.clone()),
			Data::Element(_) => None,
		}
	}

	#[must_use]
	pub fn text_content(&self, node: &NodeId) -> String {
		self.document.borrow().text_content(*node)
	}

	/// A declaration of the element's inline style, by its kebab-case name.
	#[must_use]
	pub fn style(&self, node: &NodeId, name: &str) -> Option<String> {
		self.document.borrow().element(*node).and_then(|element| element.style.get(name).cloned())
	}

	#[must_use]
	pub fn listener_count(&self, node: &NodeId) -> usize {
		self.document.borrow().node(*node).listeners.len()
	}

	#[must_use]
	pub fn outer_html(&self, node: &NodeId) -> String {
		let mut html = String::new();
		self.document.borrow().serialize(*node, &mut html);
		html
	}

	#[must_use]
	pub fn inner_html(&self, node: &NodeId) -> String {
		let document = self.document.borrow();
		let mut html = String::new();
		for &child in &document.node(*node).children {
			document.serialize(child, &mut html);
		}
		html
	}

	/// Fires an event of `event_type` at `target`, bubbling up through its ancestors.
	///
	/// Returns how many listeners ran.
	pub fn dispatch(&self, target: &NodeId, event_type: &str) -> usize {
		let path = {
			let document = self.document.borrow();
			let mut path = Vec::new();
			let mut current = Some(*target);
			while let Some(node) = current {
				for (listened, _, dispatch) in &document.node(node).listeners {
					if listened == event_type {
						path.push((node, Rc::clone(dispatch)));
					}
				}
				current = document.node(node).parent;
			}
			path
		};
		let count = path.len();
		for (current_target, dispatch) in path {
			dispatch(&MemoryEvent {
				event_type: event_type.to_owned(),
				target: *target,
				current_target,
			});
		}
		count
	}

	/// Runs the animation frame callbacks requested so far. Frames requested by them wait for the next call.
	///
	/// Returns how many callbacks ran.
	pub fn run_frames(&self) -> usize {
		let frames = core::mem::take(&mut self.document.borrow_mut().frames);
		let count = frames.len();
		trace!(count, "Running animation frames.");
		for (_, callback) in frames {
			callback();
		}
		count
	}

	#[must_use]
	pub fn pending_frames(&self) -> usize {
		self.document.borrow().frames.len()
	}

	/// Advances the virtual clock by `ms`, running timeouts that come due in order.
	pub fn advance(&self, ms: f64) {
		let until = self.document.borrow().now + ms;
		loop {
			let due = {
				let mut document = self.document.borrow_mut();
				let next = document
					.timers
					.iter()
					.enumerate()
					.filter(|(_, (_, due, _))| *due <= until)
					.min_by(|(_, (_, a, _)), (_, (_, b, _))| a.total_cmp(b))
					.map(|(i, _)| i);
				next.map(|i| {
					let (_, due, callback) = document.timers.remove(i);
					document.now = document.now.max(due);
					callback
				})
			};
			match due {
				Some(callback) => callback(),
				None => break,
			}
		}
		self.document.borrow_mut().now = until;
	}

	/// Polls spawned futures until none of them can make progress.
	pub fn run_until_stalled(&self) {
		self.pool.borrow_mut().run_until_stalled();
	}

	/// The history entries, oldest first.
	#[must_use]
	pub fn history(&self) -> Vec<String> {
		let document = self.document.borrow();
		document.history[..=document.history_index].to_vec()
	}

	/// Steps back in history. Returns whether there was an entry to go back to.
	pub fn back(&self) -> bool {
		let mut document = self.document.borrow_mut();
		if document.history_index == 0 {
			return false;
		}
		document.history_index -= 1;
		true
	}

	fn check_insert(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> Result<(), HostError> {
		let document = self.document.borrow();
		if document.element(parent).is_none() {
			return Err(HostError::new("HierarchyRequestError: text nodes can't have children."));
		}
		if document.contains(node, parent) {
			return Err(HostError::new("HierarchyRequestError: a node can't be inserted into itself."));
		}
		if let Some(reference) = reference {
			if reference != node && document.node(reference).parent != Some(parent) {
				return Err(HostError::new("NotFoundError: the reference node is not a child of the parent."));
			}
		}
		Ok(())
	}
}

impl Host for MemoryHost {
	type Node = NodeId;
	type Event = MemoryEvent;
	type Listener = MemoryListener;

	fn create_element(&self, tag: &str, namespace: Option<&str>, is: Option<&str>) -> Result<NodeId, HostError> {
		if !valid_name(tag) {
			return Err(HostError::new(format!("InvalidCharacterError: {:?} is not a valid tag name.", tag)));
		}
		let namespace = namespace.unwrap_or(HTML_NAMESPACE);
		let mut element = Element {
			tag: if namespace == HTML_NAMESPACE { tag.to_ascii_lowercase() } else { tag.to_owned() },
			namespace: namespace.to_owned(),
			attributes: Vec::new(),
			properties: HashMap::new(),
			style: IndexMap::new(),
			no_selection: false,
		};
		if let Some(is) = is {
			element.attributes.push((Attribute { namespace: None, name: "is".to_owned() }, is.to_owned()));
		}
		let node = self.document.borrow_mut().push(Data::Element(element));
		self.log(Mutation::CreateElement { node, tag: tag.to_owned() });
		Ok(node)
	}

	fn create_text(&self, data: &str) -> NodeId {
		let node = self.document.borrow_mut().push(Data::Text(data.to_owned()));
		self.log(Mutation::CreateText { node });
		node
	}

	fn set_text(&self, node: &NodeId, data: &str) {
		if let Data::Text(text) = &mut self.document.borrow_mut().node_mut(*node).data {
			data.clone_into(text);
		}
		self.log(Mutation::SetText { node: *node });
	}

	fn first_child(&self, parent: &NodeId) -> Option<NodeId> {
		self.document.borrow().node(*parent).children.first().copied()
	}

	fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
		let document = self.document.borrow();
		let parent = document.node(*node).parent?;
		let siblings = &document.node(parent).children;
		let i = siblings.iter().position(|child| child == node)?;
		siblings.get(i + 1).copied()
	}

	fn insert_before(&self, parent: &NodeId, node: &NodeId, reference: Option<&NodeId>) -> Result<(), HostError> {
		if reference == Some(node) {
			return Ok(());
		}
		self.check_insert(*parent, *node, reference.copied())?;
		let mut document = self.document.borrow_mut();
		let moved = document.detach(*node);
		let index = match reference {
			Some(reference) => document.node(*parent).children.iter().position(|child| child == reference).unwrap_or(document.node(*parent).children.len()),
			None => document.node(*parent).children.len(),
		};
		document.node_mut(*parent).children.insert(index, *node);
		document.node_mut(*node).parent = Some(*parent);
		document.log.push(Mutation::Insert {
			parent: *parent,
			node: *node,
			moved,
		});
		Ok(())
	}

	fn remove(&self, node: &NodeId) {
		let mut document = self.document.borrow_mut();
		if document.detach(*node) {
			document.log.push(Mutation::Remove { node: *node });
		}
	}

	fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
		self.document.borrow().contains(*ancestor, *node)
	}

	fn is_connected(&self, node: &NodeId) -> bool {
		let document = self.document.borrow();
		document.contains(document.body, *node)
	}

	fn namespace_of(&self, node: &NodeId) -> Option<String> {
		self.document.borrow().element(*node).map(|element| element.namespace.clone())
	}

	fn has_property(&self, node: &NodeId, name: &str) -> bool {
		self.document.borrow().has_property(*node, name)
	}

	fn get_property(&self, node: &NodeId, name: &str) -> Prop {
		self.document.borrow().get_property(*node, name)
	}

	fn set_property(&self, node: &NodeId, name: &str, value: Prop) -> Result<(), HostError> {
		self.document.borrow_mut().set_property(*node, name, value)?;
		self.log(Mutation::SetProperty { node: *node, name: name.to_owned() });
		Ok(())
	}

	fn get_attribute(&self, node: &NodeId, namespace: Option<&str>, name: &str) -> Option<String> {
		self.document.borrow().attribute(*node, namespace, name)
	}

	fn set_attribute(&self, node: &NodeId, namespace: Option<&str>, name: &str, value: &str) -> Result<(), HostError> {
		if !valid_name(name) {
			return Err(HostError::new(format!("InvalidCharacterError: {:?} is not a valid attribute name.", name)));
		}
		self.document.borrow_mut().write_attribute(*node, namespace, name, value)?;
		self.log(Mutation::SetAttribute { node: *node, name: name.to_owned() });
		Ok(())
	}

	fn remove_attribute(&self, node: &NodeId, namespace: Option<&str>, name: &str) -> Result<(), HostError> {
		self.document.borrow_mut().erase_attribute(*node, namespace, name);
		self.log(Mutation::RemoveAttribute { node: *node, name: name.to_owned() });
		Ok(())
	}

	fn set_style(&self, node: &NodeId, name: &str, value: Option<&str>) -> Result<(), HostError> {
		self.set_style_raw(node, &kebab_case(name), value)
	}

	fn set_style_raw(&self, node: &NodeId, name: &str, value: Option<&str>) -> Result<(), HostError> {
		{
			let mut document = self.document.borrow_mut();
			let element = document.element_mut(*node).ok_or_else(|| HostError::new("Only elements have a style."))?;
			match value {
				Some(value) if !value.is_empty() => {
					element.style.insert(name.to_owned(), value.to_owned());
				}
				_ => {
					element.style.shift_remove(name);
				}
			}
		}
		self.log(Mutation::SetStyle { node: *node, name: name.to_owned() });
		Ok(())
	}

	fn event_type(&self, event: &MemoryEvent) -> String {
		event.event_type.clone()
	}

	fn listen(&self, node: &NodeId, event_type: &str, dispatch: Dispatch<MemoryEvent>) -> Result<MemoryListener, HostError> {
		let mut document = self.document.borrow_mut();
		let id = document.next_listener;
		document.next_listener += 1;
		document.node_mut(*node).listeners.push((event_type.to_owned(), id, dispatch));
		document.log.push(Mutation::Listen {
			node: *node,
			event_type: event_type.to_owned(),
		});
		Ok(MemoryListener(id))
	}

	fn unlisten(&self, node: &NodeId, event_type: &str, listener: MemoryListener) {
		let mut document = self.document.borrow_mut();
		document.node_mut(*node).listeners.retain(|(_, id, _)| *id != listener.0);
		document.log.push(Mutation::Unlisten {
			node: *node,
			event_type: event_type.to_owned(),
		});
	}

	fn active_element(&self) -> Option<NodeId> {
		let document = self.document.borrow();
		document.focused.filter(|&focused| document.contains(document.body, focused))
	}

	fn focus(&self, node: &NodeId) {
		let mut document = self.document.borrow_mut();
		if document.element(*node).is_some() && document.contains(document.body, *node) {
			document.focused = Some(*node);
			document.log.push(Mutation::Focus { node: *node });
		}
	}

	fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Result<FrameId, HostError> {
		let mut document = self.document.borrow_mut();
		let frame = FrameId(document.next_frame);
		document.next_frame += 1;
		document.frames.push((frame, callback));
		Ok(frame)
	}

	fn cancel_frame(&self, frame: FrameId) {
		self.document.borrow_mut().frames.retain(|(id, _)| *id != frame);
	}

	fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
		if let Err(error) = self.spawner.spawn_local(future) {
			error!("Could not spawn a local future: {}", error);
		}
	}
}

impl Timer for MemoryHost {
	fn now(&self) -> f64 {
		self.document.borrow().now
	}

	fn set_timeout(&self, delay: f64, callback: Box<dyn FnOnce()>) -> Result<TimerId, HostError> {
		let mut document = self.document.borrow_mut();
		let id = TimerId(document.next_timer);
		document.next_timer += 1;
		let due = document.now + delay.max(0.0);
		document.timers.push((id, due, callback));
		Ok(id)
	}

	fn clear_timeout(&self, id: TimerId) {
		self.document.borrow_mut().timers.retain(|(timer, _, _)| *timer != id);
	}
}

impl Location for MemoryHost {
	fn href(&self) -> String {
		let document = self.document.borrow();
		document.history[document.history_index].clone()
	}

	fn push(&self, href: &str) -> Result<(), HostError> {
		let mut document = self.document.borrow_mut();
		let next = document.history_index + 1;
		document.history.truncate(next);
		document.history.push(href.to_owned());
		document.history_index = next;
		Ok(())
	}

	fn replace(&self, href: &str) -> Result<(), HostError> {
		let mut document = self.document.borrow_mut();
		let index = document.history_index;
		href.clone_into(&mut document.history[index]);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn moving_focus_blurs() {
		let host = MemoryHost::new();
		let body = host.body();
		let a = host.create_element("input", None, None).unwrap();
		let b = host.create_element("div", None, None).unwrap();
		host.insert_before(&body, &a, None).unwrap();
		host.insert_before(&body, &b, None).unwrap();
		host.focus(&a);
		assert_eq!(host.active_element(), Some(a));

		host.insert_before(&body, &b, Some(&a)).unwrap();
		assert_eq!(host.active_element(), Some(a), "moving a sibling keeps focus");
		host.insert_before(&body, &a, Some(&b)).unwrap();
		assert_eq!(host.active_element(), None);
	}

	#[test]
	fn reflection() {
		let host = MemoryHost::new();
		let input = host.create_element("input", None, None).unwrap();
		assert!(host.has_property(&input, "value"));
		assert!(!host.has_property(&input, "href"));

		host.set_property(&input, "className", Prop::Str("a b".to_owned())).unwrap();
		assert_eq!(host.get_attribute(&input, None, "class").as_deref(), Some("a b"));
		host.set_property(&input, "disabled", Prop::Bool(true)).unwrap();
		assert_eq!(host.outer_html(&input), r#"<input class="a b" disabled="">"#);

		host.set_property(&input, "value", Prop::Str("typed".to_owned())).unwrap();
		assert_eq!(host.get_attribute(&input, None, "value"), None);
		assert_eq!(host.get_property(&input, "value"), Prop::Str("typed".to_owned()));
	}

	#[test]
	fn select_value() {
		let host = MemoryHost::new();
		let select = host.create_element("select", None, None).unwrap();
		for value in ["a", "b"] {
			let option = host.create_element("option", None, None).unwrap();
			host.set_attribute(&option, None, "value", value).unwrap();
			host.insert_before(&select, &option, None).unwrap();
		}
		assert_eq!(host.get_property(&select, "value"), Prop::Str("a".to_owned()));
		host.set_property(&select, "value", Prop::Str("b".to_owned())).unwrap();
		assert_eq!(host.get_property(&select, "selectedIndex"), Prop::Number(1.0));
		host.set_property(&select, "value", Prop::Str("nope".to_owned())).unwrap();
		assert_eq!(host.get_property(&select, "selectedIndex"), Prop::Number(-1.0));
	}

	#[test]
	fn timers_run_in_order() {
		let host = MemoryHost::new();
		let order = Rc::new(RefCell::new(Vec::new()));
		for (delay, name) in [(20.0, "late"), (10.0, "early"), (30.0, "never")] {
			let order = order.clone();
			host.set_timeout(delay, Box::new(move || order.borrow_mut().push(name))).unwrap();
		}
		host.advance(25.0);
		assert_eq!(*order.borrow(), ["early", "late"]);
		assert_eq!(host.now(), 25.0);
	}
}
