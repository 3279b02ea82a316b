//! The reconciler: brings a committed vnode tree and the live nodes it owns in line with a new tree.
//!
//! Every position is a [`Slot`]. After [`Pass::update`] returns, the slot holds exactly the vnodes whose live nodes are
//! in the document, so the next render can diff against it, even if this one failed part-way.

use crate::{
	attrs::{Attrs, Value},
	context::Context,
	error::Error,
	host::{Host, HostError, MATHML_NAMESPACE, SVG_NAMESPACE},
	patch::{patch_attrs, Target},
	render::Redraw,
	signal::AbortController,
	vnode::{normalize, Child, ComponentNode, ElementNode, Flags, Init, InlineNode, Key, Kind, LayoutFn, Render, Slot, ViewCx, ViewResult, Vnode},
};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span, warn};

/// Where children are being placed.
#[derive(Clone)]
pub(crate) struct Scope<H: Host> {
	pub parent: H::Node,
	pub namespace: Option<Rc<str>>,
	pub context: Context,
	pub depth: usize,
}

impl<H: Host> Scope<H> {
	fn deeper(&self) -> Self {
		Self {
			depth: self.depth + 1,
			..self.clone()
		}
	}
}

/// State of one reconciliation run.
pub(crate) struct Pass<'a, H: Host> {
	pub host: &'a H,
	/// Layout hooks with the container they were reconciled in, in reconciliation order.
	pub hooks: Vec<(LayoutFn<H>, H::Node)>,
	pub redraw: Option<&'a Redraw>,
	pub remove_on_throw: bool,
	pub depth_limit: usize,
}

impl<'a, H: Host> Pass<'a, H> {
	/// Reconciles `slot` against `new`, placing live nodes after `cursor` and leaving `cursor` on the last one placed.
	///
	/// # Errors
	///
	/// Fatal errors, and with [`Pass::remove_on_throw`] any error. Other failures are logged and contained to their subtree.
	pub fn update(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, slot: &mut Slot<H>, new: Slot<H>) -> Result<(), Error> {
		if scope.depth > self.depth_limit && new.is_some() {
			error!("Depth limit reached");
			return Err(Error::DepthLimit(self.depth_limit));
		}

		match (slot.take(), new) {
			(None, None) => Ok(()),
			(Some(old), Some(new)) if new.is_retain() => {
				if let Some(last) = last_node(&old) {
					*cursor = Some(last);
				}
				*slot = Some(old);
				Ok(())
			}
			(None, Some(new)) if new.is_retain() => Ok(()),
			(Some(mut old), None) => {
				self.remove(&mut old, true);
				Ok(())
			}
			(old, Some(mut new)) => {
				if new.flags.contains(Flags::USED) {
					*slot = old;
					return Err(Error::NodeReused);
				}
				let result = match old {
					Some(old) if old.matches(&new) => {
						new.flags |= old.flags;
						self.patch(scope, cursor, old, &mut new)
					}
					old => {
						if let Some(mut old) = old {
							self.remove(&mut old, true);
						}
						new.flags |= Flags::USED;
						self.create(scope, cursor, &mut new)
					}
				};
				match result {
					Ok(()) => {
						*slot = Some(new);
						Ok(())
					}
					Err(error) if error.is_fatal() && !self.remove_on_throw => {
						*slot = Some(new);
						Err(error)
					}
					Err(error) => {
						self.remove(&mut new, true);
						self.settle(error)
					}
				}
			}
		}
	}

	/// Contains `error` unless it has to reach the caller.
	fn settle(&self, error: Error) -> Result<(), Error> {
		if error.is_fatal() || self.remove_on_throw {
			Err(error)
		} else {
			error!("Contained failure: {}", error);
			Ok(())
		}
	}

	fn insert(&self, scope: &Scope<H>, cursor: &mut Option<H::Node>, node: &H::Node) -> Result<(), HostError> {
		let reference = match cursor {
			Some(previous) => self.host.next_sibling(previous),
			None => self.host.first_child(&scope.parent),
		};
		self.host.insert_before(&scope.parent, node, reference.as_ref())?;
		*cursor = Some(node.clone());
		Ok(())
	}

	#[instrument(skip(self, scope, cursor, vnode))]
	fn create(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, vnode: &mut Vnode<H>) -> Result<(), Error> {
		match &mut vnode.kind {
			Kind::Retain | Kind::Removal { .. } => Ok(()),
			Kind::Text { data, node } => {
				let span = trace_span!("Creating text node", len = data.len());
				let _enter = span.enter();
				let text = self.host.create_text(data);
				*node = Some(text.clone());
				Ok(self.insert(scope, cursor, &text)?)
			}
			Kind::Fragment(children) | Kind::Gate { children, .. } => self.update_children(&scope.deeper(), cursor, Vec::new(), children),
			Kind::Keyed(children) => self.update_keyed(&scope.deeper(), cursor, IndexMap::new(), children),
			Kind::SetContext { entries, children } => {
				let inner = Scope {
					context: scope.context.extend(entries),
					..scope.deeper()
				};
				self.update_children(&inner, cursor, Vec::new(), children)
			}
			Kind::Layout { callback } => {
				self.hooks.push((Rc::clone(callback), scope.parent.clone()));
				Ok(())
			}
			Kind::Element(element) => self.create_element(scope, cursor, element, &mut vnode.flags),
			Kind::Component(component) => self.create_component(scope, cursor, component),
			Kind::Inline(inline) => self.create_inline(scope, cursor, inline),
		}
	}

	fn create_element(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, element: &mut ElementNode<H>, flags: &mut Flags) -> Result<(), Error> {
		let span = trace_span!("Creating element", tag = &*element.tag);
		let _enter = span.enter();

		let namespace: Option<Rc<str>> = element.attrs.get_str("xmlns").map(Rc::from).or_else(|| match &*element.tag {
			"svg" => Some(SVG_NAMESPACE.into()),
			"math" => Some(MATHML_NAMESPACE.into()),
			_ => scope.namespace.clone(),
		});
		let node = self.host.create_element(&element.tag, namespace.as_deref(), element.is.as_deref())?;
		element.node = Some(node.clone());
		element.namespace = namespace;

		if element.namespace.is_none() {
			*flags |= Flags::HTML;
			*flags |= match &*element.tag {
				"input" if element.attrs.get_str("type") == Some("file") => Flags::INPUT | Flags::FILE_INPUT,
				"input" => Flags::INPUT,
				"select" => Flags::SELECT,
				"option" => Flags::OPTION,
				"textarea" => Flags::TEXTAREA,
				_ => Flags::empty(),
			};
			if element.tag.contains('-') || element.is.is_some() {
				*flags |= Flags::CUSTOM;
			}
		}

		patch_attrs(
			&mut Target {
				host: self.host,
				node: &node,
				namespace: element.namespace.as_deref(),
				flags: *flags,
				listeners: &mut element.listeners,
				redraw: self.redraw,
			},
			None,
			&element.attrs,
		)?;

		let inner = Scope {
			parent: node.clone(),
			namespace: child_namespace(element),
			context: scope.context.clone(),
			depth: scope.depth + 1,
		};
		let children = self.update_children(&inner, &mut None, Vec::new(), &mut element.children);
		self.insert(scope, cursor, &node)?;
		children?;

		// Selects ignore `value` while they have no options yet.
		if flags.contains(Flags::SELECT) {
			for key in ["value", "selectedIndex"] {
				if let Some(prop) = element.attrs.present(key).and_then(Value::to_prop) {
					self.host
						.set_property(&node, key, prop)
						.map_err(|source| Error::Attribute { name: key.to_owned(), source })?;
				}
			}
		}
		Ok(())
	}

	fn create_component(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, component: &mut ComponentNode<H>) -> Result<(), Error> {
		let span = trace_span!("Creating component", name = component.component.name());
		let _enter = span.enter();

		let ComponentNode {
			component,
			attrs,
			render,
			instance,
			controller,
		} = component;
		let aborter = Rc::new(AbortController::new());
		*controller = Some(Rc::clone(&aborter));
		let signal = aborter.signal();
		let cx = ViewCx {
			attrs: &**attrs,
			old: None,
			context: &scope.context,
			signal: &signal,
			redraw: self.redraw,
		};
		let output = match (component.init)(&cx) {
			Ok(Init::View(child)) => {
				*render = Some(Render::Flat);
				Ok(child)
			}
			Ok(Init::Render(view)) => {
				let output = view(&cx);
				*render = Some(Render::View(view));
				output
			}
			Err(error) => Err(error),
		};
		self.run_view(scope, cursor, output, instance, true)
	}

	fn create_inline(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, inline: &mut InlineNode<H>) -> Result<(), Error> {
		let span = trace_span!("Creating inline view");
		let _enter = span.enter();

		let aborter = Rc::new(AbortController::new());
		inline.controller = Some(Rc::clone(&aborter));
		let signal = aborter.signal();
		let attrs = Attrs::new();
		let output = (inline.view)(&ViewCx {
			attrs: &attrs,
			old: None,
			context: &scope.context,
			signal: &signal,
			redraw: self.redraw,
		});
		self.run_view(scope, cursor, output, &mut inline.instance, true)
	}

	/// Reconciles a view's output into `instance`. Failed updates keep the previous output in place.
	fn run_view(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, output: ViewResult<Child<H>>, instance: &mut Option<Box<Vnode<H>>>, creating: bool) -> Result<(), Error> {
		match output {
			Err(error) if creating => Err(Error::View(error)),
			Err(error) => {
				if let Some(last) = instance.as_deref().and_then(last_node) {
					*cursor = Some(last);
				}
				self.settle(Error::View(error))
			}
			Ok(child) => {
				let mut slot = instance.take().map(|instance| *instance);
				let result = self.update(&scope.deeper(), cursor, &mut slot, normalize(child));
				*instance = slot.map(Box::new);
				result
			}
		}
	}

	/// Updates `new` in place of `old`, which [matches](`Vnode::matches`) it. Live state moves from `old` into `new`.
	#[instrument(skip(self, scope, cursor, old, new))]
	fn patch(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, mut old: Vnode<H>, new: &mut Vnode<H>) -> Result<(), Error> {
		let flags = new.flags;
		match (old.kind, &mut new.kind) {
			(Kind::Text { data: old_data, node: old_node }, Kind::Text { data, node }) => {
				*node = old_node;
				if let Some(text) = node {
					if old_data != *data {
						trace!("Updating text.");
						self.host.set_text(text, data);
					}
					*cursor = Some(text.clone());
				}
				Ok(())
			}
			(Kind::Fragment(old_children), Kind::Fragment(children)) => self.update_children(&scope.deeper(), cursor, old_children, children),
			(Kind::Keyed(old_children), Kind::Keyed(children)) => self.update_keyed(&scope.deeper(), cursor, old_children, children),
			(Kind::SetContext { children: old_children, .. }, Kind::SetContext { entries, children }) => {
				let inner = Scope {
					context: scope.context.extend(entries),
					..scope.deeper()
				};
				self.update_children(&inner, cursor, old_children, children)
			}
			(Kind::Gate { deps: old_deps, children: old_children }, Kind::Gate { deps, children }) => {
				let unchanged = old_deps.len() == deps.len() && old_deps.iter().zip(deps.iter()).all(|(a, b)| a.same(b));
				if unchanged {
					self.update_children(&scope.deeper(), cursor, old_children, children)
				} else {
					trace!("Dependencies changed. Rebuilding.");
					old.kind = Kind::Gate { deps: old_deps, children: old_children };
					self.remove(&mut old, true);
					self.update_children(&scope.deeper(), cursor, Vec::new(), children)
				}
			}
			(Kind::Layout { .. }, Kind::Layout { callback }) => {
				self.hooks.push((Rc::clone(callback), scope.parent.clone()));
				Ok(())
			}
			(Kind::Element(old_element), Kind::Element(element)) => self.patch_element(scope, cursor, *old_element, element, flags),
			(Kind::Component(old_component), Kind::Component(component)) => self.patch_component(scope, cursor, *old_component, component),
			(Kind::Inline(old_inline), Kind::Inline(inline)) => {
				let span = trace_span!("Updating inline view");
				let _enter = span.enter();
				inline.instance = old_inline.instance;
				let aborter = old_inline.controller.unwrap_or_default();
				inline.controller = Some(Rc::clone(&aborter));
				let signal = aborter.signal();
				let attrs = Attrs::new();
				let output = (inline.view)(&ViewCx {
					attrs: &attrs,
					old: None,
					context: &scope.context,
					signal: &signal,
					redraw: self.redraw,
				});
				self.run_view(scope, cursor, output, &mut inline.instance, false)
			}
			(kind, _) => {
				warn!("Patched mismatched vnodes. Recreating.");
				old.kind = kind;
				self.remove(&mut old, true);
				self.create(scope, cursor, new)
			}
		}
	}

	fn patch_element(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, old: ElementNode<H>, element: &mut ElementNode<H>, flags: Flags) -> Result<(), Error> {
		let span = trace_span!("Updating element", tag = &*element.tag);
		let _enter = span.enter();

		let reused = Rc::ptr_eq(old.origin(), element.origin());
		element.namespace = old.namespace;
		element.listeners = old.listeners;
		let node = match old.node {
			Some(node) => node,
			None => {
				element.children = old.children;
				return Err(Error::Host(HostError::new(format!("<{}> has no live node", element.tag))));
			}
		};
		element.node = Some(node.clone());
		*cursor = Some(node.clone());

		if reused {
			element.children = old.children;
			return Err(Error::AttrsReused(element.tag.to_string()));
		}
		if let Err(error) = patch_attrs(
			&mut Target {
				host: self.host,
				node: &node,
				namespace: element.namespace.as_deref(),
				flags,
				listeners: &mut element.listeners,
				redraw: self.redraw,
			},
			Some(&old.attrs),
			&element.attrs,
		) {
			element.children = old.children;
			return Err(error);
		}

		let inner = Scope {
			parent: node,
			namespace: child_namespace(element),
			context: scope.context.clone(),
			depth: scope.depth + 1,
		};
		self.update_children(&inner, &mut None, old.children, &mut element.children)
	}

	fn patch_component(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, old: ComponentNode<H>, component: &mut ComponentNode<H>) -> Result<(), Error> {
		let span = trace_span!("Updating component", name = component.component.name());
		let _enter = span.enter();

		let ComponentNode {
			component,
			attrs,
			render,
			instance,
			controller,
		} = component;
		*instance = old.instance;
		let aborter = old.controller.unwrap_or_default();
		*controller = Some(Rc::clone(&aborter));
		let signal = aborter.signal();
		let cx = ViewCx {
			attrs: &**attrs,
			old: Some(&*old.attrs),
			context: &scope.context,
			signal: &signal,
			redraw: self.redraw,
		};

		let resolved = match old.render {
			Some(resolved) => resolved,
			None => Render::Flat,
		};
		let output = match &resolved {
			Render::View(view) => view(&cx),
			// Flat components may capture fresh state on every render.
			Render::Flat => match (component.init)(&cx) {
				Ok(Init::View(child)) => Ok(child),
				Ok(Init::Render(view)) => view(&cx),
				Err(error) => Err(error),
			},
		};
		*render = Some(resolved);
		self.run_view(scope, cursor, output, instance, false)
	}

	/// Positional reconciliation. On failure, the committed prefix stays, the rest of `old` is removed and `new`'s
	/// unreconciled tail is dropped.
	fn update_children(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, old: Vec<Slot<H>>, new: &mut [Slot<H>]) -> Result<(), Error> {
		let mut old = old.into_iter();
		let mut result = Ok(());
		for i in 0..new.len() {
			let mut slot = old.next().flatten();
			let incoming = new[i].take();
			result = self.update(scope, cursor, &mut slot, incoming);
			new[i] = slot;
			if result.is_err() {
				for rest in &mut new[i + 1..] {
					*rest = None;
				}
				break;
			}
		}
		for mut leftover in old.flatten() {
			self.remove(&mut leftover, true);
		}
		result
	}

	/// Reconciliation by key. Matching entries are moved into place only if they are not there already.
	fn update_keyed(&mut self, scope: &Scope<H>, cursor: &mut Option<H::Node>, mut old: IndexMap<Key, Slot<H>>, new: &mut IndexMap<Key, Slot<H>>) -> Result<(), Error> {
		let mut result = Ok(());
		let mut failed_at = None;
		for i in 0..new.len() {
			let (key, slot) = match new.get_index_mut(i) {
				Some(entry) => entry,
				None => break,
			};
			let incoming = slot.take();
			let mut committed = old.get_mut(key).and_then(Option::take);
			if let Some(existing) = &committed {
				if incoming.is_some() {
					if let Err(error) = self.move_after(scope, cursor.as_ref(), existing) {
						error!("Failed to move keyed entry {}: {}", key, error);
					}
				}
			}
			result = self.update(scope, cursor, &mut committed, incoming);
			*slot = committed;
			if result.is_err() {
				failed_at = Some(i);
				break;
			}
		}
		if let Some(i) = failed_at {
			for (_, rest) in new.iter_mut().skip(i + 1) {
				*rest = None;
			}
		}
		for (_, leftover) in old {
			if let Some(mut leftover) = leftover {
				self.remove(&mut leftover, true);
			}
		}
		result
	}

	/// Moves the live nodes of `vnode` directly after `cursor`, touching only nodes that are out of place.
	fn move_after(&self, scope: &Scope<H>, cursor: Option<&H::Node>, vnode: &Vnode<H>) -> Result<(), HostError> {
		let mut nodes = Vec::new();
		collect_nodes(vnode, &mut nodes);
		let mut previous = cursor.cloned();
		for node in nodes {
			let next = match &previous {
				Some(previous) => self.host.next_sibling(previous),
				None => self.host.first_child(&scope.parent),
			};
			if next.as_ref() != Some(&node) {
				trace!("Moving keyed node.");
				self.host.insert_before(&scope.parent, &node, next.as_ref())?;
			}
			previous = Some(node);
		}
		Ok(())
	}

	/// Tears down `vnode`: runs removal hooks, aborts view signals, uninstalls listeners and, if `detach`, takes
	/// its live nodes out of the document. Descendants of a detached element aren't detached individually.
	pub fn remove(&mut self, vnode: &mut Vnode<H>, detach: bool) {
		vnode.flags |= Flags::REMOVING;
		match &mut vnode.kind {
			Kind::Retain | Kind::Layout { .. } => (),
			Kind::Text { node, .. } => {
				if let (true, Some(node)) = (detach, node) {
					self.host.remove(node);
				}
			}
			Kind::Element(element) => {
				let span = trace_span!("Removing element", tag = &*element.tag);
				let _enter = span.enter();
				if let Some(listeners) = element.listeners.take() {
					listeners.clear();
				}
				for child in element.children.iter_mut().flatten() {
					self.remove(child, false);
				}
				if let (true, Some(node)) = (detach, &element.node) {
					self.host.remove(node);
				}
			}
			Kind::Fragment(children) | Kind::SetContext { children, .. } | Kind::Gate { children, .. } => {
				for child in children.iter_mut().flatten() {
					self.remove(child, detach);
				}
			}
			Kind::Keyed(children) => {
				for child in children.values_mut().flatten() {
					self.remove(child, detach);
				}
			}
			Kind::Component(component) => {
				if let Some(controller) = component.controller.take() {
					controller.abort();
				}
				if let Some(instance) = &mut component.instance {
					self.remove(instance, detach);
				}
			}
			Kind::Inline(inline) => {
				if let Some(controller) = inline.controller.take() {
					controller.abort();
				}
				if let Some(instance) = &mut inline.instance {
					self.remove(instance, detach);
				}
			}
			Kind::Removal { callback } => {
				if let Err(error) = callback() {
					error!("Removal hook failed: {}", error);
				}
			}
		}
	}
}

fn child_namespace<H: Host>(element: &ElementNode<H>) -> Option<Rc<str>> {
	if &*element.tag == "foreignObject" {
		None
	} else {
		element.namespace.clone()
	}
}

/// Appends the top-level live nodes of `vnode` to `nodes`, in document order.
pub(crate) fn collect_nodes<H: Host>(vnode: &Vnode<H>, nodes: &mut Vec<H::Node>) {
	match &vnode.kind {
		Kind::Text { node, .. } => nodes.extend(node.iter().cloned()),
		Kind::Element(element) => nodes.extend(element.node.iter().cloned()),
		Kind::Fragment(children) | Kind::SetContext { children, .. } | Kind::Gate { children, .. } => {
			for child in children.iter().flatten() {
				collect_nodes(child, nodes);
			}
		}
		Kind::Keyed(children) => {
			for child in children.values().flatten() {
				collect_nodes(child, nodes);
			}
		}
		Kind::Component(component) => {
			if let Some(instance) = &component.instance {
				collect_nodes(instance, nodes);
			}
		}
		Kind::Inline(inline) => {
			if let Some(instance) = &inline.instance {
				collect_nodes(instance, nodes);
			}
		}
		Kind::Retain | Kind::Layout { .. } | Kind::Removal { .. } => (),
	}
}

fn last_node<H: Host>(vnode: &Vnode<H>) -> Option<H::Node> {
	let mut nodes = Vec::new();
	collect_nodes(vnode, &mut nodes);
	nodes.pop()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		mem::MemoryHost,
		vnode::{node, text},
	};

	#[test]
	fn mismatched_patch_recreates() {
		let host = MemoryHost::new();
		let body = host.body();
		let scope = Scope {
			parent: body,
			namespace: None,
			context: Context::new(),
			depth: 0,
		};
		let mut pass = Pass {
			host: &host,
			hooks: Vec::new(),
			redraw: None,
			remove_on_throw: false,
			depth_limit: 16,
		};

		let mut slot = None;
		pass.update(&scope, &mut None, &mut slot, Some(text("old"))).unwrap();
		assert_eq!(host.inner_html(&body), "old");

		let mut new = node::<MemoryHost>("p", (), "new").unwrap();
		pass.patch(&scope, &mut None, slot.take().unwrap(), &mut new).unwrap();
		assert_eq!(host.inner_html(&body), "<p>new</p>");
	}
}
