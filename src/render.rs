//! Rendering entry points: one-shot [`Renderer::render`] and redraw-scheduling [`Renderer::mount`].

use crate::{
	context::Context,
	diff::{Pass, Scope},
	error::Error,
	host::{FrameId, Host, HTML_NAMESPACE},
	vnode::{fragment, inline, normalize, on_remove, Child, Slot, ViewCx, ViewFn, ViewResult, Vnode},
};
use core::{
	cell::{Cell, RefCell},
	fmt,
};
use std::rc::{Rc, Weak};
use tracing::{error, instrument, trace, warn};

/// Schedules a redraw.
pub type Redraw = Rc<dyn Fn()>;

/// How deep a tree may nest before rendering fails.
pub const DEFAULT_DEPTH_LIMIT: usize = 256;

/// Per-render settings.
#[derive(Clone)]
pub struct RenderOptions {
	/// Made available to views and event handlers. Handlers call it after they run, unless they return [`Reaction::Skip`](`crate::Reaction::Skip`).
	pub redraw: Option<Redraw>,
	/// Propagate every failure, tearing down each enclosing subtree on the way up, instead of containing it.
	pub remove_on_throw: bool,
	pub depth_limit: usize,
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			redraw: None,
			remove_on_throw: false,
			depth_limit: DEFAULT_DEPTH_LIMIT,
		}
	}
}

impl RenderOptions {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn redraw(mut self, redraw: impl Fn() + 'static) -> Self {
		self.redraw = Some(Rc::new(redraw));
		self
	}

	#[must_use]
	pub fn remove_on_throw(mut self, remove_on_throw: bool) -> Self {
		self.remove_on_throw = remove_on_throw;
		self
	}

	#[must_use]
	pub fn depth_limit(mut self, depth_limit: usize) -> Self {
		self.depth_limit = depth_limit;
		self
	}
}

impl fmt::Debug for RenderOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RenderOptions")
			.field("redraw", &self.redraw.is_some())
			.field("remove_on_throw", &self.remove_on_throw)
			.field("depth_limit", &self.depth_limit)
			.finish()
	}
}

struct Inner<H: Host> {
	host: H,
	/// The committed tree of each target.
	roots: RefCell<Vec<(H::Node, Slot<H>)>>,
	/// Targets currently being reconciled.
	active: RefCell<Vec<H::Node>>,
}

/// Renders vnode trees into targets of one host, remembering what each target last received.
pub struct Renderer<H: Host>(Rc<Inner<H>>);

impl<H: Host> Clone for Renderer<H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<H: Host> fmt::Debug for Renderer<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Renderer")
			.field("roots", &self.0.roots.borrow().len())
			.field("active", &self.0.active.borrow().len())
			.finish()
	}
}

/// Releases a target lock on every exit path.
struct Unlock<'a, H: Host> {
	active: &'a RefCell<Vec<H::Node>>,
	target: &'a H::Node,
}

impl<H: Host> Drop for Unlock<'_, H> {
	fn drop(&mut self) {
		let mut active = self.active.borrow_mut();
		if let Some(i) = active.iter().rposition(|node| node == self.target) {
			active.remove(i);
		}
	}
}

impl<H: Host> Renderer<H> {
	#[must_use]
	pub fn new(host: H) -> Self {
		Self(Rc::new(Inner {
			host,
			roots: RefCell::default(),
			active: RefCell::default(),
		}))
	}

	#[must_use]
	pub fn host(&self) -> &H {
		&self.0.host
	}

	/// Reconciles `target`'s children against `tree`, then runs the layout hooks the tree queued.
	///
	/// Rendering [`Child::Null`] clears the target.
	///
	/// # Errors
	///
	/// [`Error::Locked`] if `target` overlaps a target that is being rendered right now (for example from inside a view).
	/// Otherwise, [fatal](`Error::is_fatal`) errors, and any error if [`RenderOptions::remove_on_throw`] is set.
	#[instrument(skip(self, tree))]
	pub fn render(&self, target: &H::Node, tree: impl Into<Child<H>>, options: &RenderOptions) -> Result<(), Error> {
		let host = &self.0.host;
		if self.0.active.borrow().iter().any(|active| host.contains(active, target) || host.contains(target, active)) {
			warn!("Rejected overlapping render.");
			return Err(Error::Locked);
		}
		self.0.active.borrow_mut().push(target.clone());
		let unlock = Unlock::<H> { active: &self.0.active, target };

		let mut committed = {
			let mut roots = self.0.roots.borrow_mut();
			roots.iter().position(|(root, _)| root == target).and_then(|i| roots.swap_remove(i).1)
		};
		let scope = Scope {
			parent: target.clone(),
			namespace: host.namespace_of(target).filter(|namespace| namespace != HTML_NAMESPACE).map(Rc::from),
			context: Context::new(),
			depth: 0,
		};
		let focused = host.active_element();

		let mut pass = Pass {
			host,
			hooks: Vec::new(),
			redraw: options.redraw.as_ref(),
			remove_on_throw: options.remove_on_throw,
			depth_limit: options.depth_limit,
		};
		let result = pass.update(&scope, &mut None, &mut committed, normalize(tree.into()));
		let hooks = pass.hooks;
		if committed.is_some() {
			self.0.roots.borrow_mut().push((target.clone(), committed));
		}

		if let Some(focused) = focused {
			if host.active_element().as_ref() != Some(&focused) && host.is_connected(&focused) {
				trace!("Restoring focus.");
				host.focus(&focused);
			}
		}
		drop(unlock);
		trace!(ok = result.is_ok(), hooks = hooks.len(), "Render pass finished.");

		if result.is_ok() {
			for (hook, container) in hooks {
				if let Err(error) = hook(&container) {
					error!("Layout hook failed: {}", error);
				}
			}
		}
		result
	}

	/// Renders `view` into `target` now and again on every requested redraw, at most once per animation frame.
	///
	/// # Errors
	///
	/// Whatever the initial [`render`](`Renderer::render`) returns.
	pub fn mount(&self, target: &H::Node, view: impl Fn(&ViewCx<'_, H>) -> ViewResult<Child<H>> + 'static) -> Result<Scheduler<H>, Error> {
		let view: ViewFn<H> = Rc::new(view);
		let scheduler = Scheduler(Rc::new_cyclic(|weak: &Weak<SchedulerInner<H>>| {
			let weak = weak.clone();
			let mut options = RenderOptions::new();
			options.redraw = Some(Rc::new(move || {
				if let Some(inner) = weak.upgrade() {
					Scheduler(inner).redraw();
				}
			}));
			SchedulerInner {
				renderer: self.clone(),
				target: target.clone(),
				view,
				options,
				pending: Cell::new(None),
				cancelled: Cell::new(false),
			}
		}));
		scheduler.sync()?;
		Ok(scheduler)
	}
}

struct SchedulerInner<H: Host> {
	renderer: Renderer<H>,
	target: H::Node,
	view: ViewFn<H>,
	options: RenderOptions,
	pending: Cell<Option<FrameId>>,
	cancelled: Cell<bool>,
}

/// Handle to a [mounted](`Renderer::mount`) view.
pub struct Scheduler<H: Host>(Rc<SchedulerInner<H>>);

impl<H: Host> Clone for Scheduler<H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<H: Host> fmt::Debug for Scheduler<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scheduler")
			.field("target", &self.0.target)
			.field("pending", &self.0.pending.get())
			.field("cancelled", &self.0.cancelled.get())
			.finish()
	}
}

impl<H: Host> Scheduler<H> {
	/// Requests a redraw on the next animation frame. Requests made before that frame coalesce.
	pub fn redraw(&self) {
		let inner = &self.0;
		if inner.cancelled.get() || inner.pending.get().is_some() {
			return;
		}
		let weak = Rc::downgrade(inner);
		let frame = inner.renderer.host().request_frame(Box::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.pending.set(None);
				if let Err(error) = Scheduler(inner).sync() {
					error!("Scheduled redraw failed: {}", error);
				}
			}
		}));
		match frame {
			Ok(frame) => inner.pending.set(Some(frame)),
			Err(error) => error!("Could not schedule redraw: {}", error),
		}
	}

	/// Redraws right away, dropping a pending frame request.
	///
	/// # Errors
	///
	/// Whatever [`Renderer::render`] returns.
	pub fn sync(&self) -> Result<(), Error> {
		let inner = &self.0;
		if inner.cancelled.get() {
			return Ok(());
		}
		self.cancel_frame();
		let view = Rc::clone(&inner.view);
		let weak = Rc::downgrade(inner);
		let tree: Vnode<H> = fragment(vec![
			inline(move |cx| view(cx)),
			on_remove(move || {
				if let Some(inner) = weak.upgrade() {
					Scheduler(inner).cancel_frame();
				}
				Ok(())
			}),
		]);
		inner.renderer.render(&inner.target, tree, &inner.options)
	}

	/// Whether a redraw is scheduled.
	#[must_use]
	pub fn is_pending(&self) -> bool {
		self.0.pending.get().is_some()
	}

	/// Stops redrawing and clears the target.
	///
	/// # Errors
	///
	/// Whatever [`Renderer::render`] returns for the clearing render.
	pub fn cancel(&self) -> Result<(), Error> {
		let inner = &self.0;
		if inner.cancelled.replace(true) {
			return Ok(());
		}
		self.cancel_frame();
		inner.renderer.render(&inner.target, (), &inner.options)
	}

	fn cancel_frame(&self) {
		if let Some(frame) = self.0.pending.take() {
			self.0.renderer.host().cancel_frame(frame);
		}
	}
}
