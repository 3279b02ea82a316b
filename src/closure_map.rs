//! Per-element event listener bookkeeping.
//!
//! Each element with handlers gets one [`Dispatch`] closure that is registered with the host once per event type.
//! Swapping a handler only touches the table below. The live listener stays put.

use crate::{
	attrs::{Handler, Reaction},
	host::{Dispatch, Host, HostError},
	render::Redraw,
};
use core::{cell::RefCell, fmt};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{trace, trace_span, warn};

pub(crate) struct ClosureMap<H: Host> {
	host: H,
	node: H::Node,
	handlers: Rc<RefCell<HashMap<String, Handler<H>>>>,
	listeners: RefCell<HashMap<String, H::Listener>>,
	redraw: Rc<RefCell<Option<Redraw>>>,
	dispatch: Dispatch<H::Event>,
}

impl<H: Host> ClosureMap<H> {
	pub fn new(host: &H, node: &H::Node, redraw: Option<Redraw>) -> Rc<Self> {
		let handlers: Rc<RefCell<HashMap<String, Handler<H>>>> = Rc::default();
		let redraw = Rc::new(RefCell::new(redraw));
		let dispatch: Dispatch<H::Event> = Rc::new({
			let host = host.clone();
			let handlers = Rc::clone(&handlers);
			let redraw = Rc::clone(&redraw);
			move |event| {
				let event_type = host.event_type(event);
				let span = trace_span!("Dispatching event", event_type = event_type.as_str());
				let _enter = span.enter();

				// Cloned out so that the handler may replace itself.
				let handler = handlers.borrow().get(&event_type).cloned();
				let handler = match handler {
					Some(handler) => handler,
					None => return warn!("No handler installed for event type {:?}.", event_type),
				};
				let reaction = handler.call(event);
				let redraw = redraw.borrow().clone();
				react(&host, reaction, redraw);
			}
		});
		Rc::new(Self {
			host: host.clone(),
			node: node.clone(),
			handlers,
			listeners: RefCell::default(),
			redraw,
			dispatch,
		})
	}

	/// The redraw of the most recent render is used by handlers from then on.
	pub fn set_redraw(&self, redraw: Option<Redraw>) {
		*self.redraw.borrow_mut() = redraw;
	}

	/// Installs, swaps or (with [`None`]) uninstalls the handler for `event_type`.
	pub fn update(&self, event_type: &str, handler: Option<Handler<H>>) -> Result<(), HostError> {
		match handler {
			Some(handler) => {
				if !self.listeners.borrow().contains_key(event_type) {
					let listener = self.host.listen(&self.node, event_type, Rc::clone(&self.dispatch))?;
					self.listeners.borrow_mut().insert(event_type.to_owned(), listener);
					trace!(event_type, "Added event listener.");
				}
				self.handlers.borrow_mut().insert(event_type.to_owned(), handler);
			}
			None => {
				self.handlers.borrow_mut().remove(event_type);
				let listener = self.listeners.borrow_mut().remove(event_type);
				if let Some(listener) = listener {
					self.host.unlisten(&self.node, event_type, listener);
					trace!(event_type, "Removed event listener.");
				}
			}
		}
		Ok(())
	}

	/// Uninstalls everything. Called on teardown.
	pub fn clear(&self) {
		self.handlers.borrow_mut().clear();
		let listeners: Vec<_> = self.listeners.borrow_mut().drain().collect();
		for (event_type, listener) in listeners {
			self.host.unlisten(&self.node, &event_type, listener);
		}
		*self.redraw.borrow_mut() = None;
	}

	pub fn len(&self) -> usize {
		self.listeners.borrow().len()
	}
}

impl<H: Host> fmt::Debug for ClosureMap<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClosureMap").field("node", &self.node).field("len", &self.len()).finish()
	}
}

fn react<H: Host>(host: &H, reaction: Reaction, redraw: Option<Redraw>) {
	match reaction {
		Reaction::Redraw => {
			if let Some(redraw) = redraw {
				redraw();
			}
		}
		Reaction::Skip => (),
		Reaction::Later(future) => host.spawn_local(Box::pin(async move {
			let mut reaction = future.await;
			while let Reaction::Later(next) = reaction {
				reaction = next.await;
			}
			if let (Reaction::Redraw, Some(redraw)) = (reaction, redraw) {
				redraw();
			}
		})),
	}
}
