//! Cooperative cancellation.

use core::{cell::RefCell, fmt};
use std::rc::Rc;

#[derive(Default)]
struct State {
	aborted: bool,
	callbacks: Vec<Box<dyn FnOnce()>>,
}

/// The owning side of a [`Signal`].
#[derive(Default)]
pub struct AbortController(Rc<RefCell<State>>);

/// A cancellation flag handed to asynchronous work. Owners check it before mutating state.
#[derive(Clone, Default)]
pub struct Signal(Rc<RefCell<State>>);

impl AbortController {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn signal(&self) -> Signal {
		Signal(self.0.clone())
	}

	/// Aborts the signal and runs its callbacks. Later calls do nothing.
	pub fn abort(&self) {
		let callbacks = {
			let mut state = self.0.borrow_mut();
			if state.aborted {
				return;
			}
			state.aborted = true;
			core::mem::take(&mut state.callbacks)
		};
		for callback in callbacks {
			callback();
		}
	}
}

impl Signal {
	#[must_use]
	pub fn is_aborted(&self) -> bool {
		self.0.borrow().aborted
	}

	/// Runs `callback` once the signal is aborted, or right away if it already is.
	pub fn on_abort(&self, callback: impl FnOnce() + 'static) {
		if self.is_aborted() {
			callback();
		} else {
			self.0.borrow_mut().callbacks.push(Box::new(callback));
		}
	}
}

impl fmt::Debug for Signal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal").field("aborted", &self.is_aborted()).finish()
	}
}

impl fmt::Debug for AbortController {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("AbortController").field(&self.signal()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::cell::Cell;

	#[test]
	fn abort_runs_callbacks_once() {
		let controller = AbortController::new();
		let signal = controller.signal();
		let count = Rc::new(Cell::new(0));
		let c = count.clone();
		signal.on_abort(move || c.set(c.get() + 1));

		assert!(!signal.is_aborted());
		controller.abort();
		controller.abort();
		assert!(signal.is_aborted());
		assert_eq!(count.get(), 1);

		let c = count.clone();
		signal.on_abort(move || c.set(c.get() + 10));
		assert_eq!(count.get(), 11);
	}
}
