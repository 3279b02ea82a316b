//! Throttling and debouncing on top of a [`Timer`].
//!
//! Each call returns a future that reports which [`Edge`] the call ended up on.
//! Callers do their work only if it isn't [`Edge::Overtaken`].

use crate::host::HostError;
use core::{cell::RefCell, fmt, future::Future};
use futures::channel::oneshot;
use std::rc::{Rc, Weak};
use tracing::{error, trace};

/// Delay used by [`Limiter::throttler`] and [`Limiter::debouncer`] callers that don't have a preference, in milliseconds.
pub const DEFAULT_DELAY: f64 = 500.0;

/// Identifies a pending timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub i32);

/// A millisecond clock with one-shot timeouts.
pub trait Timer: Clone + 'static {
	fn now(&self) -> f64;
	fn set_timeout(&self, delay: f64, callback: Box<dyn FnOnce()>) -> Result<TimerId, HostError>;
	fn clear_timeout(&self, id: TimerId);
}

/// How a rate-limited call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
	/// Passed immediately.
	Leading,
	/// Passed once the delay elapsed.
	Trailing,
	/// A later call took this one's place, or the limiter was disposed.
	Overtaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
	Throttle,
	Debounce,
}

struct State {
	delay: f64,
	/// When the running timeout was (re)started.
	started: f64,
	timeout: Option<TimerId>,
	waiters: Vec<oneshot::Sender<Edge>>,
	disposed: bool,
}

struct Inner<T: Timer> {
	timer: T,
	policy: Policy,
	state: RefCell<State>,
}

/// A throttle or debounce gate.
pub struct Limiter<T: Timer>(Rc<Inner<T>>);

impl<T: Timer> Clone for Limiter<T> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<T: Timer> fmt::Debug for Limiter<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.0.state.borrow();
		f.debug_struct("Limiter")
			.field("policy", &self.0.policy)
			.field("delay", &state.delay)
			.field("running", &state.timeout.is_some())
			.field("waiting", &state.waiters.len())
			.field("disposed", &state.disposed)
			.finish()
	}
}

fn settle(waiters: Vec<oneshot::Sender<Edge>>, edge: Edge) {
	for waiter in waiters {
		// The caller may have dropped its future.
		let _ = waiter.send(edge);
	}
}

impl<T: Timer> Limiter<T> {
	fn new(timer: T, policy: Policy, delay: f64) -> Self {
		Self(Rc::new(Inner {
			timer,
			policy,
			state: RefCell::new(State {
				delay,
				started: 0.0,
				timeout: None,
				waiters: Vec::new(),
				disposed: false,
			}),
		}))
	}

	/// Lets the first call through immediately, then at most one call per `delay`.
	///
	/// Calls made while the window is closed wait for it to reopen and then all pass together on the trailing edge.
	pub fn throttler(timer: T, delay: f64) -> Self {
		Self::new(timer, Policy::Throttle, delay)
	}

	/// Lets a call through only after `delay` passed without another call.
	pub fn debouncer(timer: T, delay: f64) -> Self {
		Self::new(timer, Policy::Debounce, delay)
	}

	/// Registers a call.
	pub fn call(&self) -> impl Future<Output = Edge> + 'static {
		let (sender, receiver) = oneshot::channel();
		let overtaken = {
			let mut state = self.0.state.borrow_mut();
			if state.disposed {
				let _ = sender.send(Edge::Overtaken);
				Vec::new()
			} else {
				match self.0.policy {
					Policy::Throttle if state.timeout.is_none() => {
						let _ = sender.send(Edge::Leading);
						let delay = state.delay;
						drop(state);
						self.start(delay);
						Vec::new()
					}
					Policy::Throttle => {
						state.waiters.push(sender);
						Vec::new()
					}
					Policy::Debounce => {
						let overtaken = core::mem::take(&mut state.waiters);
						state.waiters.push(sender);
						let delay = state.delay;
						if let Some(timeout) = state.timeout.take() {
							self.0.timer.clear_timeout(timeout);
						}
						drop(state);
						self.start(delay);
						overtaken
					}
				}
			}
		};
		settle(overtaken, Edge::Overtaken);
		async move { receiver.await.unwrap_or(Edge::Overtaken) }
	}

	fn start(&self, delay: f64) {
		let now = self.0.timer.now();
		self.schedule(now, delay);
	}

	/// Schedules the timeout so that it fires `delay` after `started`.
	fn schedule(&self, started: f64, delay: f64) {
		let remaining = (started + delay - self.0.timer.now()).max(0.0);
		let weak: Weak<Inner<T>> = Rc::downgrade(&self.0);
		let scheduled = self.0.timer.set_timeout(
			remaining,
			Box::new(move || {
				if let Some(inner) = weak.upgrade() {
					Limiter(inner).fire();
				}
			}),
		);
		match scheduled {
			Ok(id) => {
				let mut state = self.0.state.borrow_mut();
				state.started = started;
				state.timeout = Some(id);
			}
			Err(error) => {
				error!("Could not schedule rate limiter timeout: {}", error);
				let waiters = core::mem::take(&mut self.0.state.borrow_mut().waiters);
				settle(waiters, Edge::Trailing);
			}
		}
	}

	fn fire(&self) {
		let (waiters, delay) = {
			let mut state = self.0.state.borrow_mut();
			state.timeout = None;
			(core::mem::take(&mut state.waiters), state.delay)
		};
		trace!(waiting = waiters.len(), "Rate limiter elapsed.");
		if waiters.is_empty() {
			return;
		}
		settle(waiters, Edge::Trailing);
		if self.0.policy == Policy::Throttle {
			// The trailing pass starts the next window.
			self.start(delay);
		}
	}

	/// Changes the delay. A running timeout keeps the time that already elapsed.
	pub fn update(&self, delay: f64) {
		let running = {
			let mut state = self.0.state.borrow_mut();
			state.delay = delay;
			state.timeout.take().map(|timeout| (timeout, state.started))
		};
		if let Some((timeout, started)) = running {
			self.0.timer.clear_timeout(timeout);
			self.schedule(started, delay);
		}
	}

	/// Permanently disables the limiter. Waiting and future calls are [overtaken](`Edge::Overtaken`).
	pub fn dispose(&self) {
		let (timeout, waiters) = {
			let mut state = self.0.state.borrow_mut();
			state.disposed = true;
			(state.timeout.take(), core::mem::take(&mut state.waiters))
		};
		if let Some(timeout) = timeout {
			self.0.timer.clear_timeout(timeout);
		}
		settle(waiters, Edge::Overtaken);
	}

	#[must_use]
	pub fn is_disposed(&self) -> bool {
		self.0.state.borrow().disposed
	}
}
