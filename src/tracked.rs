//! Incrementally managed collections whose entries can leave asynchronously.
//!
//! Every entry is represented by a [`Handle`]. Superseding an entry aborts its handle's [`Signal`] but keeps it
//! [live](`TrackedList::live`) until the view that shows it [releases](`Handle::release`) it, for example once an
//! exit transition has finished.

use crate::{
	render::Redraw,
	signal::{AbortController, Signal},
};
use core::{cell::RefCell, fmt, hash::Hash};
use indexmap::IndexMap;
use std::rc::{Rc, Weak};
use tracing::trace;

struct State<K, V> {
	current: IndexMap<K, Handle<K, V>>,
	/// Current and departing handles, in display order.
	live: Vec<Handle<K, V>>,
}

struct Shared<K, V> {
	state: RefCell<State<K, V>>,
	redraw: Redraw,
}

struct HandleInner<K, V> {
	key: K,
	value: V,
	controller: AbortController,
	list: Weak<Shared<K, V>>,
}

/// One entry of a [`TrackedList`].
pub struct Handle<K, V>(Rc<HandleInner<K, V>>);

impl<K, V> Clone for Handle<K, V> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<K, V> PartialEq for Handle<K, V> {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl<K, V> Eq for Handle<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Handle<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Handle")
			.field("key", &self.0.key)
			.field("value", &self.0.value)
			.field("aborted", &self.is_aborted())
			.finish()
	}
}

/// A key-value registry that hands out one [`Handle`] per key and calls `redraw` whenever its contents change.
pub struct TrackedList<K, V>(Rc<Shared<K, V>>);

impl<K, V> Clone for TrackedList<K, V> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TrackedList<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.0.state.borrow();
		f.debug_struct("TrackedList")
			.field("current", &state.current)
			.field("live", &state.live.len())
			.finish()
	}
}

impl<K: Hash + Eq + Clone + 'static, V: 'static> TrackedList<K, V> {
	/// Creates a list containing `initial`. This does not call `redraw`.
	///
	/// If a key repeats in `initial`, the last value wins.
	pub fn new(redraw: Redraw, initial: impl IntoIterator<Item = (K, V)>) -> Self {
		let list = Self(Rc::new(Shared {
			state: RefCell::new(State {
				current: IndexMap::new(),
				live: Vec::new(),
			}),
			redraw,
		}));
		for (key, value) in initial {
			let handle = list.issue(key.clone(), value);
			let mut state = list.0.state.borrow_mut();
			if let Some(old) = state.current.insert(key, handle.clone()) {
				state.live.retain(|live| live != &old);
			}
			state.live.push(handle);
		}
		list
	}

	fn issue(&self, key: K, value: V) -> Handle<K, V> {
		Handle(Rc::new(HandleInner {
			key,
			value,
			controller: AbortController::new(),
			list: Rc::downgrade(&self.0),
		}))
	}

	/// Stores `value` under `key`, superseding the current entry.
	///
	/// The superseded handle is aborted and stays live until released.
	/// Handles of `key` that were already departing are dropped from [`live`](`TrackedList::live`) right away.
	pub fn set(&self, key: K, value: V) -> Handle<K, V> {
		self.install(key, value, true)
	}

	/// Like [`set`](`TrackedList::set`), but handles of `key` that are still departing stay live.
	pub fn replace(&self, key: K, value: V) -> Handle<K, V> {
		self.install(key, value, false)
	}

	fn install(&self, key: K, value: V, evict_departing: bool) -> Handle<K, V> {
		let handle = self.issue(key.clone(), value);
		let superseded = {
			let mut state = self.0.state.borrow_mut();
			let superseded = state.current.insert(key.clone(), handle.clone());
			if evict_departing {
				state.live.retain(|live| live.0.key != key || Some(live) == superseded.as_ref());
			}
			match superseded.as_ref().and_then(|old| state.live.iter().position(|live| live == old)) {
				Some(i) => state.live.insert(i + 1, handle.clone()),
				None => state.live.push(handle.clone()),
			}
			superseded
		};
		trace!(superseded = superseded.is_some(), "Installed tracked entry.");
		if let Some(superseded) = superseded {
			superseded.0.controller.abort();
		}
		(self.0.redraw)();
		handle
	}

	/// Removes `key` right away, including its handle in [`live`](`TrackedList::live`).
	///
	/// Returns whether `key` was present.
	pub fn delete(&self, key: &K) -> bool {
		let removed = {
			let mut state = self.0.state.borrow_mut();
			let removed = state.current.shift_remove(key);
			if let Some(removed) = &removed {
				state.live.retain(|live| live != removed);
			}
			removed
		};
		match removed {
			Some(removed) => {
				removed.0.controller.abort();
				(self.0.redraw)();
				true
			}
			None => false,
		}
	}

	/// Removes `key`'s current handle from the registry but keeps it live until it is released.
	/// Does not redraw.
	fn depart(&self, key: &K) -> Option<Handle<K, V>> {
		let departed = self.0.state.borrow_mut().current.shift_remove(key);
		if let Some(departed) = &departed {
			departed.0.controller.abort();
		}
		departed
	}

	#[must_use]
	pub fn has(&self, key: &K) -> bool {
		self.0.state.borrow().current.contains_key(key)
	}

	#[must_use]
	pub fn get(&self, key: &K) -> Option<V>
	where
		V: Clone,
	{
		self.0.state.borrow().current.get(key).map(|handle| handle.0.value.clone())
	}

	/// The current handle of `key`.
	#[must_use]
	pub fn handle(&self, key: &K) -> Option<Handle<K, V>> {
		self.0.state.borrow().current.get(key).cloned()
	}

	/// The current handles, in insertion order.
	#[must_use]
	pub fn list(&self) -> Vec<Handle<K, V>> {
		self.0.state.borrow().current.values().cloned().collect()
	}

	/// The handles a view should display: current ones and those whose removal hasn't been released yet.
	#[must_use]
	pub fn live(&self) -> Vec<Handle<K, V>> {
		self.0.state.borrow().live.clone()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.state.borrow().current.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.state.borrow().current.is_empty()
	}
}

impl<K, V> Handle<K, V> {
	#[must_use]
	pub fn key(&self) -> &K {
		&self.0.key
	}

	#[must_use]
	pub fn value(&self) -> &V {
		&self.0.value
	}

	/// Aborted once this handle is superseded or removed.
	#[must_use]
	pub fn signal(&self) -> Signal {
		self.0.controller.signal()
	}

	#[must_use]
	pub fn is_aborted(&self) -> bool {
		self.0.controller.signal().is_aborted()
	}
}

impl<K: Hash + Eq + Clone + 'static, V: 'static> Handle<K, V> {
	/// Acknowledges that this departing handle is gone from the view.
	///
	/// Does nothing while the handle is still current.
	pub fn release(&self) {
		if !self.is_aborted() {
			trace!("Ignored release of a current handle.");
			return;
		}
		let Some(list) = self.0.list.upgrade() else { return };
		let released = {
			let mut state = list.state.borrow_mut();
			let before = state.live.len();
			state.live.retain(|live| live != self);
			state.live.len() != before
		};
		if released {
			(list.redraw)();
		}
	}

	/// Deletes this handle from its list immediately, skipping the departure.
	pub fn remove(&self) {
		let Some(list) = self.0.list.upgrade() else {
			self.0.controller.abort();
			return;
		};
		{
			let mut state = list.state.borrow_mut();
			if state.current.get(&self.0.key) == Some(self) {
				state.current.shift_remove(&self.0.key);
			}
			state.live.retain(|live| live != self);
		}
		self.0.controller.abort();
		(list.redraw)();
	}
}

/// A single tracked value, re-keyed whenever it changes so that the old and new value can be live at the same time.
pub struct Tracked<V> {
	list: TrackedList<u64, V>,
	next: core::cell::Cell<u64>,
}

impl<V: fmt::Debug> fmt::Debug for Tracked<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Tracked").field(&self.list).finish()
	}
}

impl<V: PartialEq + 'static> Tracked<V> {
	#[must_use]
	pub fn new(redraw: Redraw) -> Self {
		Self {
			list: TrackedList::new(redraw, None),
			next: core::cell::Cell::new(0),
		}
	}

	fn current_key(&self) -> Option<u64> {
		self.list.0.state.borrow().current.keys().next().copied()
	}

	/// Makes `value` current. An equal value keeps the current handle.
	pub fn set(&self, value: V) -> Handle<u64, V> {
		let current = self.current_key().and_then(|key| self.list.handle(&key));
		if let Some(current) = current {
			if current.value() == &value {
				return current;
			}
			self.list.depart(current.key());
		}
		let key = self.next.get();
		self.next.set(key + 1);
		self.list.replace(key, value)
	}

	/// Removes the current value right away.
	pub fn delete(&self) -> bool {
		self.current_key().map_or(false, |key| self.list.delete(&key))
	}

	#[must_use]
	pub fn get(&self) -> Option<V>
	where
		V: Clone,
	{
		self.current_key().and_then(|key| self.list.get(&key))
	}

	#[must_use]
	pub fn handle(&self) -> Option<Handle<u64, V>> {
		self.current_key().and_then(|key| self.list.handle(&key))
	}

	#[must_use]
	pub fn live(&self) -> Vec<Handle<u64, V>> {
		self.list.live()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::cell::Cell;

	fn counter() -> (Redraw, Rc<Cell<usize>>) {
		let count = Rc::new(Cell::new(0));
		let c = count.clone();
		(Rc::new(move || c.set(c.get() + 1)), count)
	}

	#[test]
	fn delete_is_immediate() {
		let (redraw, redraws) = counter();
		let list = TrackedList::new(redraw, [("a", 1)]);
		let handle = list.set("b", 2);
		assert!(list.delete(&"b"));
		assert!(!list.has(&"b"));
		assert!(!list.live().contains(&handle));
		assert!(handle.is_aborted());
		assert!(!list.delete(&"b"));
		assert_eq!(redraws.get(), 2);
	}

	#[test]
	fn handles_debug_their_state() {
		let (redraw, _) = counter();
		let list = TrackedList::new(redraw, None);
		let handle = list.set("k", 1);
		assert_eq!(format!("{:?}", handle), r#"Handle { key: "k", value: 1, aborted: false }"#);
		assert!(list.delete(&"k"));
		assert_eq!(format!("{:?}", handle), r#"Handle { key: "k", value: 1, aborted: true }"#);
	}

	#[test]
	fn superseded_handles_depart_until_released() {
		let (redraw, _) = counter();
		let list = TrackedList::new(redraw, None);
		let first = list.set("k", 1);
		let second = list.set("k", 2);
		assert!(first.is_aborted());
		assert_eq!(list.live(), vec![first.clone(), second.clone()]);
		assert_eq!(list.get(&"k"), Some(2));

		second.release();
		assert_eq!(list.live().len(), 2, "current handles can't be released");

		first.release();
		assert_eq!(list.live(), vec![second]);
	}

	#[test]
	fn set_evicts_departing_but_replace_keeps_them() {
		let (redraw, _) = counter();
		let list = TrackedList::new(redraw, None);
		let first = list.set("k", 1);
		let second = list.replace("k", 2);
		let third = list.replace("k", 3);
		assert_eq!(list.live(), vec![first, second.clone(), third.clone()]);

		let fourth = list.set("k", 4);
		assert_eq!(list.live(), vec![third, fourth]);
	}

	#[test]
	fn remove_skips_departure() {
		let (redraw, _) = counter();
		let list = TrackedList::new(redraw, [(1, "x"), (2, "y")]);
		let handle = list.handle(&1).unwrap();
		handle.remove();
		assert!(!list.has(&1));
		assert_eq!(list.live().len(), 1);
		assert_eq!(list.list()[0].key(), &2);
	}

	#[test]
	fn single_value_rekeys_on_change() {
		let (redraw, redraws) = counter();
		let tracked = Tracked::new(redraw);
		let a = tracked.set("a");
		assert_eq!(tracked.set("a"), a);
		assert_eq!(redraws.get(), 1);

		let b = tracked.set("b");
		assert_ne!(a.key(), b.key());
		assert!(a.is_aborted());
		assert_eq!(tracked.live(), vec![a.clone(), b]);
		a.release();
		assert_eq!(tracked.get(), Some("b"));
		assert!(tracked.delete());
		assert!(tracked.live().is_empty());
	}
}
