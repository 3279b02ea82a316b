//! Dynamically scoped values visible to the views below a [`set_context`](`crate::vnode::set_context`) node.

use core::{any::Any, fmt};
use hashbrown::HashMap;
use std::rc::Rc;

/// A read-only, layered map of context values.
///
/// Every layer is immutable once built. [`Context::extend`] returns a new layer and leaves `self` untouched.
#[derive(Clone, Default)]
pub struct Context(Rc<HashMap<Rc<str>, Rc<dyn Any>>>);

impl Context {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Layers `entries` over `self`.
	#[must_use]
	pub fn extend(&self, entries: &[(Rc<str>, Rc<dyn Any>)]) -> Self {
		if entries.is_empty() {
			return self.clone();
		}
		let mut map = (*self.0).clone();
		for (key, value) in entries {
			map.insert(key.clone(), value.clone());
		}
		Self(Rc::new(map))
	}

	#[must_use]
	pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
		self.0.get(key).and_then(|value| value.downcast_ref())
	}

	#[must_use]
	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.0.keys()).finish()
	}
}
