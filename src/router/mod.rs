//! Path-template routing on top of a [`Location`].
//!
//! ```
//! use sapwood::router::{build_path, match_path, params, RouteState};
//!
//! let path = build_path("/users/:id", &params([("id", 42)]));
//! let route = RouteState::new("", &path);
//! let matched = match_path(&route, "/users/:id").unwrap().unwrap();
//! assert_eq!(matched["id"], "42");
//! ```

mod pattern;
mod query;

pub use pattern::{build_path, match_path, RouteError};
pub use query::{build_query, params, parse_query, Param};

use crate::{host::HostError, render::Redraw};
use indexmap::IndexMap;
use tracing::{debug, instrument};

/// A parsed route: the part of the location after the router prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteState {
	/// Still percent-encoded. Always starts with `/`.
	pub path: String,
	pub query: IndexMap<String, Param>,
	pub fragment: Option<String>,
}

impl RouteState {
	/// Extracts the route from `href` (`path?query#hash`).
	///
	/// A prefix starting with `#` routes on the hash, one starting with `?` on the query, anything else on the path
	/// after `prefix`.
	#[must_use]
	pub fn new(prefix: &str, href: &str) -> Self {
		let route = match prefix.chars().next() {
			Some(marker @ ('#' | '?')) => href.find(marker).map_or("", |i| &href[i..]),
			_ => href,
		};
		let route = route.strip_prefix(prefix).unwrap_or_else(|| route.trim_start_matches(['#', '?']));

		let (rest, fragment) = match route.split_once('#') {
			Some((rest, fragment)) => (rest, Some(fragment.to_owned())),
			None => (route, None),
		};
		let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
		Self {
			path: if path.starts_with('/') { path.to_owned() } else { format!("/{}", path) },
			query: parse_query(query),
			fragment,
		}
	}

	/// See [`match_path`].
	///
	/// # Errors
	///
	/// If `pattern` is malformed.
	pub fn matches(&self, pattern: &str) -> Result<Option<IndexMap<String, String>>, RouteError> {
		match_path(self, pattern)
	}
}

/// The browser-history-like store a [`Router`] reads and navigates.
pub trait Location {
	/// The current location as `path?query#hash`.
	fn href(&self) -> String;
	fn push(&self, href: &str) -> Result<(), HostError>;
	fn replace(&self, href: &str) -> Result<(), HostError>;
}

/// How [`Router::set`] navigates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
	/// Replace the current history entry instead of pushing a new one.
	pub replace: bool,
}

/// The first route of a table that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
	/// Index into the route table.
	pub index: usize,
	pub params: IndexMap<String, String>,
}

/// Reads and navigates routes under a fixed prefix.
pub struct Router<L: Location> {
	location: L,
	prefix: String,
	redraw: Option<Redraw>,
}

impl<L: Location> Router<L> {
	/// Routes on `location` after `prefix` (for example `"#!"`, `"?"` or `""`).
	pub fn new(location: L, prefix: impl Into<String>) -> Self {
		Self {
			location,
			prefix: prefix.into(),
			redraw: None,
		}
	}

	/// Called after each navigation.
	#[must_use]
	pub fn with_redraw(mut self, redraw: Redraw) -> Self {
		self.redraw = Some(redraw);
		self
	}

	pub fn location(&self) -> &L {
		&self.location
	}

	#[must_use]
	pub fn current(&self) -> RouteState {
		RouteState::new(&self.prefix, &self.location.href())
	}

	/// Matches the current route against `patterns` in order.
	///
	/// # Errors
	///
	/// If a pattern that had to be tried is malformed.
	pub fn resolve(&self, patterns: &[&str]) -> Result<Option<Resolved>, RouteError> {
		let route = self.current();
		for (index, pattern) in patterns.iter().enumerate() {
			if let Some(params) = match_path(&route, pattern)? {
				return Ok(Some(Resolved { index, params }));
			}
		}
		Ok(None)
	}

	/// Navigates to `template` filled with `params`, then requests a redraw.
	///
	/// # Errors
	///
	/// If the location rejects the navigation.
	#[instrument(skip(self, params))]
	pub fn set(&self, template: &str, params: &IndexMap<String, Param>, options: SetOptions) -> Result<(), HostError> {
		let path = build_path(template, params);
		let href = self.href_for(&path);
		debug!(href = href.as_str(), "Navigating.");
		if options.replace {
			self.location.replace(&href)?;
		} else {
			self.location.push(&href)?;
		}
		if let Some(redraw) = &self.redraw {
			redraw();
		}
		Ok(())
	}

	fn href_for(&self, path: &str) -> String {
		match self.prefix.chars().next() {
			Some(marker @ ('#' | '?')) => {
				let current = self.location.href();
				let base = current.find(|c| c == marker || (marker == '?' && c == '#')).map_or(&*current, |i| &current[..i]);
				format!("{}{}{}", base, self.prefix, path)
			}
			_ => format!("{}{}", self.prefix, path),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefixes() {
		let hash = RouteState::new("#!", "/app/index.html?x=1#!/users/7?tab=a");
		assert_eq!(hash.path, "/users/7");
		assert_eq!(hash.query["tab"], Param::from("a"));

		let path = RouteState::new("/app", "/app/users/7#top");
		assert_eq!(path.path, "/users/7");
		assert_eq!(path.fragment.as_deref(), Some("top"));

		let empty = RouteState::new("#!", "/index.html");
		assert_eq!(empty.path, "/");
	}
}
