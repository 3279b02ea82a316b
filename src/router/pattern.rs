//! Route path templates: `/users/:id`, `/files/*rest`, `/search?kind=video`.

use super::{
	query::{build_query, parse_query, Param},
	RouteState,
};
use core::cell::RefCell;
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use regex::Regex;
use std::rc::Rc;
use tracing::trace;

/// A malformed route pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
	#[error("route pattern {0:?} contains an empty path segment")]
	DoubleSlash(String),
	#[error("route pattern {0:?} contains an illegal parameter name")]
	Name(String),
	#[error("route pattern {0:?} contains adjacent parameters without a separator")]
	Adjacent(String),
	#[error("the wildcard in route pattern {0:?} must come last")]
	Wildcard(String),
	#[error("route pattern {pattern:?} declares {name:?} more than once")]
	Duplicate { pattern: String, name: String },
}

#[derive(Debug)]
pub(crate) struct Compiled {
	regex: Regex,
	names: Vec<String>,
	query: IndexMap<String, Param>,
}

thread_local! {
	static CACHE: RefCell<HashMap<String, Rc<Compiled>>> = RefCell::new(HashMap::new());
}

/// Splits off `#fragment` and `?query`.
fn split(template: &str) -> (&str, &str, Option<&str>) {
	let (rest, fragment) = match template.split_once('#') {
		Some((rest, fragment)) => (rest, Some(fragment)),
		None => (template, None),
	};
	let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
	(path, query, fragment)
}

fn is_name_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_'
}

/// Reads a parameter name starting at the beginning of `chars`.
fn read_name(chars: &mut core::iter::Peekable<core::str::Chars<'_>>) -> String {
	let mut name = String::new();
	while let Some(&c) = chars.peek() {
		if !is_name_char(c) {
			break;
		}
		name.push(c);
		chars.next();
	}
	name
}

pub(crate) fn compile(pattern: &str) -> Result<Rc<Compiled>, RouteError> {
	if let Some(compiled) = CACHE.with(|cache| cache.borrow().get(pattern).cloned()) {
		return Ok(compiled);
	}

	let (path, query, _) = split(pattern);
	let mut source = String::from("^");
	let mut names: Vec<String> = Vec::new();
	let mut seen = HashSet::new();
	let mut after_parameter = false;
	let mut previous = None;
	let mut chars = path.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				if let Some(escaped) = chars.next() {
					source.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
				}
				after_parameter = false;
			}
			':' | '*' => {
				if after_parameter {
					return Err(RouteError::Adjacent(pattern.to_owned()));
				}
				let name = read_name(&mut chars);
				if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
					return Err(RouteError::Name(pattern.to_owned()));
				}
				if !seen.insert(name.clone()) {
					return Err(RouteError::Duplicate { pattern: pattern.to_owned(), name });
				}
				if c == '*' {
					if chars.peek().is_some() {
						return Err(RouteError::Wildcard(pattern.to_owned()));
					}
					source.push_str("(.*)");
				} else {
					source.push_str("([^/]+)");
				}
				names.push(name);
				after_parameter = true;
			}
			'/' if previous == Some('/') => return Err(RouteError::DoubleSlash(pattern.to_owned())),
			c => {
				source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
				after_parameter = false;
			}
		}
		previous = Some(c);
	}
	source.push('$');

	// Everything user-controlled was escaped above.
	let regex = Regex::new(&source).map_err(|_| RouteError::Name(pattern.to_owned()))?;
	trace!(pattern, regex = regex.as_str(), "Compiled route pattern.");
	let compiled = Rc::new(Compiled {
		regex,
		names,
		query: parse_query(query),
	});
	Ok(CACHE.with(|cache| Rc::clone(cache.borrow_mut().entry(pattern.to_owned()).or_insert(compiled))))
}

/// Matches `route` against `pattern`, returning the percent-decoded parameters in declaration order.
///
/// Fixed query parameters in `pattern` must be present in `route` with the same value.
/// A capture that isn't valid percent-encoded UTF-8 fails the match.
///
/// # Errors
///
/// If `pattern` is malformed.
pub fn match_path(route: &RouteState, pattern: &str) -> Result<Option<IndexMap<String, String>>, RouteError> {
	let compiled = compile(pattern)?;
	let captures = match compiled.regex.captures(&route.path) {
		Some(captures) => captures,
		None => return Ok(None),
	};
	if compiled.query.iter().any(|(key, value)| route.query.get(key) != Some(value)) {
		return Ok(None);
	}

	let mut params = IndexMap::new();
	for (i, name) in compiled.names.iter().enumerate() {
		let raw = captures.get(i + 1).map_or("", |capture| capture.as_str());
		match urlencoding::decode(raw) {
			Ok(value) => params.insert(name.clone(), value.into_owned()),
			Err(_) => return Ok(None),
		};
	}
	Ok(Some(params))
}

/// Fills `template`'s parameters from `params`.
///
/// `:name` values are percent-encoded. The `*name` wildcard is inserted raw, except that `?` and `#` are escaped.
/// Markers without a (scalar) value stay as they are. Unused parameters are appended to the template's own query.
#[must_use]
pub fn build_path(template: &str, params: &IndexMap<String, Param>) -> String {
	let (path, query, fragment) = split(template);
	let mut out = String::with_capacity(template.len());
	let mut used = HashSet::new();
	let mut chars = path.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				if let Some(escaped) = chars.next() {
					out.push(escaped);
				}
			}
			':' | '*' => {
				let name = read_name(&mut chars);
				match params.get(&name).and_then(Param::to_text) {
					Some(value) => {
						if c == ':' {
							out.push_str(&urlencoding::encode(&value));
						} else {
							out.push_str(&value.replace('?', "%3F").replace('#', "%23"));
						}
						used.insert(name);
					}
					None => {
						out.push(c);
						out.push_str(&name);
					}
				}
			}
			c => out.push(c),
		}
	}

	let mut merged = parse_query(query);
	for (key, value) in params {
		if !used.contains(key) {
			merged.insert(key.clone(), value.clone());
		}
	}
	let query = build_query(&merged);
	if !query.is_empty() {
		out.push('?');
		out.push_str(&query);
	}
	if let Some(fragment) = fragment {
		out.push('#');
		out.push_str(fragment);
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::router::query::params;

	#[test]
	fn validation() {
		assert!(matches!(compile("/a//b"), Err(RouteError::DoubleSlash(_))));
		assert!(matches!(compile("/:"), Err(RouteError::Name(_))));
		assert!(matches!(compile("/:1st"), Err(RouteError::Name(_))));
		assert!(matches!(compile("/:a:b"), Err(RouteError::Adjacent(_))));
		assert!(matches!(compile("/*rest/x"), Err(RouteError::Wildcard(_))));
		assert!(matches!(compile("/:id/:id"), Err(RouteError::Duplicate { .. })));
		assert!(compile("/:a-:b").is_ok());
		assert!(compile(r"/\:literal").is_ok());
	}

	#[test]
	fn escaped_markers_are_literal() {
		let route = RouteState::new("", r"/:literal");
		assert_eq!(match_path(&route, r"/\:literal").unwrap(), Some(IndexMap::new()));
	}

	#[test]
	fn wildcard_is_raw() {
		let built = build_path("/files/*rest", &params([("rest", "a/b?.txt")]));
		assert_eq!(built, "/files/a/b%3F.txt");
	}

	#[test]
	fn missing_params_keep_their_marker() {
		assert_eq!(build_path("/users/:id", &IndexMap::new()), "/users/:id");
	}

	#[test]
	fn template_query_and_fragment_survive() {
		let built = build_path("/list?sort=asc#top", &params([("page", 2)]));
		assert_eq!(built, "/list?sort=asc&page=2#top");
	}
}
