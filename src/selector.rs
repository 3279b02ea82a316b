//! `tag#id.class[attr=value]` selectors, compiled once and cached per thread.

use crate::{
	attrs::{Attrs, Value},
	error::Error,
	host::Host,
	vnode::AttrsArg,
};
use core::cell::RefCell;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::trace;

#[derive(Debug, PartialEq)]
pub(crate) struct Selector {
	pub tag: Rc<str>,
	pub id: Option<Rc<str>>,
	pub class: Option<Rc<str>>,
	/// [`None`] values come from `[attr]` without `=` and mean `true`.
	pub attrs: Vec<(Rc<str>, Option<Rc<str>>)>,
}

thread_local! {
	static CACHE: RefCell<HashMap<Rc<str>, Rc<Selector>>> = RefCell::new(HashMap::new());
}

pub(crate) fn compile(selector: &Rc<str>) -> Result<Rc<Selector>, Error> {
	if let Some(compiled) = CACHE.with(|cache| cache.borrow().get(selector).cloned()) {
		return Ok(compiled);
	}
	let compiled = Rc::new(parse(selector).ok_or_else(|| Error::Selector(selector.to_string()))?);
	trace!(selector = &**selector, "Compiled selector.");
	CACHE.with(|cache| cache.borrow_mut().insert(selector.clone(), compiled.clone()));
	Ok(compiled)
}

fn is_delimiter(c: char) -> bool {
	matches!(c, '#' | '.' | '[' | ']')
}

fn parse(selector: &str) -> Option<Selector> {
	let tag_end = selector.find(is_delimiter).unwrap_or(selector.len());
	let (tag, mut rest) = selector.split_at(tag_end);
	let mut id = None;
	let mut classes = Vec::new();
	let mut attrs = Vec::new();

	while let Some(marker) = rest.chars().next() {
		rest = &rest[1..];
		match marker {
			'#' | '.' => {
				let end = rest.find(is_delimiter).unwrap_or(rest.len());
				if end == 0 {
					return None;
				}
				let (name, tail) = rest.split_at(end);
				if marker == '#' {
					id = Some(Rc::from(name));
				} else {
					classes.push(name);
				}
				rest = tail;
			}
			'[' => {
				let (attr, tail) = parse_attr(rest)?;
				attrs.push(attr);
				rest = tail;
			}
			_ => return None,
		}
	}

	Some(Selector {
		tag: if tag.is_empty() { "div".into() } else { tag.into() },
		id,
		class: (!classes.is_empty()).then(|| classes.join(" ").into()),
		attrs,
	})
}

/// Parses the inside of `[...]`, returning the attribute and the text after `]`.
fn parse_attr(input: &str) -> Option<((Rc<str>, Option<Rc<str>>), &str)> {
	let name_end = input.find(|c| c == '=' || c == ']')?;
	let name = input[..name_end].trim();
	if name.is_empty() {
		return None;
	}
	let rest = &input[name_end..];
	if let Some(rest) = rest.strip_prefix(']') {
		return Some(((name.into(), None), rest));
	}

	let rest = rest[1..].trim_start();
	let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'');
	let body = if quote.is_some() { &rest[1..] } else { rest };

	let mut value = String::new();
	let mut chars = body.char_indices();
	while let Some((i, c)) = chars.next() {
		match c {
			'\\' => {
				let (_, escaped) = chars.next()?;
				value.push(escaped);
			}
			c if Some(c) == quote => {
				let tail = body[i + 1..].trim_start();
				return tail.strip_prefix(']').map(|tail| ((name.into(), Some(value.into())), tail));
			}
			']' if quote.is_none() => return Some(((name.into(), Some(value.into())), &body[i + 1..])),
			c => value.push(c),
		}
	}
	None
}

impl Selector {
	fn adds_attributes(&self) -> bool {
		self.id.is_some() || self.class.is_some() || !self.attrs.is_empty()
	}

	/// Merges selector defaults into `attrs`. Unchanged snapshots keep their identity.
	pub(crate) fn apply<H: Host>(&self, attrs: AttrsArg<H>) -> Rc<Attrs<H>> {
		if !self.adds_attributes() && attrs.get("className").is_none() {
			return attrs.into_shared();
		}

		let mut attrs = attrs.into_owned();
		for (name, value) in &self.attrs {
			if !attrs.contains(name) {
				attrs.insert(name.clone(), value.clone().map_or(Value::Bool(true), Value::Str));
			}
		}
		if let Some(id) = &self.id {
			if !attrs.contains("id") {
				attrs.insert("id", id.clone());
			}
		}

		let class = attrs.remove("class");
		let class_name = attrs.remove("className");
		let dynamic = class
			.filter(|value| !matches!(value, Value::Null))
			.or_else(|| class_name.filter(|value| !matches!(value, Value::Null)));
		let merged: Option<Value<H>> = match (&self.class, dynamic) {
			(Some(own), Some(dynamic)) => Some(match dynamic.to_text() {
				Some(dynamic) => Value::Str(format!("{} {}", own, dynamic).into()),
				None => Value::Str(own.clone()),
			}),
			(Some(own), None) => Some(Value::Str(own.clone())),
			(None, dynamic) => dynamic,
		};
		if let Some(merged) = merged {
			attrs.insert("class", merged);
		}

		Rc::new(attrs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_all_parts() {
		let selector = parse(r#"a#home.nav.active[href="/"][data-x='it\'s'][hidden]"#).unwrap();
		assert_eq!(&*selector.tag, "a");
		assert_eq!(selector.id.as_deref(), Some("home"));
		assert_eq!(selector.class.as_deref(), Some("nav active"));
		assert_eq!(
			selector.attrs,
			vec![
				(Rc::from("href"), Some(Rc::from("/"))),
				(Rc::from("data-x"), Some(Rc::from("it's"))),
				(Rc::from("hidden"), None),
			]
		);
	}

	#[test]
	fn defaults_to_div() {
		assert_eq!(&*parse(".card").unwrap().tag, "div");
		assert_eq!(&*parse("").unwrap().tag, "div");
	}

	#[test]
	fn rejects_malformed() {
		assert!(parse("div#").is_none());
		assert!(parse("div[unclosed").is_none());
		assert!(parse("div]").is_none());
		assert!(parse("div[]").is_none());
	}

	#[test]
	fn unquoted_values() {
		let selector = parse("input[type=checkbox]").unwrap();
		assert_eq!(selector.attrs, vec![(Rc::from("type"), Some(Rc::from("checkbox")))]);
	}

	#[test]
	fn cache_returns_the_same_instance() {
		let selector: Rc<str> = "p.cached".into();
		let a = compile(&selector).unwrap();
		let b = compile(&selector).unwrap();
		assert!(Rc::ptr_eq(&a, &b));
	}
}
