//! Reconciles one element's properties, attributes, styles and event handlers between two attribute snapshots.

use crate::{
	attrs::{Attrs, Style, Value},
	closure_map::ClosureMap,
	error::Error,
	host::{Host, HostError, Prop, XLINK_NAMESPACE},
	render::Redraw,
	vnode::Flags,
};
use std::rc::Rc;
use tracing::{trace, warn};

/// The element being patched.
pub(crate) struct Target<'a, H: Host> {
	pub host: &'a H,
	pub node: &'a H::Node,
	pub namespace: Option<&'a str>,
	pub flags: Flags,
	pub listeners: &'a mut Option<Rc<ClosureMap<H>>>,
	pub redraw: Option<&'a Redraw>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Patcher {
	Skip,
	/// Written through `property` on HTML elements, through `attribute` otherwise and when cleared.
	Reflected { property: &'static str, attribute: &'static str },
	Value,
	Style,
	/// Host-managed state that may have drifted from the last render.
	Forced,
	Xlink,
	Event,
	Default,
}

static SPECIAL_KEYS: &[(&str, Patcher)] = &[
	("children", Patcher::Skip),
	("key", Patcher::Skip),
	("is", Patcher::Skip),
	("class", Patcher::Reflected { property: "className", attribute: "class" }),
	("className", Patcher::Reflected { property: "className", attribute: "class" }),
	("title", Patcher::Reflected { property: "title", attribute: "title" }),
	("value", Patcher::Value),
	("style", Patcher::Style),
	("checked", Patcher::Forced),
	("selected", Patcher::Forced),
	("selectedIndex", Patcher::Forced),
];

/// Keys that must go through attributes even where a same-named property exists.
static ATTRIBUTE_ONLY: &[&str] = &["href", "list", "form", "width", "height"];

fn patcher_for(key: &str) -> Patcher {
	SPECIAL_KEYS.iter().find(|(name, _)| *name == key).map_or_else(
		|| {
			if key.starts_with("xlink:") {
				Patcher::Xlink
			} else if key.len() > 2 && key.starts_with("on") {
				Patcher::Event
			} else {
				Patcher::Default
			}
		},
		|&(_, patcher)| patcher,
	)
}

/// Diffs `old` (if any) against `new`, key by key, then clears keys only `old` has.
pub(crate) fn patch_attrs<H: Host>(target: &mut Target<'_, H>, old: Option<&Attrs<H>>, new: &Attrs<H>) -> Result<(), Error> {
	if let Some(listeners) = target.listeners.as_ref() {
		listeners.set_redraw(target.redraw.cloned());
	}

	// Inputs interpret `value` according to their type, so it goes first.
	let type_first = target.flags.contains(Flags::INPUT) && new.contains("type");
	if type_first {
		patch_one(target, "type", old.and_then(|old| old.get("type")), new.get("type"))?;
	}
	for (key, value) in new.iter() {
		if !(type_first && key == "type") {
			patch_one(target, key, old.and_then(|old| old.get(key)), Some(value))?;
		}
	}
	if let Some(old) = old {
		for (key, value) in old.iter() {
			if !new.contains(key) {
				patch_one(target, key, Some(value), None)?;
			}
		}
	}
	Ok(())
}

fn patch_one<H: Host>(target: &mut Target<'_, H>, key: &str, old: Option<&Value<H>>, new: Option<&Value<H>>) -> Result<(), Error> {
	patch_key(target, key, old, new).map_err(|source| Error::Attribute { name: key.to_owned(), source })
}

fn patch_key<H: Host>(target: &mut Target<'_, H>, key: &str, old: Option<&Value<H>>, new: Option<&Value<H>>) -> Result<(), HostError> {
	let patcher = patcher_for(key);
	let visible = |value: &&Value<H>| !matches!(value, Value::Null | Value::Object(_));
	let mut old = old.filter(visible);
	let mut new = new.filter(visible);
	if !matches!(patcher, Patcher::Default | Patcher::Forced | Patcher::Event | Patcher::Style) {
		old = old.filter(|value| !value.is_absent());
		new = new.filter(|value| !value.is_absent());
	}

	if let (Some(old), Some(new)) = (old, new) {
		if old.same(new) && !matches!(patcher, Patcher::Value | Patcher::Forced) {
			return Ok(());
		}
	}

	match (patcher, new) {
		(Patcher::Skip, _) | (_, None) if old.is_none() => Ok(()),
		(Patcher::Skip, _) => Ok(()),
		(Patcher::Event, new) => patch_event(target, &key[2..], new),
		(Patcher::Style, new) => patch_style(target, old, new),
		(patcher, None) => remove(target, key, patcher, old),
		(Patcher::Xlink, Some(value)) => target.host.set_attribute(target.node, Some(XLINK_NAMESPACE), key, &attribute_text(value)),
		(Patcher::Reflected { property, attribute }, Some(value)) => match (target.namespace, value.to_prop()) {
			(None, Some(prop)) => target.host.set_property(target.node, property, prop),
			_ => target.host.set_attribute(target.node, None, attribute, &attribute_text(value)),
		},
		(Patcher::Value, Some(value)) => patch_value(target, old, value),
		(Patcher::Forced | Patcher::Default, Some(value)) => set_default(target, key, old, value),
	}
}

fn attribute_text<H: Host>(value: &Value<H>) -> String {
	match value {
		Value::Bool(true) => String::new(),
		value => value.to_text().unwrap_or_default(),
	}
}

fn uses_property<H: Host>(target: &Target<'_, H>, key: &str) -> bool {
	target.namespace.is_none()
		&& (target.flags.contains(Flags::CUSTOM) || !ATTRIBUTE_ONLY.contains(&key))
		&& !(target.flags.contains(Flags::INPUT) && key == "type")
		&& target.host.has_property(target.node, key)
}

fn set_default<H: Host>(target: &Target<'_, H>, key: &str, old: Option<&Value<H>>, value: &Value<H>) -> Result<(), HostError> {
	if uses_property(target, key) {
		if let Some(prop) = value.to_prop() {
			return target.host.set_property(target.node, key, prop);
		}
	}
	match value {
		Value::Bool(false) => match old {
			Some(old) if !matches!(old, Value::Bool(false)) => target.host.remove_attribute(target.node, None, key),
			_ => Ok(()),
		},
		value => target.host.set_attribute(target.node, None, key, &attribute_text(value)),
	}
}

fn patch_value<H: Host>(target: &Target<'_, H>, old: Option<&Value<H>>, value: &Value<H>) -> Result<(), HostError> {
	let normalized = value.to_text().unwrap_or_default();
	let current = target.host.get_property(target.node, "value").to_text();
	let flags = target.flags;

	// Rewriting a focused field's own value moves the caret.
	if flags.intersects(Flags::INPUT | Flags::TEXTAREA) && current == normalized && target.host.active_element().as_ref() == Some(target.node) {
		return Ok(());
	}
	// Open dropdowns flicker on redundant writes.
	if flags.intersects(Flags::SELECT | Flags::OPTION) && old.is_some() && current == normalized {
		return Ok(());
	}
	if flags.contains(Flags::FILE_INPUT) && !normalized.is_empty() {
		warn!("`value` is read-only on file inputs. Ignoring the write.");
		return Ok(());
	}
	set_default(target, "value", old, value)
}

fn remove<H: Host>(target: &Target<'_, H>, key: &str, patcher: Patcher, old: Option<&Value<H>>) -> Result<(), HostError> {
	let host = target.host;
	let node = target.node;
	match patcher {
		Patcher::Reflected { attribute, .. } => host.remove_attribute(node, None, attribute),
		Patcher::Xlink => host.remove_attribute(node, Some(XLINK_NAMESPACE), key.split_once(':').map_or(key, |(_, local)| local)),
		Patcher::Value if target.flags.contains(Flags::OPTION) => host.remove_attribute(node, None, key),
		_ if uses_property(target, key) => {
			let reset = match host.get_property(node, key) {
				Prop::Bool(_) => Prop::Bool(false),
				Prop::Str(_) => Prop::Str(String::new()),
				Prop::Number(_) | Prop::Null => Prop::Null,
			};
			host.set_property(node, key, reset)?;
			if host.get_attribute(node, None, key).is_some() {
				host.remove_attribute(node, None, key)?;
			}
			Ok(())
		}
		_ => match old {
			Some(Value::Bool(false)) | None => Ok(()),
			Some(_) => host.remove_attribute(node, None, key),
		},
	}
}

fn patch_event<H: Host>(target: &mut Target<'_, H>, event_type: &str, new: Option<&Value<H>>) -> Result<(), HostError> {
	let handler = match new {
		Some(Value::Handler(handler)) => Some(handler.clone()),
		_ => None,
	};
	if let Some(listeners) = target.listeners.as_ref() {
		return listeners.update(event_type, handler);
	}
	if let Some(handler) = handler {
		let listeners = ClosureMap::new(target.host, target.node, target.redraw.cloned());
		listeners.update(event_type, Some(handler))?;
		*target.listeners = Some(listeners);
	}
	Ok(())
}

fn set_style_property<H: Host>(target: &Target<'_, H>, name: &str, value: Option<&str>) -> Result<(), HostError> {
	if name.starts_with('-') {
		target.host.set_style_raw(target.node, name, value)
	} else {
		target.host.set_style(target.node, name, value)
	}
}

fn patch_style<H: Host>(target: &Target<'_, H>, old: Option<&Value<H>>, new: Option<&Value<H>>) -> Result<(), HostError> {
	let host = target.host;
	let node = target.node;
	match (old, new) {
		(_, None) => host.remove_attribute(node, None, "style"),
		(Some(Value::Style(old)), Some(Value::Style(new))) => {
			if Rc::ptr_eq(old, new) {
				return Ok(());
			}
			for (name, value) in new.iter() {
				if old.get(name) != Some(value) {
					set_style_property(target, name, Some(&**value))?;
				}
			}
			for name in old.keys() {
				if !new.contains_key(name) {
					set_style_property(target, name, None)?;
				}
			}
			Ok(())
		}
		(old, Some(Value::Style(new))) => {
			if old.is_some() {
				host.remove_attribute(node, None, "style")?;
			}
			write_style(target, new)
		}
		(_, Some(value)) => host.set_attribute(node, None, "style", &value.to_text().unwrap_or_default()),
	}
}

fn write_style<H: Host>(target: &Target<'_, H>, style: &Style) -> Result<(), HostError> {
	trace!(count = style.len(), "Writing style declarations.");
	for (name, value) in style {
		set_style_property(target, name, Some(&**value))?;
	}
	Ok(())
}
