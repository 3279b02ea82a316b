//! Query strings with bracketed nesting: `a=1&list[]=x&list[]=y&obj[key]=v`.

use crate::host::format_number;
use indexmap::IndexMap;
use std::borrow::Cow;

/// A route or query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	List(Vec<Param>),
	Map(IndexMap<String, Param>),
}

impl Param {
	/// The string a path template substitutes. [`None`] for lists and maps.
	#[must_use]
	pub fn to_text(&self) -> Option<Cow<'_, str>> {
		match self {
			Param::Null => Some(Cow::Borrowed("null")),
			Param::Bool(value) => Some(Cow::Borrowed(if *value { "true" } else { "false" })),
			Param::Int(value) => Some(Cow::Owned(value.to_string())),
			Param::Float(value) => Some(Cow::Owned(format_number(*value))),
			Param::Str(value) => Some(Cow::Borrowed(value)),
			Param::List(_) | Param::Map(_) => None,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Param::Str(value) => Some(value),
			_ => None,
		}
	}
}

impl From<&str> for Param {
	fn from(value: &str) -> Self {
		Param::Str(value.to_owned())
	}
}

impl From<String> for Param {
	fn from(value: String) -> Self {
		Param::Str(value)
	}
}

impl From<bool> for Param {
	fn from(value: bool) -> Self {
		Param::Bool(value)
	}
}

impl From<i32> for Param {
	fn from(value: i32) -> Self {
		Param::Int(value.into())
	}
}

impl From<i64> for Param {
	fn from(value: i64) -> Self {
		Param::Int(value)
	}
}

impl From<u32> for Param {
	fn from(value: u32) -> Self {
		Param::Int(value.into())
	}
}

impl From<f64> for Param {
	fn from(value: f64) -> Self {
		Param::Float(value)
	}
}

impl<T: Into<Param>> From<Vec<T>> for Param {
	fn from(values: Vec<T>) -> Self {
		Param::List(values.into_iter().map(Into::into).collect())
	}
}

impl From<IndexMap<String, Param>> for Param {
	fn from(map: IndexMap<String, Param>) -> Self {
		Param::Map(map)
	}
}

impl<T: Into<Param>> From<Option<T>> for Param {
	fn from(value: Option<T>) -> Self {
		value.map_or(Param::Null, Into::into)
	}
}

/// Builds a parameter map from `(name, value)` pairs.
pub fn params<K: Into<String>, V: Into<Param>>(pairs: impl IntoIterator<Item = (K, V)>) -> IndexMap<String, Param> {
	pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

fn decode(text: &str) -> Cow<'_, str> {
	let plus_free: Cow<'_, str> = if text.contains('+') { Cow::Owned(text.replace('+', " ")) } else { Cow::Borrowed(text) };
	match urlencoding::decode(&plus_free) {
		Ok(decoded) => Cow::Owned(decoded.into_owned()),
		Err(_) => Cow::Owned(plus_free.into_owned()),
	}
}

/// Parses a query string, with or without its leading `?`.
///
/// `true` and `false` become booleans, keys without `=` map to the empty string, and bracketed keys nest:
/// `a[]` appends to a list, `a[0]` indexes one and `a[b]` builds a map.
#[must_use]
pub fn parse_query(query: &str) -> IndexMap<String, Param> {
	let query = query.strip_prefix('?').unwrap_or(query);
	let mut root = Param::Map(IndexMap::new());
	for entry in query.split('&').filter(|entry| !entry.is_empty()) {
		let (key, value) = entry.split_once('=').map_or((entry, ""), |(key, value)| (key, value));
		let key = decode(key);
		let value = match &*decode(value) {
			"true" => Param::Bool(true),
			"false" => Param::Bool(false),
			value => Param::Str(value.to_owned()),
		};
		assign(&mut root, &levels(&key), value);
	}
	match root {
		Param::Map(map) => map,
		_ => IndexMap::new(),
	}
}

/// Splits `a[b][]` into `["a", "b", ""]`.
fn levels(key: &str) -> Vec<&str> {
	match key.find('[') {
		None => vec![key],
		Some(open) => {
			let mut levels = vec![&key[..open]];
			levels.extend(key[open + 1..].trim_end_matches(']').split("]["));
			levels
		}
	}
}

fn assign(slot: &mut Param, levels: &[&str], value: Param) {
	let Some((level, rest)) = levels.split_first() else {
		*slot = value;
		return;
	};
	let numeric = level.is_empty() || level.parse::<usize>().is_ok();
	match slot {
		Param::List(list) if numeric => match level.parse::<usize>() {
			Ok(i) if i < list.len() => assign(&mut list[i], rest, value),
			_ => {
				list.push(Param::Null);
				if let Some(last) = list.last_mut() {
					assign(last, rest, value);
				}
			}
		},
		Param::List(list) => {
			let map = list.drain(..).enumerate().map(|(i, item)| (i.to_string(), item)).collect();
			*slot = Param::Map(map);
			assign(slot, levels, value);
		}
		Param::Map(map) => {
			let entry = map.entry((*level).to_owned()).or_insert(Param::Null);
			assign(entry, rest, value);
		}
		_ => {
			*slot = if numeric { Param::List(Vec::new()) } else { Param::Map(IndexMap::new()) };
			assign(slot, levels, value);
		}
	}
}

/// Serializes `params` as a query string without the leading `?`.
///
/// Lists repeat `key[]=`, maps recurse into `key[sub]=`, and [`Param::Null`] and empty strings produce a bare key.
#[must_use]
pub fn build_query(params: &IndexMap<String, Param>) -> String {
	let mut pairs = Vec::new();
	for (key, value) in params {
		destructure(&urlencoding::encode(key), value, &mut pairs);
	}
	pairs.join("&")
}

fn destructure(key: &str, value: &Param, pairs: &mut Vec<String>) {
	match value {
		Param::List(items) => {
			let key = format!("{}[]", key);
			for item in items {
				destructure(&key, item, pairs);
			}
		}
		Param::Map(map) => {
			for (sub, item) in map {
				destructure(&format!("{}[{}]", key, urlencoding::encode(sub)), item, pairs);
			}
		}
		Param::Null => pairs.push(key.to_owned()),
		Param::Str(text) if text.is_empty() => pairs.push(key.to_owned()),
		scalar => {
			let text = scalar.to_text().unwrap_or_default();
			pairs.push(format!("{}={}", key, urlencoding::encode(&text)));
		}
	}
}
