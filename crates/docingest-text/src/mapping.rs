//! Dynamic field mapping: the first document that carries a field fixes its
//! kind for the index, later documents must agree.

use std::collections::HashMap;
use std::fmt;

use docingest_core::types::Source;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Boolean,
	Number,
	Text,
	Object,
}

impl FieldKind {
	/// `None` for nulls and for arrays without a non-null element.
	pub fn of(value: &Value) -> Option<Self> {
		match value {
			Value::Null => None,
			Value::Bool(_) => Some(Self::Boolean),
			Value::Number(_) => Some(Self::Number),
			Value::String(_) => Some(Self::Text),
			Value::Object(_) => Some(Self::Object),
			Value::Array(items) => items.iter().find_map(Self::of),
		}
	}
}

impl fmt::Display for FieldKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Boolean => "boolean",
			Self::Number => "number",
			Self::Text => "text",
			Self::Object => "object",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingConflict {
	pub field: String,
	pub mapped: FieldKind,
	pub found: FieldKind,
}

impl fmt::Display for MappingConflict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "failed to parse field [{}] of type [{}], found value of type [{}]", self.field, self.mapped, self.found)
	}
}

/// Per-index field kinds keyed by dotted path.
#[derive(Debug, Default, Clone)]
pub struct MappingRegistry {
	indices: HashMap<String, HashMap<String, FieldKind>>,
}

impl MappingRegistry {
	/// Check every field of `source` against `index`; only when all agree are
	/// the new fields added to the mapping.
	pub fn check_and_register(&mut self, index: &str, source: &Source) -> Result<(), MappingConflict> {
		let mut found = Vec::new();
		collect_fields("", source, &mut found);
		let mapping = self.indices.entry(index.to_string()).or_default();
		let mut pending: HashMap<&str, FieldKind> = HashMap::new();
		for (field, kind) in &found {
			let mapped = mapping.get(field.as_str()).or_else(|| pending.get(field.as_str())).copied();
			match mapped {
				Some(mapped) if mapped != *kind => {
					return Err(MappingConflict { field: field.clone(), mapped, found: *kind });
				}
				Some(_) => {}
				None => { pending.insert(field.as_str(), *kind); }
			}
		}
		for (field, kind) in pending {
			mapping.insert(field.to_string(), kind);
		}
		Ok(())
	}

	pub fn field_kind(&self, index: &str, field: &str) -> Option<FieldKind> {
		self.indices.get(index).and_then(|m| m.get(field)).copied()
	}
}

fn collect_fields(prefix: &str, object: &Source, out: &mut Vec<(String, FieldKind)>) {
	for (key, value) in object {
		let path = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };
		let Some(kind) = FieldKind::of(value) else { continue };
		out.push((path.clone(), kind));
		match value {
			Value::Object(inner) => collect_fields(&path, inner, out),
			Value::Array(items) => {
				for inner in items.iter().filter_map(Value::as_object) {
					collect_fields(&path, inner, out);
				}
			}
			_ => {}
		}
	}
}
