//! Entities of the tagged media graph: instances, properties, tags and property values.
//!
//! New entities carry negative temporary ids until a [`Commit`](crate::Commit) gets applied,
//! which replaces them with permanent positive ids.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub type InstanceId = i64;
pub type PropertyId = i64;
pub type TagId = i64;
pub type FolderId = i64;

/// Synthetic root of the tag hierarchy, never stored
pub const ROOT_TAG_ID: TagId = 0;

/// Whether `id` is a caller assigned placeholder waiting for a permanent id
#[must_use]
pub const fn is_temporary(id: i64) -> bool {
	id < 0
}

/// Which table an id lives in, used for id allocation and error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Instance,
	Property,
	Tag,
}

impl std::fmt::Display for EntityKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Instance => "instance",
			Self::Property => "property",
			Self::Tag => "tag",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
	Text,
	Number,
	Tag,
	MultiTags,
	Date,
	Color,
	Checkbox,
	Url,
	Path,
	Folder,
	ContentHash,
	Width,
	Height,
	Id,
}

impl PropertyType {
	/// Tag typed properties hold lists of tag ids as values
	#[must_use]
	pub const fn is_tag(self) -> bool {
		matches!(self, Self::Tag | Self::MultiTags)
	}
}

/// What a property value is keyed by. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyMode {
	/// One value per instance
	Instance,
	/// One value per content hash, shared by every instance with identical content
	Content,
}

impl PropertyMode {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Instance => "instance",
			Self::Content => "content",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
	pub id: PropertyId,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: PropertyType,
	pub mode: PropertyMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
	pub id: TagId,
	pub property_id: PropertyId,
	pub value: String,
	/// Parent tags, [`ROOT_TAG_ID`] for top level tags. Never forms a cycle once stored.
	pub parents: Vec<TagId>,
	pub color: i32,
}

/// One physical occurrence of a media file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
	pub id: InstanceId,
	pub folder_id: FolderId,
	pub name: String,
	pub extension: String,
	pub content_hash: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub width: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub height: Option<u32>,
	/// Perceptual hash, filled by an external thumbnailing step
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	Checkbox(bool),
	Number(f64),
	Text(String),
	Tags(Vec<TagId>),
}

impl Value {
	/// Setting an empty value is the same as deleting it
	#[must_use]
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Text(text) => text.trim().is_empty(),
			Self::Tags(tags) => tags.is_empty(),
			Self::Checkbox(_) | Self::Number(_) => false,
		}
	}

	#[must_use]
	pub fn tags(&self) -> Option<&[TagId]> {
		match self {
			Self::Tags(tags) => Some(tags),
			_ => None,
		}
	}

	/// Removes every tag in `removed` from a tag list value, returns whether anything changed
	pub fn strip_tags(&mut self, removed: &HashSet<TagId>) -> bool {
		match self {
			Self::Tags(tags) => {
				let before = tags.len();
				tags.retain(|tag| !removed.contains(tag));
				tags.len() != before
			}
			_ => false,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceValueKey {
	pub property_id: PropertyId,
	pub instance_id: InstanceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentValueKey {
	pub property_id: PropertyId,
	pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceValue {
	pub property_id: PropertyId,
	pub instance_id: InstanceId,
	pub value: Value,
}

impl InstanceValue {
	#[must_use]
	pub const fn key(&self) -> InstanceValueKey {
		InstanceValueKey {
			property_id: self.property_id,
			instance_id: self.instance_id,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentValue {
	pub property_id: PropertyId,
	pub content_hash: String,
	pub value: Value,
}

impl ContentValue {
	#[must_use]
	pub fn key(&self) -> ContentValueKey {
		ContentValueKey {
			property_id: self.property_id,
			content_hash: self.content_hash.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_values() {
		assert!(Value::Text("   ".into()).is_empty());
		assert!(Value::Tags(vec![]).is_empty());
		assert!(!Value::Text("sunset".into()).is_empty());
		assert!(!Value::Tags(vec![3]).is_empty());
		assert!(!Value::Checkbox(false).is_empty());
		assert!(!Value::Number(0.0).is_empty());
	}

	#[test]
	fn values_deserialize_by_shape() {
		let values: Vec<Value> =
			serde_json::from_str(r#"[true, 4, 2.5, "text", [1, 2]]"#).expect("valid values");

		assert_eq!(
			values,
			vec![
				Value::Checkbox(true),
				Value::Number(4.0),
				Value::Number(2.5),
				Value::Text("text".into()),
				Value::Tags(vec![1, 2]),
			]
		);
	}

	#[test]
	fn property_serializes_type_and_mode() {
		let property = Property {
			id: 1,
			name: "Camera".into(),
			kind: PropertyType::MultiTags,
			mode: PropertyMode::Content,
		};

		let json = serde_json::to_value(&property).expect("serializable");
		assert_eq!(json["type"], "multi_tags");
		assert_eq!(json["mode"], "content");
	}
}
