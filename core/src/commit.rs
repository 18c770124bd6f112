use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
	model::{
		ContentValue, ContentValueKey, EntityKind, Instance, InstanceId, InstanceValue,
		InstanceValueKey, Property, PropertyId, Tag, TagId,
	},
	storage::StorageError,
};

/// A bundle of creates, updates and deletes applied as a single reversible operation.
///
/// Entities in the create/update lists with a negative id are new and get a permanent id when
/// the commit is applied; positive ids either update an existing row or restore a deleted one.
/// The `empty_*` lists name what must be deleted. This is also the shape broadcast to
/// observers after every do, undo and redo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
	#[serde(default)]
	pub instances: Vec<Instance>,
	#[serde(default)]
	pub properties: Vec<Property>,
	#[serde(default)]
	pub tags: Vec<Tag>,
	#[serde(default)]
	pub instance_values: Vec<InstanceValue>,
	#[serde(default)]
	pub content_values: Vec<ContentValue>,

	#[serde(default)]
	pub empty_instances: Vec<InstanceId>,
	#[serde(default)]
	pub empty_properties: Vec<PropertyId>,
	#[serde(default)]
	pub empty_tags: Vec<TagId>,
	#[serde(default)]
	pub empty_instance_values: Vec<InstanceValueKey>,
	#[serde(default)]
	pub empty_content_values: Vec<ContentValueKey>,

	#[serde(default = "Utc::now")]
	pub timestamp: DateTime<Utc>,
}

impl Default for Commit {
	fn default() -> Self {
		Self {
			instances: Vec::new(),
			properties: Vec::new(),
			tags: Vec::new(),
			instance_values: Vec::new(),
			content_values: Vec::new(),
			empty_instances: Vec::new(),
			empty_properties: Vec::new(),
			empty_tags: Vec::new(),
			empty_instance_values: Vec::new(),
			empty_content_values: Vec::new(),
			timestamp: Utc::now(),
		}
	}
}

impl Commit {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// A commit that changes nothing
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
			&& self.properties.is_empty()
			&& self.tags.is_empty()
			&& self.instance_values.is_empty()
			&& self.content_values.is_empty()
			&& self.empty_instances.is_empty()
			&& self.empty_properties.is_empty()
			&& self.empty_tags.is_empty()
			&& self.empty_instance_values.is_empty()
			&& self.empty_content_values.is_empty()
	}

	#[must_use]
	pub fn with_instances(mut self, instances: impl IntoIterator<Item = Instance>) -> Self {
		self.instances.extend(instances);
		self
	}

	#[must_use]
	pub fn with_properties(mut self, properties: impl IntoIterator<Item = Property>) -> Self {
		self.properties.extend(properties);
		self
	}

	#[must_use]
	pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
		self.tags.extend(tags);
		self
	}

	#[must_use]
	pub fn with_instance_values(mut self, values: impl IntoIterator<Item = InstanceValue>) -> Self {
		self.instance_values.extend(values);
		self
	}

	#[must_use]
	pub fn with_content_values(mut self, values: impl IntoIterator<Item = ContentValue>) -> Self {
		self.content_values.extend(values);
		self
	}

	#[must_use]
	pub fn deleting_instances(mut self, ids: impl IntoIterator<Item = InstanceId>) -> Self {
		self.empty_instances.extend(ids);
		self
	}

	#[must_use]
	pub fn deleting_properties(mut self, ids: impl IntoIterator<Item = PropertyId>) -> Self {
		self.empty_properties.extend(ids);
		self
	}

	#[must_use]
	pub fn deleting_tags(mut self, ids: impl IntoIterator<Item = TagId>) -> Self {
		self.empty_tags.extend(ids);
		self
	}

	#[must_use]
	pub fn deleting_instance_values(
		mut self,
		keys: impl IntoIterator<Item = InstanceValueKey>,
	) -> Self {
		self.empty_instance_values.extend(keys);
		self
	}

	#[must_use]
	pub fn deleting_content_values(
		mut self,
		keys: impl IntoIterator<Item = ContentValueKey>,
	) -> Self {
		self.empty_content_values.extend(keys);
		self
	}
}

#[derive(Debug, Error)]
pub enum CommitError {
	#[error("{kind} <id='{id}'> not found and not created by the commit")]
	NotFound { kind: EntityKind, id: i64 },
	#[error("property <id='{property_id}'> is not keyed by {expected}")]
	ModeMismatch {
		property_id: PropertyId,
		expected: &'static str,
	},
	#[error("invalid value for property <id='{property_id}'>: {reason}")]
	InvalidValue {
		property_id: PropertyId,
		reason: &'static str,
	},
	#[error(transparent)]
	Storage(#[from] StorageError),
}

impl CommitError {
	pub(crate) const fn not_found(kind: EntityKind, id: i64) -> Self {
		Self::NotFound { kind, id }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Value;

	#[test]
	fn wire_shape_uses_documented_field_names() {
		let commit = Commit::new()
			.with_instance_values([InstanceValue {
				property_id: 1,
				instance_id: 2,
				value: Value::Text("hello".into()),
			}])
			.deleting_tags([7]);

		let json = serde_json::to_value(&commit).expect("serializable");
		let object = json.as_object().expect("commit is a json object");

		for field in [
			"instances",
			"properties",
			"tags",
			"instance_values",
			"content_values",
			"empty_instances",
			"empty_properties",
			"empty_tags",
			"empty_instance_values",
			"empty_content_values",
			"timestamp",
		] {
			assert!(object.contains_key(field), "missing field {field}");
		}

		assert_eq!(json["empty_tags"], serde_json::json!([7]));
		assert_eq!(json["instance_values"][0]["value"], "hello");
	}

	#[test]
	fn missing_lists_default_to_empty() {
		let commit: Commit =
			serde_json::from_str(r#"{"empty_instances": [3]}"#).expect("partial commit parses");

		assert_eq!(commit.empty_instances, vec![3]);
		assert!(commit.tags.is_empty());
		assert!(!commit.is_empty());
		assert!(Commit::default().is_empty());
	}
}
