#![allow(dead_code)]

use pano_core::{
	model::{
		ContentValue, Instance, InstanceValue, Property, PropertyMode, PropertyType, Tag, TagId,
		Value, ROOT_TAG_ID,
	},
	storage::{MemoryStore, Storage},
};

pub const KEYWORDS: i64 = 1;
pub const NOTES: i64 = 2;

pub const NATURE: TagId = 1;
pub const TREE: TagId = 2;
pub const OAK: TagId = 3;

pub fn property(id: i64, name: &str, kind: PropertyType, mode: PropertyMode) -> Property {
	Property {
		id,
		name: name.to_string(),
		kind,
		mode,
	}
}

pub fn tag(id: TagId, property_id: i64, value: &str, parents: Vec<TagId>) -> Tag {
	Tag {
		id,
		property_id,
		value: value.to_string(),
		parents,
		color: 0,
	}
}

pub fn instance(id: i64, name: &str, content_hash: &str) -> Instance {
	Instance {
		id,
		folder_id: 1,
		name: name.to_string(),
		extension: "jpg".to_string(),
		content_hash: content_hash.to_string(),
		url: None,
		width: Some(640),
		height: Some(480),
		phash: None,
	}
}

pub fn tags_value(property_id: i64, instance_id: i64, tags: Vec<TagId>) -> InstanceValue {
	InstanceValue {
		property_id,
		instance_id,
		value: Value::Tags(tags),
	}
}

pub fn note(content_hash: &str, text: &str) -> ContentValue {
	ContentValue {
		property_id: NOTES,
		content_hash: content_hash.to_string(),
		value: Value::Text(text.to_string()),
	}
}

/// Two instances tagged from a small hierarchy `nature > tree > oak`, plus a note on the
/// content of the first one
pub fn seeded_store() -> MemoryStore {
	let mut store = MemoryStore::new();

	store
		.put_properties(&[
			property(
				KEYWORDS,
				"Keywords",
				PropertyType::MultiTags,
				PropertyMode::Instance,
			),
			property(NOTES, "Notes", PropertyType::Text, PropertyMode::Content),
		])
		.unwrap();
	store
		.put_tags(&[
			tag(NATURE, KEYWORDS, "nature", vec![ROOT_TAG_ID]),
			tag(TREE, KEYWORDS, "tree", vec![NATURE]),
			tag(OAK, KEYWORDS, "oak", vec![TREE]),
		])
		.unwrap();
	store
		.put_instances(&[instance(1, "a.jpg", "h1"), instance(2, "b.jpg", "h2")])
		.unwrap();
	store
		.put_instance_values(&[
			tags_value(KEYWORDS, 1, vec![TREE, OAK]),
			tags_value(KEYWORDS, 2, vec![NATURE]),
		])
		.unwrap();
	store.put_content_values(&[note("h1", "note")]).unwrap();

	store
}
