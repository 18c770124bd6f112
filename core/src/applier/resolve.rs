use std::collections::{hash_map::Entry, HashMap};

use tracing::trace;

use crate::{
	commit::CommitError,
	model::{is_temporary, EntityKind, Tag, Value, ROOT_TAG_ID},
	storage::Storage,
	Commit,
};

/// Temporary id to permanent id, per entity kind
#[derive(Debug, Default)]
pub(super) struct IdMaps {
	instances: HashMap<i64, i64>,
	properties: HashMap<i64, i64>,
	tags: HashMap<i64, i64>,
}

impl IdMaps {
	fn get_mut(&mut self, kind: EntityKind) -> &mut HashMap<i64, i64> {
		match kind {
			EntityKind::Instance => &mut self.instances,
			EntityKind::Property => &mut self.properties,
			EntityKind::Tag => &mut self.tags,
		}
	}

	fn resolve(&self, kind: EntityKind, id: i64) -> Result<i64, CommitError> {
		if !is_temporary(id) {
			return Ok(id);
		}

		let map = match kind {
			EntityKind::Instance => &self.instances,
			EntityKind::Property => &self.properties,
			EntityKind::Tag => &self.tags,
		};

		map.get(&id)
			.copied()
			.ok_or(CommitError::not_found(kind, id))
	}

	fn resolve_all(&self, kind: EntityKind, ids: &mut [i64]) -> Result<(), CommitError> {
		for id in ids {
			*id = self.resolve(kind, *id)?;
		}

		Ok(())
	}

	/// Hands out fresh ids to temporary ids that did not match any existing row, then points
	/// every alias at the id its owner ended up with
	fn assign<S: Storage>(
		&mut self,
		storage: &mut S,
		kind: EntityKind,
		fresh: &[i64],
		aliases: Vec<(i64, i64)>,
	) -> Result<(), CommitError> {
		let ids = storage.allocate_ids(kind, fresh.len())?;
		let map = self.get_mut(kind);

		map.extend(fresh.iter().copied().zip(ids));

		for (alias, owner) in aliases {
			if let Some(&id) = map.get(&owner) {
				map.insert(alias, id);
			}
		}

		Ok(())
	}
}

/// Replaces every temporary id in `commit` with a permanent one.
///
/// Instances are resolved first, then properties, then tags, as tags refer to properties. A new
/// instance or tag whose natural key already exists reuses the existing row instead of
/// creating a duplicate.
pub(super) fn resolve_ids<S: Storage>(
	storage: &mut S,
	commit: &mut Commit,
) -> Result<(), CommitError> {
	let mut maps = IdMaps::default();

	resolve_instances(storage, commit, &mut maps)?;
	resolve_properties(storage, commit, &mut maps)?;
	resolve_tags(storage, commit, &mut maps)?;
	rewrite_references(commit, &maps)?;

	trace!(
		instances = maps.instances.len(),
		properties = maps.properties.len(),
		tags = maps.tags.len(),
		"Resolved temporary ids"
	);

	Ok(())
}

fn resolve_instances<S: Storage>(
	storage: &mut S,
	commit: &mut Commit,
	maps: &mut IdMaps,
) -> Result<(), CommitError> {
	let mut claimed = HashMap::new();
	let mut aliases = Vec::new();
	let mut fresh = Vec::new();

	for instance in commit
		.instances
		.iter()
		.filter(|instance| is_temporary(instance.id))
	{
		match claimed.entry((instance.folder_id, instance.name.clone())) {
			Entry::Occupied(owner) => aliases.push((instance.id, *owner.get())),
			Entry::Vacant(slot) => {
				slot.insert(instance.id);

				match storage.find_instance(instance.folder_id, &instance.name)? {
					Some(existing) => {
						maps.instances.insert(instance.id, existing.id);
					}
					None => fresh.push(instance.id),
				}
			}
		}
	}

	maps.assign(storage, EntityKind::Instance, &fresh, aliases)?;

	for instance in &mut commit.instances {
		instance.id = maps.resolve(EntityKind::Instance, instance.id)?;
	}
	super::plan::keep_last_by_key(&mut commit.instances, |instance| instance.id);

	Ok(())
}

fn resolve_properties<S: Storage>(
	storage: &mut S,
	commit: &mut Commit,
	maps: &mut IdMaps,
) -> Result<(), CommitError> {
	let fresh = commit
		.properties
		.iter()
		.map(|property| property.id)
		.filter(|&id| is_temporary(id))
		.collect::<Vec<_>>();

	maps.assign(storage, EntityKind::Property, &fresh, Vec::new())?;

	for property in &mut commit.properties {
		property.id = maps.resolve(EntityKind::Property, property.id)?;
	}

	Ok(())
}

fn resolve_tags<S: Storage>(
	storage: &mut S,
	commit: &mut Commit,
	maps: &mut IdMaps,
) -> Result<(), CommitError> {
	for tag in &mut commit.tags {
		tag.property_id = maps.resolve(EntityKind::Property, tag.property_id)?;
	}

	let mut claimed = HashMap::new();
	let mut aliases = Vec::new();
	let mut fresh = Vec::new();
	let mut reused = HashMap::new();

	for tag in commit.tags.iter().filter(|tag| is_temporary(tag.id)) {
		match claimed.entry((tag.property_id, tag.value.clone())) {
			Entry::Occupied(owner) => aliases.push((tag.id, *owner.get())),
			Entry::Vacant(slot) => {
				slot.insert(tag.id);

				match storage.find_tag(tag.property_id, &tag.value)? {
					Some(existing) => {
						maps.tags.insert(tag.id, existing.id);
						reused.insert(existing.id, existing.parents);
					}
					None => fresh.push(tag.id),
				}
			}
		}
	}

	maps.assign(storage, EntityKind::Tag, &fresh, aliases)?;

	for tag in &mut commit.tags {
		tag.id = maps.resolve(EntityKind::Tag, tag.id)?;
		maps.resolve_all(EntityKind::Tag, &mut tag.parents)?;

		// Reusing a tag never drops the edges it already has
		if let Some(existing_parents) = reused.get(&tag.id) {
			tag.parents = pano_utils::dedup_in_order(
				existing_parents.iter().chain(tag.parents.iter()).copied(),
			);
		}
	}

	commit.tags = merge_duplicate_tags(std::mem::take(&mut commit.tags));

	// The root only stands for "no parent"
	for tag in &mut commit.tags {
		if tag.parents.iter().any(|&parent| parent != ROOT_TAG_ID) {
			tag.parents.retain(|&parent| parent != ROOT_TAG_ID);
		}
	}

	Ok(())
}

/// Entries resolving to the same tag collapse into the first one, with their parents unioned
fn merge_duplicate_tags(tags: Vec<Tag>) -> Vec<Tag> {
	let mut merged = Vec::<Tag>::with_capacity(tags.len());
	let mut positions = HashMap::new();

	for tag in tags {
		if let Some(&position) = positions.get(&tag.id) {
			let first: &mut Tag = &mut merged[position];
			for parent in tag.parents {
				if !first.parents.contains(&parent) {
					first.parents.push(parent);
				}
			}
		} else {
			positions.insert(tag.id, merged.len());
			merged.push(tag);
		}
	}

	merged
}

fn rewrite_value(value: &mut Value, maps: &IdMaps) -> Result<(), CommitError> {
	if let Value::Tags(tags) = value {
		maps.resolve_all(EntityKind::Tag, tags)?;
	}

	Ok(())
}

fn rewrite_references(commit: &mut Commit, maps: &IdMaps) -> Result<(), CommitError> {
	for value in &mut commit.instance_values {
		value.property_id = maps.resolve(EntityKind::Property, value.property_id)?;
		value.instance_id = maps.resolve(EntityKind::Instance, value.instance_id)?;
		rewrite_value(&mut value.value, maps)?;
	}

	for value in &mut commit.content_values {
		value.property_id = maps.resolve(EntityKind::Property, value.property_id)?;
		rewrite_value(&mut value.value, maps)?;
	}

	maps.resolve_all(EntityKind::Instance, &mut commit.empty_instances)?;
	maps.resolve_all(EntityKind::Property, &mut commit.empty_properties)?;
	maps.resolve_all(EntityKind::Tag, &mut commit.empty_tags)?;

	for key in &mut commit.empty_instance_values {
		key.property_id = maps.resolve(EntityKind::Property, key.property_id)?;
		key.instance_id = maps.resolve(EntityKind::Instance, key.instance_id)?;
	}

	for key in &mut commit.empty_content_values {
		key.property_id = maps.resolve(EntityKind::Property, key.property_id)?;
	}

	Ok(())
}
