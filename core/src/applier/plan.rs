//! Turns a resolved commit into the exact set of rows to write: empty values become deletes,
//! deletions cascade to everything depending on them and deletion wins over any upsert of the
//! same key.

use std::{collections::HashSet, hash::Hash, mem};

use pano_utils::dedup_in_order;
use tracing::trace;

use crate::{
	commit::CommitError,
	model::{
		ContentValue, EntityKind, InstanceValue, Property, PropertyId, PropertyMode, TagId, Value,
		ROOT_TAG_ID,
	},
	storage::Storage,
	Commit,
};

/// Keeps the last entry for every key, at the position of that last entry
pub(super) fn keep_last_by_key<T, K: Eq + Hash>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
	let mut seen = HashSet::new();
	let mut kept = items
		.drain(..)
		.rev()
		.filter(|item| seen.insert(key(item)))
		.collect::<Vec<_>>();

	kept.reverse();
	*items = kept;
}

pub(super) fn normalize(commit: &mut Commit) {
	keep_last_by_key(&mut commit.instances, |instance| instance.id);
	keep_last_by_key(&mut commit.properties, |property| property.id);
	keep_last_by_key(&mut commit.tags, |tag| tag.id);
	keep_last_by_key(&mut commit.instance_values, InstanceValue::key);
	keep_last_by_key(&mut commit.content_values, ContentValue::key);
	dedup_delete_lists(commit);

	for tag in &mut commit.tags {
		tag.parents = dedup_in_order(mem::take(&mut tag.parents));
	}
}

fn dedup_delete_lists(commit: &mut Commit) {
	commit.empty_instances = dedup_in_order(mem::take(&mut commit.empty_instances));
	commit.empty_properties = dedup_in_order(mem::take(&mut commit.empty_properties));
	commit.empty_tags = dedup_in_order(mem::take(&mut commit.empty_tags));
	commit.empty_instance_values = dedup_in_order(mem::take(&mut commit.empty_instance_values));
	commit.empty_content_values = dedup_in_order(mem::take(&mut commit.empty_content_values));
}

/// Setting a value to empty is the same as deleting it
pub(super) fn sanitize_values(commit: &mut Commit) {
	let (emptied, kept): (Vec<_>, Vec<_>) = mem::take(&mut commit.instance_values)
		.into_iter()
		.partition(|value| value.value.is_empty());
	commit.instance_values = kept;
	commit
		.empty_instance_values
		.extend(emptied.iter().map(InstanceValue::key));

	let (emptied, kept): (Vec<_>, Vec<_>) = mem::take(&mut commit.content_values)
		.into_iter()
		.partition(|value| value.value.is_empty());
	commit.content_values = kept;
	commit
		.empty_content_values
		.extend(emptied.iter().map(ContentValue::key));
}

/// First of `requested` that is neither planned by the commit nor stored
fn first_missing(
	requested: &[i64],
	planned: impl IntoIterator<Item = i64>,
	stored: impl IntoIterator<Item = i64>,
) -> Option<i64> {
	let known = planned.into_iter().chain(stored).collect::<HashSet<_>>();

	requested.iter().copied().find(|id| !known.contains(id))
}

/// Every id the commit asks to delete must name a stored row or one the commit itself creates.
/// Runs before cascades are folded in, so only the caller's own ids are checked.
pub(super) fn check_deletes<S: Storage>(storage: &S, commit: &Commit) -> Result<(), CommitError> {
	if let Some(id) = first_missing(
		&commit.empty_instances,
		commit.instances.iter().map(|instance| instance.id),
		storage
			.get_instances(&commit.empty_instances)?
			.iter()
			.map(|instance| instance.id),
	) {
		return Err(CommitError::not_found(EntityKind::Instance, id));
	}

	if let Some(id) = first_missing(
		&commit.empty_properties,
		commit.properties.iter().map(|property| property.id),
		storage
			.get_properties(&commit.empty_properties)?
			.iter()
			.map(|property| property.id),
	) {
		return Err(CommitError::not_found(EntityKind::Property, id));
	}

	if let Some(id) = first_missing(
		&commit.empty_tags,
		commit.tags.iter().map(|tag| tag.id),
		storage
			.get_tags(&commit.empty_tags)?
			.iter()
			.map(|tag| tag.id),
	) {
		return Err(CommitError::not_found(EntityKind::Tag, id));
	}

	Ok(())
}

/// Adds to `commit` every row that must change because of the rows it deletes
pub(super) fn fold_cascades<S: Storage>(
	storage: &S,
	commit: &mut Commit,
) -> Result<(), CommitError> {
	cascade_property_deletion(storage, commit)?;
	cascade_instance_deletion(storage, commit)?;

	let deleted_tags = cascade_tag_deletion(storage, commit)?;
	strip_deleted_tags(storage, commit, &deleted_tags)?;

	dedup_delete_lists(commit);
	drop_deleted_upserts(commit);

	Ok(())
}

fn cascade_property_deletion<S: Storage>(
	storage: &S,
	commit: &mut Commit,
) -> Result<(), CommitError> {
	if commit.empty_properties.is_empty() {
		return Ok(());
	}

	let properties = commit.empty_properties.clone();

	let stored_tags = storage.get_tags_by_properties(&properties)?;
	let planned_tags = commit
		.tags
		.iter()
		.filter(|tag| properties.contains(&tag.property_id))
		.map(|tag| tag.id)
		.collect::<Vec<_>>();
	commit
		.empty_tags
		.extend(stored_tags.iter().map(|tag| tag.id).chain(planned_tags));

	commit.empty_instance_values.extend(
		storage
			.get_instance_values_by_properties(&properties)?
			.iter()
			.map(InstanceValue::key),
	);
	commit.empty_content_values.extend(
		storage
			.get_content_values_by_properties(&properties)?
			.iter()
			.map(ContentValue::key),
	);

	Ok(())
}

fn cascade_instance_deletion<S: Storage>(
	storage: &S,
	commit: &mut Commit,
) -> Result<(), CommitError> {
	if commit.empty_instances.is_empty() {
		return Ok(());
	}

	commit.empty_instance_values.extend(
		storage
			.get_instance_values_by_instances(&commit.empty_instances)?
			.iter()
			.map(InstanceValue::key),
	);

	Ok(())
}

/// Removes deleted tags from their children's parents. A child left without any parent is
/// deleted as well, and so on down the hierarchy.
fn cascade_tag_deletion<S: Storage>(
	storage: &S,
	commit: &mut Commit,
) -> Result<HashSet<TagId>, CommitError> {
	let mut deleted = commit
		.empty_tags
		.iter()
		.copied()
		.filter(|&id| id != ROOT_TAG_ID)
		.collect::<HashSet<_>>();
	let mut pending = deleted.iter().copied().collect::<Vec<_>>();

	while let Some(tag_id) = pending.pop() {
		let mut children = storage.get_tags_by_parents(&[tag_id])?;
		children.extend(
			commit
				.tags
				.iter()
				.filter(|tag| tag.parents.contains(&tag_id))
				.cloned(),
		);

		for child in children {
			if deleted.contains(&child.id) {
				continue;
			}

			// The commit's version of the child replaces the stored one
			let position = commit.tags.iter().position(|tag| tag.id == child.id);
			let mut child = position.map_or(child, |position| commit.tags[position].clone());

			if !child.parents.contains(&tag_id) {
				continue;
			}

			child.parents.retain(|parent| !deleted.contains(parent));

			if child.parents.is_empty() {
				trace!(tag_id = child.id, parent = tag_id, "Deleting orphaned tag");
				deleted.insert(child.id);
				pending.push(child.id);
				commit.empty_tags.push(child.id);
			} else if let Some(position) = position {
				commit.tags[position] = child;
			} else {
				commit.tags.push(child);
			}
		}
	}

	Ok(deleted)
}

/// Strips deleted tags out of every value listing them, values left empty are deleted
fn strip_deleted_tags<S: Storage>(
	storage: &S,
	commit: &mut Commit,
	deleted: &HashSet<TagId>,
) -> Result<(), CommitError> {
	if deleted.is_empty() {
		return Ok(());
	}

	let deleted_ids = deleted.iter().copied().collect::<Vec<_>>();
	let owners = dedup_in_order(
		storage
			.get_tags(&deleted_ids)?
			.into_iter()
			.map(|tag| tag.property_id),
	);

	let lists_deleted = |value: &Value| {
		value
			.tags()
			.is_some_and(|tags| tags.iter().any(|tag| deleted.contains(tag)))
	};

	let touched_instance_keys = commit
		.instance_values
		.iter()
		.map(InstanceValue::key)
		.chain(commit.empty_instance_values.iter().copied())
		.collect::<HashSet<_>>();
	let stored = storage.get_instance_values_by_properties(&owners)?;
	commit.instance_values.extend(
		stored
			.into_iter()
			.filter(|value| !touched_instance_keys.contains(&value.key()))
			.filter(|value| lists_deleted(&value.value)),
	);

	let touched_content_keys = commit
		.content_values
		.iter()
		.map(ContentValue::key)
		.chain(commit.empty_content_values.iter().cloned())
		.collect::<HashSet<_>>();
	let stored = storage.get_content_values_by_properties(&owners)?;
	commit.content_values.extend(
		stored
			.into_iter()
			.filter(|value| !touched_content_keys.contains(&value.key()))
			.filter(|value| lists_deleted(&value.value)),
	);

	for value in &mut commit.instance_values {
		value.value.strip_tags(deleted);
	}
	for value in &mut commit.content_values {
		value.value.strip_tags(deleted);
	}

	sanitize_values(commit);

	Ok(())
}

fn drop_deleted_upserts(commit: &mut Commit) {
	let instances = commit.empty_instances.iter().collect::<HashSet<_>>();
	let properties = commit.empty_properties.iter().collect::<HashSet<_>>();
	let tags = commit.empty_tags.iter().collect::<HashSet<_>>();
	let instance_values = commit.empty_instance_values.iter().collect::<HashSet<_>>();
	let content_values = commit.empty_content_values.iter().collect::<HashSet<_>>();

	commit
		.instances
		.retain(|instance| !instances.contains(&instance.id));
	commit
		.properties
		.retain(|property| !properties.contains(&property.id));
	commit
		.tags
		.retain(|tag| !tags.contains(&tag.id) && !properties.contains(&tag.property_id));
	commit.instance_values.retain(|value| {
		!instance_values.contains(&value.key())
			&& !properties.contains(&value.property_id)
			&& !instances.contains(&value.instance_id)
	});
	commit.content_values.retain(|value| {
		!content_values.contains(&value.key()) && !properties.contains(&value.property_id)
	});
}

/// Read access to the state the commit will produce: rows planned by the commit shadow the
/// stored ones and deleted rows are gone
struct Lookup<'a, S> {
	storage: &'a S,
	commit: &'a Commit,
}

impl<S: Storage> Lookup<'_, S> {
	fn property(&self, id: PropertyId) -> Result<Property, CommitError> {
		if self.commit.empty_properties.contains(&id) {
			return Err(CommitError::not_found(EntityKind::Property, id));
		}

		if let Some(property) = self.commit.properties.iter().find(|p| p.id == id) {
			return Ok(property.clone());
		}

		self.storage
			.get_properties(&[id])?
			.pop()
			.ok_or(CommitError::not_found(EntityKind::Property, id))
	}

	/// The property owning tag `id`
	fn tag_owner(&self, id: TagId) -> Result<PropertyId, CommitError> {
		if self.commit.empty_tags.contains(&id) {
			return Err(CommitError::not_found(EntityKind::Tag, id));
		}

		if let Some(tag) = self.commit.tags.iter().find(|tag| tag.id == id) {
			return Ok(tag.property_id);
		}

		self.storage
			.get_tags(&[id])?
			.pop()
			.map(|tag| tag.property_id)
			.ok_or(CommitError::not_found(EntityKind::Tag, id))
	}

	fn check_instance(&self, id: i64) -> Result<(), CommitError> {
		let exists = !self.commit.empty_instances.contains(&id)
			&& (self.commit.instances.iter().any(|i| i.id == id)
				|| !self.storage.get_instances(&[id])?.is_empty());

		if exists {
			Ok(())
		} else {
			Err(CommitError::not_found(EntityKind::Instance, id))
		}
	}

	fn check_value(&self, property: &Property, value: &Value) -> Result<(), CommitError> {
		match (property.kind.is_tag(), value) {
			(true, Value::Tags(tags)) => {
				for &tag in tags {
					if self.tag_owner(tag)? != property.id {
						return Err(CommitError::InvalidValue {
							property_id: property.id,
							reason: "tag belongs to another property",
						});
					}
				}
				Ok(())
			}
			(true, _) => Err(CommitError::InvalidValue {
				property_id: property.id,
				reason: "tag properties take a list of tag ids",
			}),
			(false, Value::Tags(_)) => Err(CommitError::InvalidValue {
				property_id: property.id,
				reason: "only tag properties take a list of tag ids",
			}),
			(false, _) => Ok(()),
		}
	}
}

/// Checks every reference in the commit points to a row that exists once the commit is applied
pub(super) fn validate<S: Storage>(storage: &S, commit: &Commit) -> Result<(), CommitError> {
	let lookup = Lookup { storage, commit };

	let ids = commit.properties.iter().map(|p| p.id).collect::<Vec<_>>();
	for prior in storage.get_properties(&ids)? {
		let changed_mode = commit
			.properties
			.iter()
			.any(|property| property.id == prior.id && property.mode != prior.mode);

		if changed_mode {
			return Err(CommitError::ModeMismatch {
				property_id: prior.id,
				expected: prior.mode.as_str(),
			});
		}
	}

	for tag in &commit.tags {
		let property = lookup.property(tag.property_id)?;
		if !property.kind.is_tag() {
			return Err(CommitError::InvalidValue {
				property_id: property.id,
				reason: "tags can only belong to tag properties",
			});
		}

		for &parent in tag.parents.iter().filter(|&&parent| parent != ROOT_TAG_ID) {
			lookup.tag_owner(parent)?;
		}
	}

	for value in &commit.instance_values {
		let property = lookup.property(value.property_id)?;
		if property.mode != PropertyMode::Instance {
			return Err(CommitError::ModeMismatch {
				property_id: property.id,
				expected: PropertyMode::Instance.as_str(),
			});
		}

		lookup.check_instance(value.instance_id)?;
		lookup.check_value(&property, &value.value)?;
	}

	for value in &commit.content_values {
		let property = lookup.property(value.property_id)?;
		if property.mode != PropertyMode::Content {
			return Err(CommitError::ModeMismatch {
				property_id: property.id,
				expected: PropertyMode::Content.as_str(),
			});
		}

		lookup.check_value(&property, &value.value)?;
	}

	Ok(())
}
