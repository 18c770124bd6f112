use std::{collections::HashSet, hash::Hash};

use crate::{
	model::{ContentValue, InstanceValue},
	storage::{Storage, StorageError},
	Commit,
};

/// Splits the keys a commit writes into rows to restore and rows to remove when undoing it:
/// keys with a prior row get that row back, keys without one get deleted
fn split_by_prior<T, K: Eq + Hash>(
	written: impl IntoIterator<Item = K>,
	prior: Vec<T>,
	key: impl Fn(&T) -> K,
	restore: &mut Vec<T>,
	remove: &mut Vec<K>,
) {
	let existing = prior.iter().map(key).collect::<HashSet<_>>();

	remove.extend(written.into_iter().filter(|key| !existing.contains(key)));
	restore.extend(prior);
}

/// Builds the commit undoing `plan` from the rows it is about to overwrite or delete. Must run
/// before `plan` touches storage.
pub(super) fn capture_inverse<S: Storage>(
	storage: &S,
	plan: &Commit,
) -> Result<Commit, StorageError> {
	let mut inverse = Commit::new();

	let ids = plan
		.instances
		.iter()
		.map(|instance| instance.id)
		.collect::<Vec<_>>();
	split_by_prior(
		ids.iter().copied(),
		storage.get_instances(&ids)?,
		|instance| instance.id,
		&mut inverse.instances,
		&mut inverse.empty_instances,
	);
	inverse
		.instances
		.extend(storage.get_instances(&plan.empty_instances)?);

	let ids = plan
		.properties
		.iter()
		.map(|property| property.id)
		.collect::<Vec<_>>();
	split_by_prior(
		ids.iter().copied(),
		storage.get_properties(&ids)?,
		|property| property.id,
		&mut inverse.properties,
		&mut inverse.empty_properties,
	);
	inverse
		.properties
		.extend(storage.get_properties(&plan.empty_properties)?);

	let ids = plan.tags.iter().map(|tag| tag.id).collect::<Vec<_>>();
	split_by_prior(
		ids.iter().copied(),
		storage.get_tags(&ids)?,
		|tag| tag.id,
		&mut inverse.tags,
		&mut inverse.empty_tags,
	);
	inverse.tags.extend(storage.get_tags(&plan.empty_tags)?);

	let keys = plan
		.instance_values
		.iter()
		.map(InstanceValue::key)
		.collect::<Vec<_>>();
	split_by_prior(
		keys.iter().copied(),
		storage.get_instance_values(&keys)?,
		InstanceValue::key,
		&mut inverse.instance_values,
		&mut inverse.empty_instance_values,
	);
	inverse
		.instance_values
		.extend(storage.get_instance_values(&plan.empty_instance_values)?);

	let keys = plan
		.content_values
		.iter()
		.map(ContentValue::key)
		.collect::<Vec<_>>();
	split_by_prior(
		keys.iter().cloned(),
		storage.get_content_values(&keys)?,
		ContentValue::key,
		&mut inverse.content_values,
		&mut inverse.empty_content_values,
	);
	inverse
		.content_values
		.extend(storage.get_content_values(&plan.empty_content_values)?);

	Ok(inverse)
}
