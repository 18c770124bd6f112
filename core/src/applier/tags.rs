use std::collections::{HashMap, HashSet};

use pano_utils::dedup_in_order;
use tracing::debug;

use crate::{
	model::{Tag, TagId, ROOT_TAG_ID},
	storage::{Storage, StorageError},
};

/// Parent edges of the tag hierarchy as the current commit sees them: edges staged by the
/// commit shadow the stored ones
struct ParentGraph<'s, S> {
	storage: &'s S,
	staged: HashMap<TagId, Vec<TagId>>,
	stored: HashMap<TagId, Vec<TagId>>,
}

impl<'s, S: Storage> ParentGraph<'s, S> {
	fn new(storage: &'s S) -> Self {
		Self {
			storage,
			staged: HashMap::new(),
			stored: HashMap::new(),
		}
	}

	fn parents(&mut self, tag_id: TagId) -> Result<Vec<TagId>, StorageError> {
		if let Some(parents) = self.staged.get(&tag_id) {
			return Ok(parents.clone());
		}

		if let Some(parents) = self.stored.get(&tag_id) {
			return Ok(parents.clone());
		}

		let parents = self
			.storage
			.get_tags(&[tag_id])?
			.pop()
			.map(|tag| tag.parents)
			.unwrap_or_default();
		self.stored.insert(tag_id, parents.clone());

		Ok(parents)
	}

	/// Every tag reachable from `tag_id` through parent edges, `tag_id` excluded unless a cycle
	/// leads back to it
	fn ancestors(&mut self, tag_id: TagId) -> Result<HashSet<TagId>, StorageError> {
		let mut visited = HashSet::new();
		let mut stack = self.parents(tag_id)?;

		while let Some(current) = stack.pop() {
			if current == ROOT_TAG_ID || !visited.insert(current) {
				continue;
			}

			stack.extend(self.parents(current)?);
		}

		Ok(visited)
	}

	/// Whether `target` can be reached from `from` by following parent edges
	fn reaches(&mut self, from: TagId, target: TagId) -> Result<bool, StorageError> {
		if from == target {
			return Ok(true);
		}

		Ok(self.ancestors(from)?.contains(&target))
	}
}

/// Every ancestor of a stored tag, following all of its parents. The synthetic root is not
/// included.
pub fn ancestors<S: Storage>(storage: &S, tag_id: TagId) -> Result<HashSet<TagId>, StorageError> {
	ParentGraph::new(storage).ancestors(tag_id)
}

/// Merges the requested parents of `tags` into the stored hierarchy without ever creating a
/// cycle.
///
/// First every tag keeps only the stored edges that are also requested, so removals all land
/// before any addition is checked. Then each requested edge that is new is accepted only if the
/// new parent cannot already reach the tag. Rejected edges are dropped, the rest of the commit
/// still applies. A tag left without parents hangs from the root.
pub(super) fn merge_parents<S: Storage>(
	storage: &S,
	tags: &mut [Tag],
) -> Result<(), StorageError> {
	let ids = tags.iter().map(|tag| tag.id).collect::<Vec<_>>();
	let stored_parents = storage
		.get_tags(&ids)?
		.into_iter()
		.map(|tag| (tag.id, tag.parents))
		.collect::<HashMap<_, _>>();
	let no_parents = Vec::new();

	let mut graph = ParentGraph::new(storage);

	for tag in tags.iter_mut() {
		tag.parents = dedup_in_order(std::mem::take(&mut tag.parents));

		let old = stored_parents.get(&tag.id).unwrap_or(&no_parents);
		graph.staged.insert(
			tag.id,
			tag.parents
				.iter()
				.copied()
				.filter(|parent| old.contains(parent))
				.collect(),
		);
	}

	for tag in tags.iter_mut() {
		let old = stored_parents.get(&tag.id).unwrap_or(&no_parents);
		let additions = tag
			.parents
			.iter()
			.copied()
			.filter(|parent| !old.contains(parent))
			.collect::<Vec<_>>();

		for parent in additions {
			if graph.reaches(parent, tag.id)? {
				debug!(
					tag_id = tag.id,
					parent, "Dropping tag parent, it would create a cycle"
				);
				continue;
			}

			if let Some(accepted) = graph.staged.get_mut(&tag.id) {
				accepted.push(parent);
			}
		}

		let accepted = graph.staged.get(&tag.id).cloned().unwrap_or_default();
		tag.parents.retain(|parent| accepted.contains(parent));

		if tag.parents.is_empty() {
			tag.parents.push(ROOT_TAG_ID);
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::MemoryStore;

	fn tag(id: TagId, parents: Vec<TagId>) -> Tag {
		Tag {
			id,
			property_id: 1,
			value: format!("tag {id}"),
			parents,
			color: 0,
		}
	}

	#[test]
	fn ancestors_follow_every_parent() {
		let mut storage = MemoryStore::new();
		// 4 has two parents, only the second one leads to 1
		storage
			.put_tags(&[
				tag(1, vec![ROOT_TAG_ID]),
				tag(2, vec![ROOT_TAG_ID]),
				tag(3, vec![1]),
				tag(4, vec![2, 3]),
			])
			.expect("put");

		let found = ancestors(&storage, 4).expect("readable");

		assert_eq!(found, HashSet::from([1, 2, 3]));
	}

	#[test]
	fn cycle_closing_edge_is_dropped() {
		let mut storage = MemoryStore::new();
		storage
			.put_tags(&[tag(1, vec![ROOT_TAG_ID]), tag(2, vec![1])])
			.expect("put");

		let mut planned = vec![tag(1, vec![2])];
		merge_parents(&storage, &mut planned).expect("mergeable");

		assert_eq!(planned[0].parents, vec![ROOT_TAG_ID]);
	}

	#[test]
	fn swapping_parent_and_child_in_one_commit() {
		let mut storage = MemoryStore::new();
		storage
			.put_tags(&[tag(1, vec![ROOT_TAG_ID]), tag(2, vec![1])])
			.expect("put");

		// Removing 2 -> 1 lands before 1 -> 2 gets checked
		let mut planned = vec![tag(1, vec![2]), tag(2, vec![ROOT_TAG_ID])];
		merge_parents(&storage, &mut planned).expect("mergeable");

		assert_eq!(planned[0].parents, vec![2]);
		assert_eq!(planned[1].parents, vec![ROOT_TAG_ID]);
	}

	#[test]
	fn self_parent_is_dropped() {
		let storage = MemoryStore::new();

		let mut planned = vec![tag(7, vec![7, ROOT_TAG_ID])];
		merge_parents(&storage, &mut planned).expect("mergeable");

		assert_eq!(planned[0].parents, vec![ROOT_TAG_ID]);
	}
}
