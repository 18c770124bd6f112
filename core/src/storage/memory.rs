use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use super::{Storage, StorageError};
use crate::model::{
	ContentValue, ContentValueKey, EntityKind, FolderId, Instance, InstanceId, InstanceValue,
	InstanceValueKey, Property, PropertyId, Tag, TagId,
};

/// Every table of a [`MemoryStore`], comparable to tell whether two storage states are
/// observably identical
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
	pub instances: BTreeMap<InstanceId, Instance>,
	pub properties: BTreeMap<PropertyId, Property>,
	pub tags: BTreeMap<TagId, Tag>,
	pub instance_values: BTreeMap<InstanceValueKey, InstanceValue>,
	pub content_values: BTreeMap<ContentValueKey, ContentValue>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
	instance: i64,
	property: i64,
	tag: i64,
}

impl Counters {
	fn get_mut(&mut self, kind: EntityKind) -> &mut i64 {
		match kind {
			EntityKind::Instance => &mut self.instance,
			EntityKind::Property => &mut self.property,
			EntityKind::Tag => &mut self.tag,
		}
	}

	fn bump_past(&mut self, kind: EntityKind, id: i64) {
		let counter = self.get_mut(kind);
		*counter = (*counter).max(id);
	}
}

/// In memory [`Storage`], a transaction is a copy of the tables restored on rollback.
///
/// Id counters live outside the transaction, so ids handed out by a rolled back transaction are
/// never handed out again.
#[derive(Debug, Default)]
pub struct MemoryStore {
	tables: Snapshot,
	counters: Counters,
	open_transaction: Option<Snapshot>,
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn snapshot(&self) -> Snapshot {
		self.tables.clone()
	}

	#[must_use]
	pub const fn in_transaction(&self) -> bool {
		self.open_transaction.is_some()
	}
}

fn pick<K: Ord, V: Clone>(table: &BTreeMap<K, V>, keys: &[K]) -> Vec<V> {
	keys.iter().filter_map(|key| table.get(key)).cloned().collect()
}

impl Storage for MemoryStore {
	fn begin(&mut self) -> Result<(), StorageError> {
		if self.open_transaction.is_some() {
			return Err(StorageError::TransactionAlreadyOpen);
		}

		self.open_transaction = Some(self.tables.clone());
		trace!("Transaction opened");

		Ok(())
	}

	fn commit(&mut self) -> Result<(), StorageError> {
		self.open_transaction
			.take()
			.map(|_| trace!("Transaction committed"))
			.ok_or(StorageError::NoTransaction)
	}

	fn rollback(&mut self) -> Result<(), StorageError> {
		let backup = self
			.open_transaction
			.take()
			.ok_or(StorageError::NoTransaction)?;

		self.tables = backup;
		trace!("Transaction rolled back");

		Ok(())
	}

	fn allocate_ids(&mut self, kind: EntityKind, count: usize) -> Result<Vec<i64>, StorageError> {
		let counter = self.counters.get_mut(kind);
		let start = *counter + 1;

		*counter += i64::try_from(count).map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok((start..=*counter).collect())
	}

	fn get_instances(&self, ids: &[InstanceId]) -> Result<Vec<Instance>, StorageError> {
		Ok(pick(&self.tables.instances, ids))
	}

	fn find_instance(
		&self,
		folder_id: FolderId,
		name: &str,
	) -> Result<Option<Instance>, StorageError> {
		Ok(self
			.tables
			.instances
			.values()
			.find(|instance| instance.folder_id == folder_id && instance.name == name)
			.cloned())
	}

	fn put_instances(&mut self, instances: &[Instance]) -> Result<(), StorageError> {
		for instance in instances {
			self.counters.bump_past(EntityKind::Instance, instance.id);
			self.tables.instances.insert(instance.id, instance.clone());
		}

		Ok(())
	}

	fn delete_instances(&mut self, ids: &[InstanceId]) -> Result<(), StorageError> {
		let ids = ids.iter().collect::<HashSet<_>>();

		self.tables.instances.retain(|id, _| !ids.contains(id));
		self.tables
			.instance_values
			.retain(|key, _| !ids.contains(&key.instance_id));

		Ok(())
	}

	fn get_properties(&self, ids: &[PropertyId]) -> Result<Vec<Property>, StorageError> {
		Ok(pick(&self.tables.properties, ids))
	}

	fn put_properties(&mut self, properties: &[Property]) -> Result<(), StorageError> {
		for property in properties {
			self.counters.bump_past(EntityKind::Property, property.id);
			self.tables.properties.insert(property.id, property.clone());
		}

		Ok(())
	}

	fn delete_properties(&mut self, ids: &[PropertyId]) -> Result<(), StorageError> {
		let ids = ids.iter().collect::<HashSet<_>>();

		self.tables.properties.retain(|id, _| !ids.contains(id));
		self.tables
			.tags
			.retain(|_, tag| !ids.contains(&tag.property_id));
		self.tables
			.instance_values
			.retain(|key, _| !ids.contains(&key.property_id));
		self.tables
			.content_values
			.retain(|key, _| !ids.contains(&key.property_id));

		Ok(())
	}

	fn get_tags(&self, ids: &[TagId]) -> Result<Vec<Tag>, StorageError> {
		Ok(pick(&self.tables.tags, ids))
	}

	fn get_tags_by_parents(&self, parents: &[TagId]) -> Result<Vec<Tag>, StorageError> {
		Ok(self
			.tables
			.tags
			.values()
			.filter(|tag| tag.parents.iter().any(|parent| parents.contains(parent)))
			.cloned()
			.collect())
	}

	fn get_tags_by_properties(
		&self,
		property_ids: &[PropertyId],
	) -> Result<Vec<Tag>, StorageError> {
		Ok(self
			.tables
			.tags
			.values()
			.filter(|tag| property_ids.contains(&tag.property_id))
			.cloned()
			.collect())
	}

	fn find_tag(&self, property_id: PropertyId, value: &str) -> Result<Option<Tag>, StorageError> {
		Ok(self
			.tables
			.tags
			.values()
			.find(|tag| tag.property_id == property_id && tag.value == value)
			.cloned())
	}

	fn put_tags(&mut self, tags: &[Tag]) -> Result<(), StorageError> {
		for tag in tags {
			self.counters.bump_past(EntityKind::Tag, tag.id);
			self.tables.tags.insert(tag.id, tag.clone());
		}

		Ok(())
	}

	fn delete_tags(&mut self, ids: &[TagId]) -> Result<(), StorageError> {
		for id in ids {
			self.tables.tags.remove(id);
		}

		Ok(())
	}

	fn get_instance_values(
		&self,
		keys: &[InstanceValueKey],
	) -> Result<Vec<InstanceValue>, StorageError> {
		Ok(pick(&self.tables.instance_values, keys))
	}

	fn get_instance_values_by_properties(
		&self,
		property_ids: &[PropertyId],
	) -> Result<Vec<InstanceValue>, StorageError> {
		Ok(self
			.tables
			.instance_values
			.values()
			.filter(|value| property_ids.contains(&value.property_id))
			.cloned()
			.collect())
	}

	fn get_instance_values_by_instances(
		&self,
		instance_ids: &[InstanceId],
	) -> Result<Vec<InstanceValue>, StorageError> {
		Ok(self
			.tables
			.instance_values
			.values()
			.filter(|value| instance_ids.contains(&value.instance_id))
			.cloned()
			.collect())
	}

	fn put_instance_values(&mut self, values: &[InstanceValue]) -> Result<(), StorageError> {
		for value in values {
			self.tables.instance_values.insert(value.key(), value.clone());
		}

		Ok(())
	}

	fn delete_instance_values(&mut self, keys: &[InstanceValueKey]) -> Result<(), StorageError> {
		for key in keys {
			self.tables.instance_values.remove(key);
		}

		Ok(())
	}

	fn get_content_values(
		&self,
		keys: &[ContentValueKey],
	) -> Result<Vec<ContentValue>, StorageError> {
		Ok(pick(&self.tables.content_values, keys))
	}

	fn get_content_values_by_properties(
		&self,
		property_ids: &[PropertyId],
	) -> Result<Vec<ContentValue>, StorageError> {
		Ok(self
			.tables
			.content_values
			.values()
			.filter(|value| property_ids.contains(&value.property_id))
			.cloned()
			.collect())
	}

	fn put_content_values(&mut self, values: &[ContentValue]) -> Result<(), StorageError> {
		for value in values {
			self.tables.content_values.insert(value.key(), value.clone());
		}

		Ok(())
	}

	fn delete_content_values(&mut self, keys: &[ContentValueKey]) -> Result<(), StorageError> {
		for key in keys {
			self.tables.content_values.remove(key);
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{PropertyMode, PropertyType, Value};

	fn property(id: PropertyId) -> Property {
		Property {
			id,
			name: format!("property {id}"),
			kind: PropertyType::Text,
			mode: PropertyMode::Instance,
		}
	}

	#[test]
	fn rollback_restores_tables() {
		let mut store = MemoryStore::new();
		store.put_properties(&[property(1)]).expect("put");
		let before = store.snapshot();

		store.begin().expect("begin");
		store.put_properties(&[property(2)]).expect("put");
		store.delete_properties(&[1]).expect("delete");
		store.rollback().expect("rollback");

		assert_eq!(store.snapshot(), before);
		assert!(!store.in_transaction());
		assert!(matches!(store.commit(), Err(StorageError::NoTransaction)));
	}

	#[test]
	fn nested_begin_is_refused() {
		let mut store = MemoryStore::new();
		store.begin().expect("begin");

		assert!(matches!(
			store.begin(),
			Err(StorageError::TransactionAlreadyOpen)
		));
	}

	#[test]
	fn ids_are_never_reused() {
		let mut store = MemoryStore::new();

		assert_eq!(
			store.allocate_ids(EntityKind::Tag, 2).expect("ids"),
			vec![1, 2]
		);

		store.begin().expect("begin");
		assert_eq!(store.allocate_ids(EntityKind::Tag, 1).expect("ids"), vec![3]);
		store.rollback().expect("rollback");

		assert_eq!(store.allocate_ids(EntityKind::Tag, 1).expect("ids"), vec![4]);
		// Counters are independent per kind
		assert_eq!(
			store.allocate_ids(EntityKind::Instance, 1).expect("ids"),
			vec![1]
		);

		// Caller supplied ids push the counter forward
		store.put_properties(&[property(10)]).expect("put");
		assert_eq!(
			store.allocate_ids(EntityKind::Property, 1).expect("ids"),
			vec![11]
		);
	}

	#[test]
	fn deleting_a_property_cleans_its_values() {
		let mut store = MemoryStore::new();
		store.put_properties(&[property(1)]).expect("put");
		store
			.put_instance_values(&[InstanceValue {
				property_id: 1,
				instance_id: 5,
				value: Value::Text("kept?".into()),
			}])
			.expect("put");

		store.delete_properties(&[1]).expect("delete");

		assert!(store.snapshot().instance_values.is_empty());
	}
}
