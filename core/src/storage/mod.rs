//! The storage collaborator the commit engine writes through.
//!
//! Storage is assumed relational and transaction capable. Everything
//! [`CommitApplier`](crate::CommitApplier) does for one commit happens between a single
//! [`Storage::begin`] and [`Storage::commit`] (or [`Storage::rollback`] on failure).

use thiserror::Error;

use crate::model::{
	ContentValue, ContentValueKey, EntityKind, FolderId, Instance, InstanceId, InstanceValue,
	InstanceValueKey, Property, PropertyId, Tag, TagId,
};

mod memory;

pub use memory::{MemoryStore, Snapshot};

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("a transaction is already open")]
	TransactionAlreadyOpen,
	#[error("no transaction is open")]
	NoTransaction,
	#[error("storage backend error: {0}")]
	Backend(String),
}

pub trait Storage: Send {
	fn begin(&mut self) -> Result<(), StorageError>;
	fn commit(&mut self) -> Result<(), StorageError>;
	fn rollback(&mut self) -> Result<(), StorageError>;

	/// Reserves `count` fresh permanent ids from the per kind counter. Ids are never reused.
	fn allocate_ids(&mut self, kind: EntityKind, count: usize) -> Result<Vec<i64>, StorageError>;

	fn get_instances(&self, ids: &[InstanceId]) -> Result<Vec<Instance>, StorageError>;
	fn find_instance(
		&self,
		folder_id: FolderId,
		name: &str,
	) -> Result<Option<Instance>, StorageError>;
	/// Inserts or replaces rows by id, keeping caller supplied ids
	fn put_instances(&mut self, instances: &[Instance]) -> Result<(), StorageError>;
	/// Also drops the instance keyed values of the deleted instances
	fn delete_instances(&mut self, ids: &[InstanceId]) -> Result<(), StorageError>;

	fn get_properties(&self, ids: &[PropertyId]) -> Result<Vec<Property>, StorageError>;
	fn put_properties(&mut self, properties: &[Property]) -> Result<(), StorageError>;
	/// Also drops the tags and values belonging to the deleted properties
	fn delete_properties(&mut self, ids: &[PropertyId]) -> Result<(), StorageError>;

	fn get_tags(&self, ids: &[TagId]) -> Result<Vec<Tag>, StorageError>;
	fn get_tags_by_parents(&self, parents: &[TagId]) -> Result<Vec<Tag>, StorageError>;
	fn get_tags_by_properties(&self, property_ids: &[PropertyId])
		-> Result<Vec<Tag>, StorageError>;
	fn find_tag(&self, property_id: PropertyId, value: &str) -> Result<Option<Tag>, StorageError>;
	fn put_tags(&mut self, tags: &[Tag]) -> Result<(), StorageError>;
	fn delete_tags(&mut self, ids: &[TagId]) -> Result<(), StorageError>;

	fn get_instance_values(
		&self,
		keys: &[InstanceValueKey],
	) -> Result<Vec<InstanceValue>, StorageError>;
	fn get_instance_values_by_properties(
		&self,
		property_ids: &[PropertyId],
	) -> Result<Vec<InstanceValue>, StorageError>;
	fn get_instance_values_by_instances(
		&self,
		instance_ids: &[InstanceId],
	) -> Result<Vec<InstanceValue>, StorageError>;
	fn put_instance_values(&mut self, values: &[InstanceValue]) -> Result<(), StorageError>;
	fn delete_instance_values(&mut self, keys: &[InstanceValueKey]) -> Result<(), StorageError>;

	fn get_content_values(
		&self,
		keys: &[ContentValueKey],
	) -> Result<Vec<ContentValue>, StorageError>;
	fn get_content_values_by_properties(
		&self,
		property_ids: &[PropertyId],
	) -> Result<Vec<ContentValue>, StorageError>;
	fn put_content_values(&mut self, values: &[ContentValue]) -> Result<(), StorageError>;
	fn delete_content_values(&mut self, keys: &[ContentValueKey]) -> Result<(), StorageError>;
}
