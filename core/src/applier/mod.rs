//! Applies a [`Commit`] to storage and derives the commit that exactly undoes it.

use chrono::Utc;
use tracing::{debug, error, instrument};

use crate::{commit::CommitError, storage::Storage, Commit};

mod inverse;
mod plan;
mod resolve;
mod tags;

pub use tags::ancestors;

/// Outcome of applying a commit
#[derive(Debug, Clone)]
pub struct Applied {
	/// What was actually written: temporary ids resolved, cascades folded in and tag parents as
	/// stored after the cycle-safe merge
	pub commit: Commit,
	/// Applying this restores storage to its state right before `commit`
	pub inverse: Commit,
}

pub struct CommitApplier<'s, S> {
	storage: &'s mut S,
}

impl<'s, S: Storage> CommitApplier<'s, S> {
	pub fn new(storage: &'s mut S) -> Self {
		Self { storage }
	}

	/// Applies `commit` inside a single storage transaction.
	///
	/// On error nothing is written: the transaction is rolled back and the error surfaced.
	#[instrument(skip_all, fields(timestamp = %commit.timestamp), err)]
	pub fn apply(&mut self, commit: Commit) -> Result<Applied, CommitError> {
		self.storage.begin()?;

		match self.apply_in_transaction(commit) {
			Ok(applied) => {
				self.storage.commit()?;
				Ok(applied)
			}
			Err(e) => {
				if let Err(rollback_error) = self.storage.rollback() {
					error!(?rollback_error, "Failed to rollback commit transaction;");
				}
				Err(e)
			}
		}
	}

	fn apply_in_transaction(&mut self, mut commit: Commit) -> Result<Applied, CommitError> {
		plan::normalize(&mut commit);
		resolve::resolve_ids(&mut *self.storage, &mut commit)?;
		plan::sanitize_values(&mut commit);
		plan::check_deletes(&*self.storage, &commit)?;
		plan::fold_cascades(&*self.storage, &mut commit)?;
		plan::validate(&*self.storage, &commit)?;
		tags::merge_parents(&*self.storage, &mut commit.tags)?;

		let mut inverse = inverse::capture_inverse(&*self.storage, &commit)?;
		inverse.timestamp = Utc::now();

		self.write(&commit)?;

		debug!(
			instances = commit.instances.len(),
			properties = commit.properties.len(),
			tags = commit.tags.len(),
			instance_values = commit.instance_values.len(),
			content_values = commit.content_values.len(),
			deletes = commit.empty_instances.len()
				+ commit.empty_properties.len()
				+ commit.empty_tags.len()
				+ commit.empty_instance_values.len()
				+ commit.empty_content_values.len(),
			"Commit applied;"
		);

		Ok(Applied { commit, inverse })
	}

	fn write(&mut self, plan: &Commit) -> Result<(), CommitError> {
		let storage = &mut *self.storage;

		storage.put_properties(&plan.properties)?;
		storage.put_instances(&plan.instances)?;
		storage.put_tags(&plan.tags)?;
		storage.put_instance_values(&plan.instance_values)?;
		storage.put_content_values(&plan.content_values)?;

		storage.delete_instance_values(&plan.empty_instance_values)?;
		storage.delete_content_values(&plan.empty_content_values)?;
		storage.delete_tags(&plan.empty_tags)?;
		storage.delete_properties(&plan.empty_properties)?;
		storage.delete_instances(&plan.empty_instances)?;

		Ok(())
	}
}
