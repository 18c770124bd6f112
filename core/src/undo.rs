use std::collections::VecDeque;

use tracing::{debug, instrument, trace};

use crate::{
	applier::{Applied, CommitApplier},
	commit::CommitError,
	storage::Storage,
	Commit,
};

/// Undo and redo stacks of inverse commits over a single storage.
///
/// Every do, undo and redo goes through [`CommitApplier`], so each of them is itself reversible.
pub struct UndoQueue<S> {
	storage: S,
	to_undo: VecDeque<Commit>,
	to_redo: Vec<Commit>,
	limit: Option<usize>,
}

impl<S: Storage> UndoQueue<S> {
	pub fn new(storage: S) -> Self {
		Self::with_limit(storage, None)
	}

	/// `limit` caps how many steps can be undone, the oldest one is forgotten first
	pub fn with_limit(storage: S, limit: Option<usize>) -> Self {
		Self {
			storage,
			to_undo: VecDeque::new(),
			to_redo: Vec::new(),
			limit,
		}
	}

	/// Applies `commit`, returning it as written with its temporary ids resolved
	#[instrument(skip_all, err)]
	pub fn do_commit(&mut self, commit: Commit) -> Result<Commit, CommitError> {
		let Applied { commit, inverse } = CommitApplier::new(&mut self.storage).apply(commit)?;

		self.to_redo.clear();
		self.push_undo(inverse);

		Ok(commit)
	}

	/// Reverts the last applied commit, returning what was applied to do so. Nothing to undo
	/// gives back an empty commit.
	#[instrument(skip_all, err)]
	pub fn undo(&mut self) -> Result<Commit, CommitError> {
		let Some(inverse) = self.to_undo.pop_back() else {
			trace!("Nothing to undo");
			return Ok(Commit::new());
		};

		match CommitApplier::new(&mut self.storage).apply(inverse.clone()) {
			Ok(Applied { commit, inverse }) => {
				self.to_redo.push(inverse);
				debug!(undo_left = self.to_undo.len(), "Undone;");
				Ok(commit)
			}
			Err(e) => {
				self.to_undo.push_back(inverse);
				Err(e)
			}
		}
	}

	/// Reapplies the last undone commit. Nothing to redo gives back an empty commit.
	#[instrument(skip_all, err)]
	pub fn redo(&mut self) -> Result<Commit, CommitError> {
		let Some(inverse) = self.to_redo.pop() else {
			trace!("Nothing to redo");
			return Ok(Commit::new());
		};

		match CommitApplier::new(&mut self.storage).apply(inverse.clone()) {
			Ok(Applied { commit, inverse }) => {
				self.push_undo(inverse);
				debug!(redo_left = self.to_redo.len(), "Redone;");
				Ok(commit)
			}
			Err(e) => {
				self.to_redo.push(inverse);
				Err(e)
			}
		}
	}

	fn push_undo(&mut self, inverse: Commit) {
		self.to_undo.push_back(inverse);

		if let Some(limit) = self.limit {
			while self.to_undo.len() > limit {
				self.to_undo.pop_front();
			}
		}
	}

	#[must_use]
	pub fn can_undo(&self) -> bool {
		!self.to_undo.is_empty()
	}

	#[must_use]
	pub fn can_redo(&self) -> bool {
		!self.to_redo.is_empty()
	}

	pub const fn storage(&self) -> &S {
		&self.storage
	}

	pub fn into_storage(self) -> S {
		self.storage
	}
}
