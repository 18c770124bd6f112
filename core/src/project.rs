use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use pano_task_system::{TaskHandle, TaskQueue};
use serde_json::Value as Json;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument, trace, warn};

use crate::{
	actions::{ActionError, ActionRegistry},
	commit::CommitError,
	config::ProjectConfig,
	storage::Storage,
	tasks::{import_action, ImportTask, IMPORT_ACTION},
	undo::UndoQueue,
	Commit, Error,
};

/// One open project: its storage, undo history, change feed, background task queue and the
/// actions that can be run against it.
///
/// All writes go through [`Project::do_commit`], [`Project::undo`] and [`Project::redo`], which
/// take turns on the undo queue, so storage only ever has one writer. Every applied commit is
/// then broadcast to subscribers.
pub struct Project<S> {
	dir: PathBuf,
	config: ProjectConfig,
	undo_queue: Mutex<UndoQueue<S>>,
	changes: broadcast::Sender<Commit>,
	tasks: TaskQueue<Error>,
	actions: ActionRegistry,
}

impl<S: Storage> Project<S> {
	/// Opens the project stored in `dir` on top of `storage`, loading or creating its config.
	///
	/// Must be called from within a tokio runtime, as it starts the task queue workers.
	#[instrument(skip_all, fields(dir = %dir.as_ref().display()), err)]
	pub async fn open(dir: impl AsRef<Path>, storage: S) -> Result<Self, Error> {
		let dir = dir.as_ref().to_path_buf();
		let config = ProjectConfig::load_from(&dir).await?;

		let (changes, _) = broadcast::channel(config.change_feed_capacity.max(1));
		let tasks = TaskQueue::new(config.task_queue_config());

		let mut actions = ActionRegistry::new();
		actions.register(import_action())?;

		info!(
			workers = config.task_workers,
			undo_limit = ?config.undo_limit,
			"Project opened;"
		);

		Ok(Self {
			undo_queue: Mutex::new(UndoQueue::with_limit(storage, config.undo_limit)),
			dir,
			config,
			changes,
			tasks,
			actions,
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub const fn config(&self) -> &ProjectConfig {
		&self.config
	}

	/// Applies `commit` and broadcasts it, as written, to every subscriber
	pub async fn do_commit(&self, commit: Commit) -> Result<Commit, CommitError> {
		let applied = self.undo_queue.lock().await.do_commit(commit)?;
		self.broadcast(&applied);

		Ok(applied)
	}

	pub async fn undo(&self) -> Result<Commit, CommitError> {
		let applied = self.undo_queue.lock().await.undo()?;
		self.broadcast(&applied);

		Ok(applied)
	}

	pub async fn redo(&self) -> Result<Commit, CommitError> {
		let applied = self.undo_queue.lock().await.redo()?;
		self.broadcast(&applied);

		Ok(applied)
	}

	fn broadcast(&self, applied: &Commit) {
		if applied.is_empty() {
			return;
		}

		// No subscriber is not an error
		if self.changes.send(applied.clone()).is_err() {
			trace!("Commit applied without any change feed subscriber");
		}
	}

	/// Receives every commit applied from now on
	pub fn subscribe(&self) -> broadcast::Receiver<Commit> {
		self.changes.subscribe()
	}

	/// Runs `f` against storage, waiting for any write in progress to finish
	pub async fn read<T>(&self, f: impl FnOnce(&S) -> T) -> T {
		f(self.undo_queue.lock().await.storage())
	}

	pub async fn can_undo(&self) -> bool {
		self.undo_queue.lock().await.can_undo()
	}

	pub async fn can_redo(&self) -> bool {
		self.undo_queue.lock().await.can_redo()
	}

	pub const fn tasks(&self) -> &TaskQueue<Error> {
		&self.tasks
	}

	/// Actions this project can run, with their declared parameters
	pub const fn actions(&self) -> &ActionRegistry {
		&self.actions
	}

	/// Stops the task queue, tasks not started yet are handed back through their handles
	pub async fn shutdown(&self) {
		self.tasks.shutdown().await;
		info!(dir = %self.dir.display(), "Project closed;");
	}
}

impl<S: Storage + 'static> Project<S> {
	/// Checks `args` against the declared parameters of action `id` and dispatches the task
	/// running it
	#[instrument(skip(self, args), err)]
	pub async fn run_action(
		self: &Arc<Self>,
		id: &str,
		args: Json,
	) -> Result<TaskHandle<Error>, Error> {
		let bound = self.actions.bind(id, args)?;

		let task = match id {
			IMPORT_ACTION => ImportTask::from_args(Arc::clone(self), &bound)?,
			_ => return Err(ActionError::NotFound(id.to_string()).into()),
		};

		self.tasks.dispatch(task).await.map_err(|e| {
			warn!(dropped = e.0.len(), "Action dispatched after shutdown;");
			Error::QueueShutdown
		})
	}
}
