use crate::{
	actions::{ActionDescriptor, ActionError, BoundArgs, ParamDescriptor, ParamKind},
	model::{FolderId, Instance, InstanceId},
	storage::Storage,
	Commit, Error, Project,
};

use pano_task_system::{Task, TaskContext, TaskId};
use pano_utils::error::FileIOError;

use std::{path::PathBuf, sync::Arc, time::Instant};

use tokio::{fs, sync::Notify};
use tracing::{info, instrument, trace, Level};

pub const IMPORT_ACTION: &str = "import";

/// Parameters of the [`IMPORT_ACTION`] every project offers
#[must_use]
pub fn import_action() -> ActionDescriptor {
	ActionDescriptor {
		id: IMPORT_ACTION.to_string(),
		description: "Imports a media file into a folder".to_string(),
		params: vec![
			ParamDescriptor::required("path", ParamKind::Path),
			ParamDescriptor::required("folder_id", ParamKind::Int),
			ParamDescriptor::optional("prioritized", ParamKind::Bool, false),
		],
	}
}

/// Imports one media file: hashes its content on the execution pool and creates its
/// [`Instance`] through the project's undo queue
pub struct ImportTask<S> {
	// Task control
	id: TaskId,
	with_priority: bool,

	// Received input args
	path: PathBuf,
	folder_id: FolderId,

	// Dependencies
	project: Arc<Project<S>>,
	batch_done: Option<Arc<Notify>>,

	// Output
	imported: Option<InstanceId>,
}

impl<S: Storage + 'static> ImportTask<S> {
	#[must_use]
	pub fn new(project: Arc<Project<S>>, path: impl Into<PathBuf>, folder_id: FolderId) -> Self {
		Self {
			id: TaskId::new_v4(),
			with_priority: false,
			path: path.into(),
			folder_id,
			project,
			batch_done: None,
			imported: None,
		}
	}

	/// Builds the task from arguments bound against [`import_action`]
	pub fn from_args(project: Arc<Project<S>>, args: &BoundArgs) -> Result<Self, ActionError> {
		let task = Self::new(project, args.str("path")?, args.int("folder_id")?);

		Ok(if args.bool("prioritized")? {
			task.prioritized()
		} else {
			task
		})
	}

	/// Imports requested directly by the user jump ahead of background batches
	#[must_use]
	pub const fn prioritized(mut self) -> Self {
		self.with_priority = true;
		self
	}

	/// `notify` is signaled when the task finishing a batch completes
	#[must_use]
	pub fn notify_batch_done(mut self, notify: Arc<Notify>) -> Self {
		self.batch_done = Some(notify);
		self
	}

	/// Permanent id of the imported instance, once the task ran
	#[must_use]
	pub const fn imported(&self) -> Option<InstanceId> {
		self.imported
	}
}

#[async_trait::async_trait]
impl<S: Storage + 'static> Task<Error> for ImportTask<S> {
	fn id(&self) -> TaskId {
		self.id
	}

	fn with_priority(&self) -> bool {
		self.with_priority
	}

	#[instrument(
		skip_all,
		fields(task_id = %self.id, path = %self.path.display(), folder_id = self.folder_id),
		ret(level = Level::TRACE),
		err,
	)]
	#[allow(clippy::blocks_in_conditions)] // Due to `err` on `instrument` macro above
	async fn run(&mut self, ctx: &TaskContext) -> Result<(), Error> {
		let start_time = Instant::now();

		let name = self
			.path
			.file_stem()
			.ok_or_else(|| Error::MissingFileName(self.path.as_path().into()))?
			.to_string_lossy()
			.into_owned();
		let extension = self
			.path
			.extension()
			.map(|extension| extension.to_string_lossy().to_lowercase())
			.unwrap_or_default();

		let bytes = fs::read(&self.path)
			.await
			.map_err(|e| FileIOError::from((&self.path, e, "Failed to read media file")))?;

		let content_hash = ctx
			.offload(move || blake3::hash(&bytes).to_hex().to_string())
			.await?;

		let applied = self
			.project
			.do_commit(Commit::new().with_instances([Instance {
				id: -1,
				folder_id: self.folder_id,
				name,
				extension,
				content_hash,
				url: None,
				width: None,
				height: None,
				phash: None,
			}]))
			.await?;

		self.imported = applied.instances.first().map(|instance| instance.id);

		trace!(
			instance_id = ?self.imported,
			elapsed = ?start_time.elapsed(),
			"Imported media file;"
		);

		Ok(())
	}

	async fn run_if_last(&mut self, ctx: &TaskContext) -> Result<(), Error> {
		info!(task_id = %ctx.task_id(), "Import batch finished;");

		if let Some(notify) = &self.batch_done {
			notify.notify_one();
		}

		Ok(())
	}
}
