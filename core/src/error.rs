use pano_task_system::SystemError;
use pano_utils::error::FileIOError;
use thiserror::Error;

use crate::{actions::ActionError, commit::CommitError, config::ConfigError};

/// Every error a project operation or one of its background tasks can end with
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Commit(#[from] CommitError),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Action(#[from] ActionError),
	#[error(transparent)]
	TaskSystem(#[from] SystemError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("task queue is shut down")]
	QueueShutdown,
	#[error("path has no file name <path='{}'>", .0.display())]
	MissingFileName(Box<std::path::Path>),
}
