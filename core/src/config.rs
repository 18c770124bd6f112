//! Project configuration

use std::path::{Path, PathBuf};

use pano_task_system::TaskQueueConfig;
use pano_utils::error::FileIOError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "pano.json";

const CONFIG_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("invalid project config <path='{}'>: {source}", .path.display())]
	Deserialize {
		path: PathBuf,
		source: serde_json::Error,
	},
	#[error("failed to serialize project config: {0}")]
	Serialize(#[source] serde_json::Error),
}

/// Configuration of one open project, stored as `pano.json` in the project directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
	/// Config schema version
	pub version: u32,

	/// Background workers pulling from the task queue
	#[serde(default = "default_task_workers")]
	pub task_workers: usize,

	/// Steps kept on the undo stack, `None` for unlimited
	#[serde(default = "default_undo_limit")]
	pub undo_limit: Option<usize>,

	/// Commits buffered for each change feed subscriber before it starts lagging
	#[serde(default = "default_change_feed_capacity")]
	pub change_feed_capacity: usize,
}

fn default_task_workers() -> usize {
	TaskQueueConfig::default().workers
}

#[allow(clippy::unnecessary_wraps)]
const fn default_undo_limit() -> Option<usize> {
	Some(200)
}

const fn default_change_feed_capacity() -> usize {
	1024
}

impl Default for ProjectConfig {
	fn default() -> Self {
		Self {
			version: CONFIG_VERSION,
			task_workers: default_task_workers(),
			undo_limit: default_undo_limit(),
			change_feed_capacity: default_change_feed_capacity(),
		}
	}
}

impl ProjectConfig {
	/// Loads the config from `project_dir`, creating a default one if there is none yet
	pub async fn load_from(project_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = project_dir.as_ref().join(CONFIG_FILE_NAME);

		match fs::read(&path).await {
			Ok(bytes) => {
				let mut config = serde_json::from_slice::<Self>(&bytes)
					.map_err(|source| ConfigError::Deserialize {
						path: path.clone(),
						source,
					})?;

				if config.version < CONFIG_VERSION {
					info!(
						from = config.version,
						to = CONFIG_VERSION,
						"Migrating project config;"
					);
					config.version = CONFIG_VERSION;
					config.save(project_dir).await?;
				}

				Ok(config)
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				warn!(path = %path.display(), "No project config found, creating default;");
				let config = Self::default();
				config.save(project_dir).await?;
				Ok(config)
			}
			Err(e) => Err(FileIOError::from((path, e, "Failed to read project config")).into()),
		}
	}

	pub async fn save(&self, project_dir: impl AsRef<Path>) -> Result<(), ConfigError> {
		let project_dir = project_dir.as_ref();

		fs::create_dir_all(project_dir)
			.await
			.map_err(|e| FileIOError::from((project_dir, e)))?;

		let path = project_dir.join(CONFIG_FILE_NAME);
		let json = serde_json::to_vec_pretty(self).map_err(ConfigError::Serialize)?;

		fs::write(&path, json)
			.await
			.map_err(|e| FileIOError::from((&path, e, "Failed to save project config")))?;

		Ok(())
	}

	#[must_use]
	pub fn task_queue_config(&self) -> TaskQueueConfig {
		TaskQueueConfig {
			workers: self.task_workers.max(1),
		}
	}
}
