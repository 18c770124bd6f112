use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::{sync::Semaphore, task::spawn_blocking};
use tracing::trace;

use super::error::SystemError;

/// A unit of CPU bound work handed to an [`ExecutionPool`]
pub type PoolJob = Box<dyn FnOnce() + Send + 'static>;

/// Where tasks offload their CPU bound steps (decoding, hashing, vector extraction).
///
/// The task system only needs "submit work, await its completion" semantics, so implementors are
/// free to back it with a thread pool, a process pool or anything else.
#[async_trait]
pub trait ExecutionPool: Send + Sync + 'static {
	async fn execute(&self, job: PoolJob) -> Result<(), SystemError>;
}

/// Default [`ExecutionPool`] backed by tokio's blocking thread pool, optionally capping how many
/// jobs run at the same time.
#[derive(Clone, Default)]
pub struct BlockingPool {
	permits: Option<Arc<Semaphore>>,
}

impl fmt::Debug for BlockingPool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BlockingPool")
			.field(
				"available_permits",
				&self.permits.as_ref().map(|p| p.available_permits()),
			)
			.finish()
	}
}

impl BlockingPool {
	/// A pool that never runs more than `max_concurrent_jobs` jobs at once
	#[must_use]
	pub fn with_limit(max_concurrent_jobs: usize) -> Self {
		Self {
			permits: Some(Arc::new(Semaphore::new(max_concurrent_jobs.max(1)))),
		}
	}
}

#[async_trait]
impl ExecutionPool for BlockingPool {
	async fn execute(&self, job: PoolJob) -> Result<(), SystemError> {
		let _permit = match &self.permits {
			Some(permits) => Some(
				Arc::clone(permits)
					.acquire_owned()
					.await
					.map_err(|e| SystemError::ExecutionPool(e.to_string()))?,
			),
			None => None,
		};

		trace!("Running job on blocking pool");

		spawn_blocking(job).await.map_err(|e| {
			if e.is_panic() {
				SystemError::ExecutionPoolPanic
			} else {
				SystemError::ExecutionPool(e.to_string())
			}
		})
	}
}
