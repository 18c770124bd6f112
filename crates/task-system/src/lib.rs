//!
//! # Task System
//!
//! Pano's Task System runs background work (importing media, hashing, deriving vectors) without
//! blocking the rest of the application.
//!
//! Just bring your own unified error type and dispatch some tasks, the system will handle enqueueing,
//! scheduling and error handling for you:
//! - A fixed pool of cooperative workers pulling from a priority queue and a normal queue;
//! - Priority tasks are always picked before normal ones by any worker choosing new work;
//! - CPU bound steps are offloaded to an injected [`ExecutionPool`] so workers never block;
//! - A task failing or panicking is logged and never tears its worker down;
//! - The task that leaves the system empty gets its [`Task::run_if_last`] hook called, once;
//! - When the system is shutdown, all pending tasks are given back through their handles.
//!
//!
//! ## Basic example
//!
//! ```
//! use pano_task_system::{Task, TaskContext, TaskId, TaskQueue, TaskQueueConfig, TaskStatus};
//! use async_trait::async_trait;
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum SampleError {
//!     #[error("Sample error")]
//!     SampleError,
//! }
//!
//! #[derive(Debug)]
//! pub struct ReadyTask {
//!     id: TaskId,
//! }
//!
//! #[async_trait]
//! impl Task<SampleError> for ReadyTask {
//!     fn id(&self) -> TaskId {
//!         self.id
//!     }
//!
//!     async fn run(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = TaskQueue::new(TaskQueueConfig::default());
//!
//!     let handle = queue
//!         .dispatch(ReadyTask { id: TaskId::new_v4() })
//!         .await
//!         .unwrap();
//!
//!     assert!(matches!(handle.await, TaskStatus::Done(_)));
//!
//!     queue.shutdown().await;
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;
mod pool;
mod queue;
mod task;
mod worker;

pub use error::{DispatcherShutdownError, RunError, SystemError};
pub use pool::{BlockingPool, ExecutionPool, PoolJob};
pub use queue::{TaskDispatcher, TaskQueue, TaskQueueConfig};
pub use task::{IntoTask, Task, TaskContext, TaskHandle, TaskId, TaskStatus};
pub use worker::WorkerId;
