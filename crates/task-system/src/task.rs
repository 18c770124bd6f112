use std::{
	fmt,
	future::Future,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};

use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use tokio::sync::oneshot;
use tracing::{trace, warn};
use uuid::Uuid;

use super::{
	error::{RunError, SystemError},
	pool::ExecutionPool,
	worker::WorkerId,
};

/// A unique identifier for a task using the [`uuid`](https://docs.rs/uuid) crate.
pub type TaskId = Uuid;

/// An enum representing all possible outcomes for a task.
#[derive(Debug)]
pub enum TaskStatus<E: RunError> {
	/// The task has finished successfully, its `run_if_last` hook (if it was the last one) already ran.
	Done(TaskId),
	/// The task returned an error, it was logged and we return it back so the user can handle it.
	Error(E),
	/// The task panicked while running, the worker that ran it kept going.
	Panicked(TaskId),
	/// The task was running when the task system got shutdown and was aborted.
	ForcedAbortion(TaskId),
	/// The task system was shutdown before the task started, we give back the task to the user so
	/// they can downcast it back to the original concrete type and re-dispatch it later.
	Shutdown(Box<dyn Task<E>>),
}

/// A helper trait to convert any type that implements [`Task<E>`] into a [`Box<dyn Task<E>>`], boxing it.
pub trait IntoTask<E>: Send {
	fn into_task(self) -> Box<dyn Task<E>>;
}

/// Blanket implementation for all types that implements [`Task<E>`] and `'static`
impl<T: Task<E> + 'static, E: RunError> IntoTask<E> for T {
	fn into_task(self) -> Box<dyn Task<E>> {
		Box::new(self)
	}
}

/// The main trait that represents a task that can be dispatched to the task system.
///
/// All tasks in the task system must return the same generic error type, so we can have a unified
/// error handling.
///
/// We're currently using the [`async_trait`](https://docs.rs/async-trait) crate to allow dyn async traits,
/// due to a limitation in the Rust language.
#[async_trait]
pub trait Task<E: RunError>: Downcast + Send + Sync + 'static {
	/// An unique identifier for the task, it will be used to identify the task on the system and also to the user.
	fn id(&self) -> TaskId;

	/// Whether this task goes to the priority queue. Workers always pick priority tasks before
	/// normal ones, useful for work the user is actively waiting for. Fixed for the task lifetime.
	fn with_priority(&self) -> bool {
		false
	}

	/// The work itself. CPU bound steps should be handed to [`TaskContext::offload`] so the worker
	/// can keep the scheduling loop responsive while they run.
	async fn run(&mut self, ctx: &TaskContext) -> Result<(), E>;

	/// Called only on the task that, upon its successful completion, left both queues empty and no
	/// other worker busy. Useful to finalize a batch, like rebuilding a derived index after the
	/// last item got imported.
	async fn run_if_last(&mut self, _ctx: &TaskContext) -> Result<(), E> {
		Ok(())
	}
}

impl_downcast!(Task<E> where E: RunError);

impl<E: RunError> fmt::Debug for Box<dyn Task<E>> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<Task id='{}'>", self.id())
	}
}

/// What a running task can see from the system: which worker runs it and where to offload
/// CPU bound work.
#[derive(Clone)]
pub struct TaskContext {
	task_id: TaskId,
	worker_id: WorkerId,
	pool: Arc<dyn ExecutionPool>,
}

impl fmt::Debug for TaskContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskContext")
			.field("task_id", &self.task_id)
			.field("worker_id", &self.worker_id)
			.finish_non_exhaustive()
	}
}

impl TaskContext {
	pub(crate) fn new(task_id: TaskId, worker_id: WorkerId, pool: Arc<dyn ExecutionPool>) -> Self {
		Self {
			task_id,
			worker_id,
			pool,
		}
	}

	#[must_use]
	pub const fn task_id(&self) -> TaskId {
		self.task_id
	}

	#[must_use]
	pub const fn worker_id(&self) -> WorkerId {
		self.worker_id
	}

	/// Runs `job` on the execution pool, suspending the current task until it completes.
	pub async fn offload<F, T>(&self, job: F) -> Result<T, SystemError>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let task_id = self.task_id;

		trace!(%task_id, worker_id = self.worker_id, "Offloading job to execution pool");

		self.pool
			.execute(Box::new(move || {
				if tx.send(job()).is_err() {
					warn!(%task_id, "Task stopped waiting for its offloaded job");
				}
			}))
			.await?;

		rx.await
			.map_err(|_| SystemError::MissingPoolResult(task_id))
	}
}

/// A handle returned when a task is dispatched to the task system, it can be awaited until the task
/// gets completed.
#[derive(Debug)]
pub struct TaskHandle<E: RunError> {
	pub(crate) task_id: TaskId,
	pub(crate) done_rx: oneshot::Receiver<TaskStatus<E>>,
}

impl<E: RunError> TaskHandle<E> {
	/// Get the unique identifier of the task
	#[must_use]
	pub const fn task_id(&self) -> TaskId {
		self.task_id
	}
}

impl<E: RunError> Future for TaskHandle<E> {
	type Output = TaskStatus<E>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let task_id = self.task_id;

		// The sender only gets dropped without a message when the worker was torn down mid-task
		Pin::new(&mut self.done_rx)
			.poll(cx)
			.map(|res| res.unwrap_or(TaskStatus::ForcedAbortion(task_id)))
	}
}

pub(crate) struct PendingTask<E: RunError> {
	pub(crate) task: Box<dyn Task<E>>,
	pub(crate) done_tx: oneshot::Sender<TaskStatus<E>>,
}

impl<E: RunError> PendingTask<E> {
	pub(crate) fn new(task: Box<dyn Task<E>>) -> (Self, TaskHandle<E>) {
		let (done_tx, done_rx) = oneshot::channel();
		let task_id = task.id();

		(
			Self { task, done_tx },
			TaskHandle { task_id, done_rx },
		)
	}

	pub(crate) fn send_back(self) {
		let task_id = self.task.id();

		if self.done_tx.send(TaskStatus::Shutdown(self.task)).is_err() {
			trace!(%task_id, "Task handle dropped before receiving shutdown status");
		}
	}
}
