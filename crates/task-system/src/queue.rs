use std::{
	collections::VecDeque,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_channel as chan;
use futures_concurrency::future::Join;
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, instrument, trace, warn};

use super::{
	error::{DispatcherShutdownError, RunError},
	pool::{BlockingPool, ExecutionPool},
	task::{IntoTask, PendingTask, TaskHandle},
	worker::{self, WorkerId},
};

/// Task queue settings, usually read from the project configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQueueConfig {
	pub workers: usize,
}

impl Default for TaskQueueConfig {
	fn default() -> Self {
		let workers = std::thread::available_parallelism().map_or_else(
			|e| {
				error!("Failed to get available parallelism in the task system: {e:#?}");
				1
			},
			|non_zero| non_zero.get(),
		);

		Self { workers }
	}
}

pub(crate) struct Queues<E: RunError> {
	priority: VecDeque<PendingTask<E>>,
	normal: VecDeque<PendingTask<E>>,
	working: Vec<bool>,
	running: Vec<Option<AbortHandle>>,
	is_shutdown: bool,
}

impl<E: RunError> Queues<E> {
	fn is_empty(&self) -> bool {
		self.priority.is_empty() && self.normal.is_empty()
	}
}

pub(crate) struct Shared<E: RunError> {
	queues: Mutex<Queues<E>>,
	tickets_tx: chan::Sender<()>,
	pub(crate) pool: Arc<dyn ExecutionPool>,
}

impl<E: RunError> Shared<E> {
	fn lock(&self) -> MutexGuard<'_, Queues<E>> {
		// A panic never happens while holding this lock, but if it somehow did the queues are
		// still structurally sound, so we keep going with them
		self.queues.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Pops the next task preferring the priority queue, marking the worker as busy in the same
	/// critical section
	pub(crate) fn take_next(&self, worker_id: WorkerId) -> Option<PendingTask<E>> {
		let mut queues = self.lock();

		let next = queues
			.priority
			.pop_front()
			.or_else(|| queues.normal.pop_front());

		if next.is_some() {
			queues.working[worker_id] = true;
		}

		next
	}

	/// Registers the running task so shutdown can abort it, aborting it right away if shutdown
	/// already happened since the task got picked
	pub(crate) fn set_running(&self, worker_id: WorkerId, abort_handle: AbortHandle) {
		let mut queues = self.lock();

		if queues.is_shutdown {
			abort_handle.abort();
		} else {
			queues.running[worker_id] = Some(abort_handle);
		}
	}

	/// Marks the worker idle and tells whether it was the last one out: nothing left queued and no
	/// other worker busy. Both things are decided under the same lock, so between two workers
	/// finishing at the same time exactly one of them sees itself as last.
	pub(crate) fn finish(&self, worker_id: WorkerId) -> bool {
		let mut queues = self.lock();

		queues.working[worker_id] = false;
		queues.running[worker_id] = None;

		!queues.is_shutdown && queues.is_empty() && queues.working.iter().all(|busy| !busy)
	}
}

/// A cheap cloneable handle to enqueue tasks on a [`TaskQueue`] from anywhere, including from
/// inside other tasks.
pub struct TaskDispatcher<E: RunError> {
	shared: Arc<Shared<E>>,
}

impl<E: RunError> Clone for TaskDispatcher<E> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<E: RunError> TaskDispatcher<E> {
	pub async fn dispatch(
		&self,
		into_task: impl IntoTask<E>,
	) -> Result<TaskHandle<E>, DispatcherShutdownError<E>> {
		self.dispatch_many(vec![into_task])
			.await
			.map(|mut handles| handles.remove(0))
	}

	/// Enqueues all tasks at once, no worker will see a partially enqueued batch
	pub async fn dispatch_many(
		&self,
		into_tasks: Vec<impl IntoTask<E>>,
	) -> Result<Vec<TaskHandle<E>>, DispatcherShutdownError<E>> {
		let tasks = into_tasks
			.into_iter()
			.map(IntoTask::into_task)
			.collect::<Vec<_>>();

		let handles = {
			let mut queues = self.shared.lock();

			if queues.is_shutdown {
				return Err(DispatcherShutdownError(tasks));
			}

			tasks
				.into_iter()
				.map(|task| {
					let with_priority = task.with_priority();
					let (pending, handle) = PendingTask::new(task);

					trace!(task_id = %handle.task_id(), %with_priority, "Enqueueing task");

					if with_priority {
						queues.priority.push_back(pending);
					} else {
						queues.normal.push_back(pending);
					}

					handle
				})
				.collect::<Vec<_>>()
		};

		for _ in 0..handles.len() {
			if self.shared.tickets_tx.send(()).await.is_err() {
				// Shutdown closed the channel after we enqueued, the tasks were given back
				// through their handles by the shutdown routine
				warn!("Task queue closed while dispatching tasks");
				break;
			}
		}

		Ok(handles)
	}

	/// How many tasks are waiting for a worker
	#[must_use]
	pub fn pending_count(&self) -> usize {
		let queues = self.shared.lock();
		queues.priority.len() + queues.normal.len()
	}

	/// How many workers are currently running a task
	#[must_use]
	pub fn active_workers(&self) -> usize {
		self.shared
			.lock()
			.working
			.iter()
			.filter(|busy| **busy)
			.count()
	}
}

/// A fixed pool of workers draining a priority queue and a normal queue.
pub struct TaskQueue<E: RunError> {
	dispatcher: TaskDispatcher<E>,
	workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<E: RunError> TaskQueue<E> {
	/// Creates the queue and spawns its workers, offloading jobs to a default [`BlockingPool`].
	///
	/// # Panics
	///
	/// Must be called from within a tokio runtime.
	#[must_use]
	pub fn new(config: TaskQueueConfig) -> Self {
		Self::with_pool(config, BlockingPool::default())
	}

	#[must_use]
	pub fn with_pool(config: TaskQueueConfig, pool: impl ExecutionPool) -> Self {
		let workers_count = config.workers.max(1);

		let (tickets_tx, tickets_rx) = chan::unbounded();

		let shared = Arc::new(Shared {
			queues: Mutex::new(Queues {
				priority: VecDeque::new(),
				normal: VecDeque::new(),
				working: vec![false; workers_count],
				running: (0..workers_count).map(|_| None).collect(),
				is_shutdown: false,
			}),
			tickets_tx,
			pool: Arc::new(pool),
		});

		let workers = (0..workers_count)
			.map(|id| worker::spawn_worker(id, Arc::clone(&shared), tickets_rx.clone()))
			.collect();

		info!(%workers_count, "Task queue started");

		Self {
			dispatcher: TaskDispatcher { shared },
			workers: Mutex::new(workers),
		}
	}

	pub async fn dispatch(
		&self,
		into_task: impl IntoTask<E>,
	) -> Result<TaskHandle<E>, DispatcherShutdownError<E>> {
		self.dispatcher.dispatch(into_task).await
	}

	pub async fn dispatch_many(
		&self,
		into_tasks: Vec<impl IntoTask<E>>,
	) -> Result<Vec<TaskHandle<E>>, DispatcherShutdownError<E>> {
		self.dispatcher.dispatch_many(into_tasks).await
	}

	#[must_use]
	pub fn get_dispatcher(&self) -> TaskDispatcher<E> {
		self.dispatcher.clone()
	}

	#[must_use]
	pub fn pending_count(&self) -> usize {
		self.dispatcher.pending_count()
	}

	#[must_use]
	pub fn active_workers(&self) -> usize {
		self.dispatcher.active_workers()
	}

	/// Stops every worker loop. Tasks still queued are given back through their handles as
	/// [`TaskStatus::Shutdown`](crate::TaskStatus::Shutdown), running tasks are aborted.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let workers = std::mem::take(
			&mut *self
				.workers
				.lock()
				.unwrap_or_else(PoisonError::into_inner),
		);

		if workers.is_empty() {
			warn!("Trying to shutdown the task queue that was already shutdown");
			return;
		}

		let shared = &self.dispatcher.shared;

		let (pending, running) = {
			let mut guard = shared.lock();
			let queues = &mut *guard;
			queues.is_shutdown = true;

			let pending = queues
				.priority
				.drain(..)
				.chain(queues.normal.drain(..))
				.collect::<Vec<_>>();

			let running = queues
				.running
				.iter_mut()
				.filter_map(Option::take)
				.collect::<Vec<_>>();

			(pending, running)
		};

		shared.tickets_tx.close();

		debug!(
			pending_count = pending.len(),
			running_count = running.len(),
			"Giving back pending tasks and aborting running ones"
		);

		pending.into_iter().for_each(PendingTask::send_back);
		running.iter().for_each(AbortHandle::abort);

		workers
			.into_iter()
			.map(|handle| async move {
				if let Err(e) = handle.await {
					if e.is_panic() {
						error!(?e, "Worker critically failed while shutting down");
					}
				}
			})
			.collect::<Vec<_>>()
			.join()
			.await;

		info!("Task queue gracefully shutdown");
	}
}
