use std::sync::Arc;

use async_channel as chan;
use tokio::{spawn, task::JoinHandle};
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

use super::{
	error::RunError,
	queue::Shared,
	task::{PendingTask, TaskContext, TaskStatus},
};

pub type WorkerId = usize;

#[instrument(name = "task_system_worker", skip(shared, tickets_rx))]
pub(crate) fn spawn_worker<E: RunError>(
	worker_id: WorkerId,
	shared: Arc<Shared<E>>,
	tickets_rx: chan::Receiver<()>,
) -> JoinHandle<()> {
	spawn(
		async move {
			trace!("Worker loop starting...");
			while let Err(e) = spawn(
				run(worker_id, Arc::clone(&shared), tickets_rx.clone()).in_current_span(),
			)
			.await
			{
				if e.is_panic() {
					error!(?e, "Worker critically failed and will restart;");
				} else {
					trace!("Worker was cancelled and will exit...");
					break;
				}
			}

			info!("Worker gracefully shutdown");
		}
		.in_current_span(),
	)
}

async fn run<E: RunError>(
	worker_id: WorkerId,
	shared: Arc<Shared<E>>,
	tickets_rx: chan::Receiver<()>,
) {
	// Each ticket stands for one enqueued task, so we truly sleep here until there is work
	// and leave the loop once shutdown closes the channel
	while tickets_rx.recv().await.is_ok() {
		let Some(PendingTask { task, done_tx }) = shared.take_next(worker_id) else {
			trace!(%worker_id, "Woke up but another worker already took the task");
			continue;
		};

		let task_id = task.id();
		let ctx = TaskContext::new(task_id, worker_id, Arc::clone(&shared.pool));

		trace!(%worker_id, %task_id, "Running task");

		// Running on its own tokio task isolates panics and lets shutdown abort it
		let handle = spawn({
			let ctx = ctx.clone();
			let mut task = task;
			async move {
				let res = task.run(&ctx).await;
				(task, res)
			}
			.in_current_span()
		});

		shared.set_running(worker_id, handle.abort_handle());

		let status = match handle.await {
			Ok((mut task, Ok(()))) => {
				if shared.finish(worker_id) {
					debug!(%worker_id, %task_id, "Task left the queue empty, running its last hook");

					let hook = spawn(
						async move {
							if let Err(e) = task.run_if_last(&ctx).await {
								error!(%task_id, ?e, "Task last hook failed;");
							}
						}
						.in_current_span(),
					);

					if let Err(e) = hook.await {
						error!(%task_id, ?e, "Task last hook panicked;");
					}
				}

				TaskStatus::Done(task_id)
			}

			Ok((_task, Err(e))) => {
				shared.finish(worker_id);
				error!(%worker_id, %task_id, ?e, "Task failed;");
				TaskStatus::Error(e)
			}

			Err(e) if e.is_panic() => {
				shared.finish(worker_id);
				error!(%worker_id, %task_id, ?e, "Task panicked;");
				TaskStatus::Panicked(task_id)
			}

			Err(_) => {
				shared.finish(worker_id);
				warn!(%worker_id, %task_id, "Task was aborted by shutdown");
				TaskStatus::ForcedAbortion(task_id)
			}
		};

		if done_tx.send(status).is_err() {
			trace!(%task_id, "Task handle dropped before receiving its status");
		}
	}

	trace!(%worker_id, "Tickets channel closed, leaving worker loop");
}
