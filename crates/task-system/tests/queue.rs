use pano_task_system::{DispatcherShutdownError, TaskQueue, TaskQueueConfig, TaskStatus};

use std::sync::atomic::Ordering;

use rand::Rng;
use tracing_test::traced_test;

mod common;

use common::tasks::{
	CountingPool, FailingTask, GateTask, Journal, NeverTask, OffloadTask, PanicTask, ReadyTask,
	SampleError,
};

fn queue_with(workers: usize) -> TaskQueue<SampleError> {
	TaskQueue::new(TaskQueueConfig { workers })
}

#[tokio::test]
#[traced_test]
async fn done_test() {
	let queue = queue_with(1);
	let journal = Journal::default();

	let handle = queue
		.dispatch(ReadyTask::new("ready", &journal))
		.await
		.unwrap();

	let task_id = handle.task_id();
	assert!(matches!(handle.await, TaskStatus::Done(id) if id == task_id));
	assert_eq!(journal.order(), vec!["ready"]);

	queue.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[traced_test]
async fn last_hook_fires_once_for_a_batch() {
	let queue = queue_with(2);
	let journal = Journal::default();

	let handles = queue
		.dispatch_many(
			["a", "b", "c", "d", "e"]
				.into_iter()
				.map(|label| ReadyTask::new(label, &journal))
				.collect(),
		)
		.await
		.unwrap();

	for handle in handles {
		assert!(matches!(handle.await, TaskStatus::Done(_)));
	}

	assert_eq!(journal.order().len(), 5);
	assert_eq!(journal.last_hooks(), 1);

	queue.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn priority_tasks_run_first() {
	let queue = queue_with(1);
	let journal = Journal::default();

	let (gate, started, open) = GateTask::new(&journal);
	let gate_handle = queue.dispatch(gate).await.unwrap();
	started.notified().await;

	let normal = queue.dispatch(ReadyTask::new("n", &journal)).await.unwrap();
	let first = queue
		.dispatch(ReadyTask::with_priority("p1", &journal))
		.await
		.unwrap();
	let second = queue
		.dispatch(ReadyTask::with_priority("p2", &journal))
		.await
		.unwrap();

	assert_eq!(queue.pending_count(), 3);
	assert_eq!(queue.active_workers(), 1);

	open.notify_one();

	for handle in [gate_handle, normal, first, second] {
		assert!(matches!(handle.await, TaskStatus::Done(_)));
	}

	assert_eq!(journal.order(), vec!["gate", "p1", "p2", "n"]);

	queue.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn failing_task_does_not_stop_the_worker() {
	let queue = queue_with(1);
	let journal = Journal::default();

	let failing = queue.dispatch(FailingTask::new(&journal)).await.unwrap();
	let ready = queue
		.dispatch(ReadyTask::new("after", &journal))
		.await
		.unwrap();

	assert!(matches!(
		failing.await,
		TaskStatus::Error(SampleError::SampleError)
	));
	assert!(matches!(ready.await, TaskStatus::Done(_)));

	assert_eq!(journal.order(), vec!["failing", "after"]);
	// Only the successful task can be the last one out
	assert_eq!(journal.last_hooks(), 1);
	assert!(logs_contain("Task failed"));

	queue.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn failing_last_task_skips_the_hook() {
	let queue = queue_with(1);
	let journal = Journal::default();

	let failing = queue.dispatch(FailingTask::new(&journal)).await.unwrap();

	assert!(matches!(failing.await, TaskStatus::Error(_)));
	assert_eq!(journal.last_hooks(), 0);

	queue.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn panicking_task_is_isolated() {
	let queue = queue_with(1);
	let journal = Journal::default();

	let panicking = queue.dispatch(PanicTask::new()).await.unwrap();
	let task_id = panicking.task_id();
	assert!(matches!(panicking.await, TaskStatus::Panicked(id) if id == task_id));

	let ready = queue
		.dispatch(ReadyTask::new("survivor", &journal))
		.await
		.unwrap();
	assert!(matches!(ready.await, TaskStatus::Done(_)));
	assert_eq!(journal.order(), vec!["survivor"]);

	queue.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn offloaded_job_result_reaches_the_task() {
	let queue = queue_with(1);

	let (task, sum) = OffloadTask::new(100);
	let handle = queue.dispatch(task).await.unwrap();

	assert!(matches!(handle.await, TaskStatus::Done(_)));
	assert_eq!(sum.load(Ordering::SeqCst), 5050);

	queue.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn offloaded_jobs_go_to_the_injected_pool() {
	let pool = CountingPool::default();
	let queue = TaskQueue::<SampleError>::with_pool(TaskQueueConfig { workers: 2 }, pool.clone());

	let mut sums = Vec::new();
	let mut handles = Vec::new();
	for upto in [10, 20, 30] {
		let (task, sum) = OffloadTask::new(upto);
		sums.push(sum);
		handles.push(queue.dispatch(task).await.unwrap());
	}

	for handle in handles {
		assert!(matches!(handle.await, TaskStatus::Done(_)));
	}

	assert_eq!(pool.executed.load(Ordering::SeqCst), 3);
	assert_eq!(
		sums.iter()
			.map(|sum| sum.load(Ordering::SeqCst))
			.collect::<Vec<_>>(),
		vec![55, 210, 465]
	);

	queue.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn shutdown_gives_back_pending_tasks() {
	let queue = queue_with(1);
	let journal = Journal::default();

	let (never, started) = NeverTask::new();
	let never_handle = queue.dispatch(never).await.unwrap();
	started.notified().await;

	let pending_handle = queue
		.dispatch(ReadyTask::new("pending", &journal))
		.await
		.unwrap();

	queue.shutdown().await;

	assert!(matches!(never_handle.await, TaskStatus::ForcedAbortion(_)));

	match pending_handle.await {
		TaskStatus::Shutdown(task) => assert!(task.downcast_ref::<ReadyTask>().is_some()),
		other => panic!("expected the pending task back, got {other:?}"),
	}

	assert!(journal.order().is_empty());

	let Err(DispatcherShutdownError(tasks)) = queue
		.dispatch(ReadyTask::new("too late", &journal))
		.await
	else {
		panic!("dispatching after shutdown must fail");
	};
	assert_eq!(tasks.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn every_task_eventually_runs() {
	let queue = queue_with(4);
	let journal = Journal::default();

	let mut rng = rand::thread_rng();

	let tasks = (0..200)
		.map(|_| {
			if rng.gen_bool(0.2) {
				ReadyTask::with_priority("p", &journal)
			} else {
				ReadyTask::new("n", &journal)
			}
		})
		.collect::<Vec<_>>();

	let handles = queue.dispatch_many(tasks).await.unwrap();

	for handle in handles {
		assert!(matches!(handle.await, TaskStatus::Done(_)));
	}

	assert_eq!(journal.order().len(), 200);
	assert_eq!(journal.last_hooks(), 1);
	assert_eq!(queue.pending_count(), 0);

	queue.shutdown().await;
}
