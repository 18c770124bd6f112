#![allow(dead_code)]

use std::{
	future::pending,
	sync::{
		atomic::{AtomicU64, AtomicUsize, Ordering},
		Arc, Mutex,
	},
};

use pano_task_system::{ExecutionPool, PoolJob, SystemError, Task, TaskContext, TaskId};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::info;

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("sample error")]
	SampleError,
	#[error(transparent)]
	System(#[from] pano_task_system::SystemError),
}

/// Shared bookkeeping so tests can observe what the workers did
#[derive(Debug, Default, Clone)]
pub struct Journal {
	pub ran: Arc<Mutex<Vec<&'static str>>>,
	pub last_hooks: Arc<AtomicUsize>,
}

impl Journal {
	pub fn record(&self, label: &'static str) {
		self.ran.lock().expect("journal lock").push(label);
	}

	pub fn order(&self) -> Vec<&'static str> {
		self.ran.lock().expect("journal lock").clone()
	}

	pub fn last_hooks(&self) -> usize {
		self.last_hooks.load(Ordering::SeqCst)
	}
}

#[derive(Debug)]
pub struct ReadyTask {
	id: TaskId,
	label: &'static str,
	priority: bool,
	journal: Journal,
}

impl ReadyTask {
	pub fn new(label: &'static str, journal: &Journal) -> Self {
		Self {
			id: TaskId::new_v4(),
			label,
			priority: false,
			journal: journal.clone(),
		}
	}

	pub fn with_priority(label: &'static str, journal: &Journal) -> Self {
		Self {
			priority: true,
			..Self::new(label, journal)
		}
	}
}

#[async_trait]
impl Task<SampleError> for ReadyTask {
	fn id(&self) -> TaskId {
		self.id
	}

	fn with_priority(&self) -> bool {
		self.priority
	}

	async fn run(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
		self.journal.record(self.label);
		Ok(())
	}

	async fn run_if_last(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
		info!(label = self.label, "Last task hook");
		self.journal.last_hooks.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Holds its worker until the test opens the gate
#[derive(Debug)]
pub struct GateTask {
	id: TaskId,
	started: Arc<Notify>,
	gate: Arc<Notify>,
	journal: Journal,
}

impl GateTask {
	pub fn new(journal: &Journal) -> (Self, Arc<Notify>, Arc<Notify>) {
		let started = Arc::new(Notify::new());
		let gate = Arc::new(Notify::new());

		(
			Self {
				id: TaskId::new_v4(),
				started: Arc::clone(&started),
				gate: Arc::clone(&gate),
				journal: journal.clone(),
			},
			started,
			gate,
		)
	}
}

#[async_trait]
impl Task<SampleError> for GateTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
		self.journal.record("gate");
		self.started.notify_one();
		self.gate.notified().await;
		Ok(())
	}
}

#[derive(Debug)]
pub struct FailingTask {
	id: TaskId,
	journal: Journal,
}

impl FailingTask {
	pub fn new(journal: &Journal) -> Self {
		Self {
			id: TaskId::new_v4(),
			journal: journal.clone(),
		}
	}
}

#[async_trait]
impl Task<SampleError> for FailingTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
		self.journal.record("failing");
		Err(SampleError::SampleError)
	}

	async fn run_if_last(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
		self.journal.last_hooks.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

#[derive(Debug, Default)]
pub struct PanicTask {
	id: TaskId,
}

impl PanicTask {
	pub fn new() -> Self {
		Self {
			id: TaskId::new_v4(),
		}
	}
}

#[async_trait]
impl Task<SampleError> for PanicTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
		panic!("PanicTask <id='{}'> always panics", self.id);
	}
}

#[derive(Debug)]
pub struct NeverTask {
	id: TaskId,
	started: Arc<Notify>,
}

impl NeverTask {
	pub fn new() -> (Self, Arc<Notify>) {
		let started = Arc::new(Notify::new());

		(
			Self {
				id: TaskId::new_v4(),
				started: Arc::clone(&started),
			},
			started,
		)
	}
}

#[async_trait]
impl Task<SampleError> for NeverTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _ctx: &TaskContext) -> Result<(), SampleError> {
		self.started.notify_one();
		pending::<()>().await;
		Ok(())
	}
}

/// Sums a range on the execution pool, like a hashing step would
#[derive(Debug)]
pub struct OffloadTask {
	id: TaskId,
	upto: u64,
	sum: Arc<AtomicU64>,
}

impl OffloadTask {
	pub fn new(upto: u64) -> (Self, Arc<AtomicU64>) {
		let sum = Arc::new(AtomicU64::new(0));

		(
			Self {
				id: TaskId::new_v4(),
				upto,
				sum: Arc::clone(&sum),
			},
			sum,
		)
	}
}

#[async_trait]
impl Task<SampleError> for OffloadTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, ctx: &TaskContext) -> Result<(), SampleError> {
		let upto = self.upto;
		let sum = ctx.offload(move || (1..=upto).sum::<u64>()).await?;
		self.sum.store(sum, Ordering::SeqCst);
		Ok(())
	}
}

/// Runs jobs inline on the calling worker, counting them
#[derive(Debug, Default, Clone)]
pub struct CountingPool {
	pub executed: Arc<AtomicUsize>,
}

#[async_trait]
impl ExecutionPool for CountingPool {
	async fn execute(&self, job: PoolJob) -> Result<(), SystemError> {
		self.executed.fetch_add(1, Ordering::SeqCst);
		job();
		Ok(())
	}
}
