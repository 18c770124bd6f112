use std::{error::Error, fmt};

use thiserror::Error;

use super::task::{Task, TaskId};

/// Errors raised by the task system itself, never by the tasks it runs
#[derive(Debug, Error)]
pub enum SystemError {
	#[error("execution pool job failed: {0}")]
	ExecutionPool(String),
	#[error("execution pool job panicked")]
	ExecutionPoolPanic,
	#[error("execution pool job <task_id='{0}'> finished without sending its result")]
	MissingPoolResult(TaskId),
}

/// Trait for errors returned by [`Task::run`] and [`Task::run_if_last`], implemented for every
/// error type that can cross threads.
pub trait RunError: Error + fmt::Debug + Send + Sync + 'static {}

impl<T: Error + fmt::Debug + Send + Sync + 'static> RunError for T {}

/// Returned when dispatching to a task system that was already shutdown, giving the tasks back
/// to the caller so they can be stored or re-dispatched somewhere else.
#[derive(Debug, Error)]
#[error("task system is shutdown, {} task(s) were not dispatched", .0.len())]
pub struct DispatcherShutdownError<E: RunError>(pub Vec<Box<dyn Task<E>>>);
