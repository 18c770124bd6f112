//! Pano core: a tagged media graph where every change is a reversible [`Commit`].
//!
//! Producers, interactive edits and background [`tasks`] alike, package their intent as a
//! commit and hand it to a [`Project`]. The project applies it through [`CommitApplier`] inside a
//! single storage transaction, keeps its inverse on the [`UndoQueue`] and broadcasts what was
//! written to every subscriber.

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

pub mod actions;
pub mod applier;
pub mod commit;
pub mod config;
mod error;
pub mod logging;
pub mod model;
mod project;
pub mod storage;
pub mod tasks;
mod undo;

pub use applier::{Applied, CommitApplier};
pub use commit::{Commit, CommitError};
pub use error::Error;
pub use project::Project;
pub use undo::UndoQueue;
