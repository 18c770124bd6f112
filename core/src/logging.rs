use std::path::Path;

use tracing::error;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
	filter::{Directive, LevelFilter},
	fmt::{self, Layer},
	prelude::*,
	EnvFilter,
};

/// Directives applied on top of `RUST_LOG`
pub const DEFAULT_DIRECTIVES: &[&str] = &["warn", "pano_core=debug", "pano_task_system=debug"];

#[cfg(debug_assertions)]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::DEBUG;

#[cfg(not(debug_assertions))]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::INFO;

fn env_filter() -> EnvFilter {
	DEFAULT_DIRECTIVES
		.iter()
		.filter_map(|directive| match directive.parse::<Directive>() {
			Ok(directive) => Some(directive),
			Err(e) => {
				eprintln!("Invalid tracing directive <directive='{directive}'>: {e}");
				None
			}
		})
		.fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}

/// Installs the global subscriber: console output plus a daily rolling log file in `logs_dir`.
///
/// The returned guard flushes the file writer when dropped, keep it alive as long as the
/// application runs. Calling this again once a subscriber is installed only logs an error.
pub fn init(logs_dir: impl AsRef<Path>) -> WorkerGuard {
	let (non_blocking, guard) =
		tracing_appender::non_blocking(rolling::daily(logs_dir.as_ref(), "pano.log"));

	if let Err(e) = tracing_subscriber::registry()
		.with(env_filter())
		.with(fmt::layer().with_filter(CONSOLE_LOG_FILTER))
		.with(
			Layer::default()
				.with_writer(non_blocking)
				.with_ansi(false)
				.with_filter(LevelFilter::DEBUG),
		)
		.try_init()
	{
		error!(?e, "Global tracing subscriber already installed;");
	}

	guard
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_directives_parse() {
		let filter = env_filter().to_string();

		for directive in DEFAULT_DIRECTIVES {
			assert!(filter.contains(directive), "missing {directive} in {filter}");
		}
	}
}
