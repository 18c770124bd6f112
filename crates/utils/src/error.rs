use std::{
	fmt,
	io,
	path::{Path, PathBuf},
};

use thiserror::Error;

/// I/O failure on a file, carrying the path it happened on and optionally what we were doing
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: PathBuf,
	#[source]
	pub source: io::Error,
	pub context: Option<&'static str>,
}

impl fmt::Display for FileIOError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(context) = self.context {
			write!(f, "{context}: ")?;
		}

		write!(f, "{} <path='{}'>", self.source, self.path.display())
	}
}

impl FileIOError {
	/// Whether the file simply wasn't there
	#[must_use]
	pub fn is_not_found(&self) -> bool {
		self.source.kind() == io::ErrorKind::NotFound
	}
}

impl<P: AsRef<Path>> From<(P, io::Error)> for FileIOError {
	fn from((path, source): (P, io::Error)) -> Self {
		Self {
			path: path.as_ref().to_path_buf(),
			source,
			context: None,
		}
	}
}

impl<P: AsRef<Path>> From<(P, io::Error, &'static str)> for FileIOError {
	fn from((path, source, context): (P, io::Error, &'static str)) -> Self {
		Self {
			path: path.as_ref().to_path_buf(),
			source,
			context: Some(context),
		}
	}
}
