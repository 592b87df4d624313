//! Error taxonomy for fixture construction.

use std::{io, path::PathBuf, process::ExitStatus};

pub type Result<T, E = FixtureError> = std::result::Result<T, E>;

/// Everything that can go wrong while materializing a fixture tree.
///
/// Nothing is retried. Every variant carries the path it was about, so a caller
/// can report it next to the scenario name without extra bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
	#[error("refusing to overwrite existing path '{}'", path.display())]
	AlreadyExists { path: PathBuf },

	#[error("{op} failed on '{}': {source}", path.display())]
	Io {
		op: &'static str,
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("could not create symlink '{}' -> '{}': {source}", link.display(), target.display())]
	LinkCreation {
		link: PathBuf,
		target: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("'{name}' is not a single plain path component")]
	InvalidName { name: String },

	#[error("relative path '{}' is absolute or climbs above its root", path.display())]
	InvalidPath { path: PathBuf },

	/// An escape depth of zero would land on the scenario root, not outside it.
	#[error("escape depth must be at least 1, got {depth}")]
	InvalidEscapeDepth { depth: usize },

	#[error("name '{name}' is used more than once in the catalog")]
	DuplicateName { name: String },

	#[error("`{command}` exited with {status}: {stderr}")]
	MarkerCommand { command: String, status: ExitStatus, stderr: String },
}

impl FixtureError {
	pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
		let path = path.into();
		move |source| Self::Io { op, path, source }
	}

	/// Whether this error should stop the whole run rather than just the scenario it occurred in.
	pub fn is_fatal_to_run(&self) -> bool {
		matches!(self, Self::Io { .. })
	}
}
