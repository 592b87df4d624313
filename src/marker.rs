//! Root markers.
//!
//! A marker is what turns a plain directory into a trust boundary for the
//! checker under test. Version-control walkers look for a repository, so the
//! markers here are all git flavoured.

pub mod git;

use std::path::Path;

use crate::error::Result;

/// How a scenario root announces itself as a contained unit.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum RootMarker {
	/// Minimal `.git` directory written by hand. Deterministic across machines and git versions.
	#[default]
	GitSkeleton,
	/// Shell out to `git init`. Closest to a real repository, but the contents depend on the installed git.
	GitInit,
	/// Leave the directory unmarked.
	None,
}

impl RootMarker {
	/// Materialize the marker inside `root`, which must already exist.
	pub fn write(self, root: &Path) -> Result<()> {
		match self {
			Self::GitSkeleton => git::write_skeleton(root),
			Self::GitInit => git::init(root),
			Self::None => Ok(()),
		}
	}
}
