//! Git repository markers for scenario roots.
//!
//! Two ways to make a directory look like a repository root:
//!
//! - [`write_skeleton`] writes the three entries git needs to recognise a
//!   repository (`HEAD`, `objects/`, `refs/`). Nothing else, so two runs
//!   produce identical trees.
//! - [`init`] runs the real `git init`, for consumers that want a repository
//!   any git tooling would accept without question.
//!
//! # Example
//!
//! ```
//! use breakout_fixtures::marker::git;
//!
//! let dir = std::env::temp_dir().join(format!("breakout_fixtures_doc_{}", std::process::id()));
//! std::fs::create_dir_all(&dir).unwrap();
//! git::write_skeleton(&dir).unwrap();
//! assert!(git::is_repository(&dir));
//! # std::fs::remove_dir_all(&dir).unwrap();
//! ```

use std::{
	fs,
	path::Path,
	process::{Command, Output},
};

use tracing::debug;

use crate::error::{FixtureError, Result};

/// Name of the repository directory inside a worktree root.
pub const DOT_GIT: &str = ".git";

/// Contents of the skeleton's `HEAD`.
pub const SKELETON_HEAD: &str = "ref: refs/heads/main\n";

/// Write a minimal `.git` directory into `root`.
pub fn write_skeleton(root: &Path) -> Result<()> {
	let dot_git = root.join(DOT_GIT);
	for dir in ["objects", "refs"] {
		let path = dot_git.join(dir);
		fs::create_dir_all(&path).map_err(FixtureError::io("create_dir_all", &path))?;
	}
	let head = dot_git.join("HEAD");
	fs::write(&head, SKELETON_HEAD).map_err(FixtureError::io("write", &head))?;
	debug!(root = %root.display(), "wrote git skeleton");
	Ok(())
}

/// Run `git init` in `root`.
///
/// The default branch is pinned so the result does not depend on the user's git config.
pub fn init(root: &Path) -> Result<()> {
	let args = ["-c", "init.defaultBranch=main", "init", "--quiet"];
	let output = run_in(root, &args).map_err(FixtureError::io("git init", root))?;
	if !output.status.success() {
		return Err(FixtureError::MarkerCommand {
			command: format!("git {}", args.join(" ")),
			status: output.status,
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		});
	}
	debug!(root = %root.display(), "ran git init");
	Ok(())
}

/// Whether `root` has a `.git` directory with a `HEAD` in it.
///
/// Only looks at the directory itself; does not search upwards like git would.
pub fn is_repository(root: &Path) -> bool {
	let dot_git = root.join(DOT_GIT);
	dot_git.join("HEAD").is_file() && dot_git.join("objects").is_dir() && dot_git.join("refs").is_dir()
}

/// Run a git command with `dir` as its working directory.
fn run_in(dir: &Path, args: &[&str]) -> std::io::Result<Output> {
	Command::new("git").args(args).current_dir(dir).output()
}
