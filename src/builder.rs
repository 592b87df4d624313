//! Filesystem effects that build a single scenario.
//!
//! Every function here takes the paths it works on explicitly and performs one
//! synchronous step. Nothing is rolled back on failure: whatever was created
//! before the error stays on disk.

use std::{
	fs, io,
	path::{Component, Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
	error::{FixtureError, Result},
	marker::RootMarker,
};

/// A scenario root that has been created and marked.
#[derive(Clone, Debug, Eq, PartialEq, derive_new::new)]
pub struct ScenarioHandle {
	/// Scenario name, also the directory name under the output root.
	pub name: String,
	/// Absolute or caller-relative path of the scenario root.
	pub root: PathBuf,
}

impl ScenarioHandle {
	/// Get the full path to something inside the scenario.
	pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
		self.root.join(relative)
	}
}

/// Create `output_root/name` and write `marker` into it.
///
/// `output_root` is created if absent. An existing but empty scenario directory is
/// reused; anything else already at that path is [`FixtureError::AlreadyExists`].
pub fn init_scenario(output_root: &Path, name: &str, marker: RootMarker) -> Result<ScenarioHandle> {
	validate_name(name)?;
	fs::create_dir_all(output_root).map_err(FixtureError::io("create_dir_all", output_root))?;

	let root = output_root.join(name);
	match fs::create_dir(&root) {
		Ok(()) => {}
		Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
			if !is_empty_dir(&root)? {
				return Err(FixtureError::AlreadyExists { path: root });
			}
			debug!(path = %root.display(), "reusing empty scenario directory");
		}
		Err(e) => return Err(FixtureError::io("create_dir", &root)(e)),
	}

	marker.write(&root)?;
	info!(scenario = name, root = %root.display(), ?marker, "initialized scenario");
	Ok(ScenarioHandle::new(name.to_owned(), root))
}

/// Create `relative_parent/link_name` inside the scenario, pointing just far enough upwards to leave it.
///
/// The target consists of `nesting_depth(relative_parent) + escape_depth` parent references, so with
/// `escape_depth == 1` the link always lands on the directory that contains the scenario root, no
/// matter how deep it is hidden. Returns the path of the created link.
pub fn add_nested_escape_link(handle: &ScenarioHandle, relative_parent: impl AsRef<Path>, link_name: &str, escape_depth: usize) -> Result<PathBuf> {
	if escape_depth == 0 {
		return Err(FixtureError::InvalidEscapeDepth { depth: escape_depth });
	}
	validate_name(link_name)?;
	let parent = normalize_relative(relative_parent.as_ref())?;

	let dir = handle.root.join(&parent);
	fs::create_dir_all(&dir).map_err(FixtureError::io("create_dir_all", &dir))?;

	let target = escape_target(parent.components().count(), escape_depth);
	let link = dir.join(link_name);
	create_symlink(&target, &link)?;
	debug!(scenario = %handle.name, link = %link.display(), target = %target.display(), "created escape link");
	Ok(link)
}

/// Create `link_name` directly under the scenario root, pointing at the directory that contains it.
pub fn add_root_level_escape_link(handle: &ScenarioHandle, link_name: &str) -> Result<PathBuf> {
	add_nested_escape_link(handle, Path::new(""), link_name, 1)
}

/// Create `output_root/alias_name` as a symlink to the sibling `target_scenario_name`.
///
/// The target is stored relative, so the alias keeps working if the output root is moved.
pub fn add_alias_link(output_root: &Path, alias_name: &str, target_scenario_name: &str) -> Result<PathBuf> {
	validate_name(alias_name)?;
	validate_name(target_scenario_name)?;
	fs::create_dir_all(output_root).map_err(FixtureError::io("create_dir_all", output_root))?;

	let link = output_root.join(alias_name);
	create_symlink(Path::new(target_scenario_name), &link)?;
	info!(alias = alias_name, target = target_scenario_name, "created alias link");
	Ok(link)
}

/// Relative path made of `depth + escape_depth` parent references.
///
/// ```
/// use std::path::Path;
/// use breakout_fixtures::builder::escape_target;
///
/// assert_eq!(escape_target(1, 1), Path::new("../.."));
/// assert_eq!(escape_target(0, 1), Path::new(".."));
/// ```
pub fn escape_target(depth: usize, escape_depth: usize) -> PathBuf {
	std::iter::repeat_n(Component::ParentDir, depth + escape_depth).collect()
}

/// Number of directories `relative` descends into, after folding `.` and `..`.
///
/// `hide/../hide` has depth 1. Absolute paths and paths that climb above their start are rejected.
pub fn nesting_depth(relative: impl AsRef<Path>) -> Result<usize> {
	Ok(normalize_relative(relative.as_ref())?.components().count())
}

/// Lexically normalize a path that must stay below the directory it is relative to.
pub(crate) fn normalize_relative(relative: &Path) -> Result<PathBuf> {
	let invalid = || FixtureError::InvalidPath { path: relative.to_path_buf() };
	let mut parts = Vec::new();
	for component in relative.components() {
		match component {
			Component::CurDir => {}
			Component::Normal(part) => parts.push(part),
			Component::ParentDir => {
				parts.pop().ok_or_else(invalid)?;
			}
			Component::RootDir | Component::Prefix(_) => return Err(invalid()),
		}
	}
	Ok(parts.into_iter().collect())
}

/// Names end up as single directory entries, so they must be exactly one plain component.
pub(crate) fn validate_name(name: &str) -> Result<()> {
	let mut components = Path::new(name).components();
	match (components.next(), components.next()) {
		(Some(Component::Normal(part)), None) if part == name => Ok(()),
		_ => Err(FixtureError::InvalidName { name: name.to_owned() }),
	}
}

fn is_empty_dir(path: &Path) -> Result<bool> {
	let meta = fs::symlink_metadata(path).map_err(FixtureError::io("symlink_metadata", path))?;
	if !meta.is_dir() {
		return Ok(false);
	}
	let mut entries = fs::read_dir(path).map_err(FixtureError::io("read_dir", path))?;
	Ok(entries.next().is_none())
}

fn create_symlink(target: &Path, link: &Path) -> Result<()> {
	#[cfg(unix)]
	let res = std::os::unix::fs::symlink(target, link);
	// All targets produced here are directories.
	#[cfg(windows)]
	let res = std::os::windows::fs::symlink_dir(target, link);
	#[cfg(not(any(unix, windows)))]
	let res: io::Result<()> = Err(io::Error::from(io::ErrorKind::Unsupported));

	res.map_err(|source| match source.kind() {
		io::ErrorKind::AlreadyExists => FixtureError::AlreadyExists { path: link.to_path_buf() },
		_ => FixtureError::LinkCreation {
			link: link.to_path_buf(),
			target: target.to_path_buf(),
			source,
		},
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_escape_target() {
		assert_eq!(escape_target(0, 1), PathBuf::from(".."));
		assert_eq!(escape_target(1, 1), Path::new("..").join(".."));
		assert_eq!(escape_target(3, 2).components().count(), 5);
		assert!(escape_target(3, 2).components().all(|c| c == Component::ParentDir));
	}

	#[test]
	fn test_nesting_depth() {
		assert_eq!(nesting_depth("").unwrap(), 0);
		assert_eq!(nesting_depth(".").unwrap(), 0);
		assert_eq!(nesting_depth("hide").unwrap(), 1);
		assert_eq!(nesting_depth("hide/../hide").unwrap(), 1);
		assert_eq!(nesting_depth("./a/b/c").unwrap(), 3);
		assert_eq!(nesting_depth("a/b/../../c").unwrap(), 1);
	}

	#[test]
	fn test_nesting_depth_rejects_escaping_parents() {
		assert!(matches!(nesting_depth("..").unwrap_err(), FixtureError::InvalidPath { .. }));
		assert!(matches!(nesting_depth("hide/../../x").unwrap_err(), FixtureError::InvalidPath { .. }));
		assert!(matches!(nesting_depth("/etc").unwrap_err(), FixtureError::InvalidPath { .. }));
	}

	#[test]
	fn test_validate_name() {
		assert!(validate_name("nested-breakout").is_ok());
		assert!(validate_name(".hidden").is_ok());
		for bad in ["", ".", "..", "a/b", "a/", "/a"] {
			assert!(matches!(validate_name(bad), Err(FixtureError::InvalidName { .. })), "{bad:?} should be rejected");
		}
	}

	#[test]
	fn test_init_scenario_creates_output_root_and_marker() {
		let temp = tempfile::tempdir().unwrap();
		let output_root = temp.path().join("fx");

		let handle = init_scenario(&output_root, "nested-breakout", RootMarker::GitSkeleton).unwrap();

		assert_eq!(handle.root, output_root.join("nested-breakout"));
		assert!(handle.root.is_dir());
		assert!(crate::marker::git::is_repository(&handle.root));
	}

	#[test]
	fn test_init_scenario_reuses_empty_dir() {
		let temp = tempfile::tempdir().unwrap();
		fs::create_dir(temp.path().join("empty")).unwrap();

		let handle = init_scenario(temp.path(), "empty", RootMarker::None).unwrap();
		assert_eq!(fs::read_dir(&handle.root).unwrap().count(), 0);
	}

	#[test]
	fn test_init_scenario_refuses_populated_path() {
		let temp = tempfile::tempdir().unwrap();
		init_scenario(temp.path(), "taken", RootMarker::GitSkeleton).unwrap();
		fs::write(temp.path().join("file"), "x").unwrap();

		let err = init_scenario(temp.path(), "taken", RootMarker::GitSkeleton).unwrap_err();
		assert!(matches!(&err, FixtureError::AlreadyExists { path } if path == &temp.path().join("taken")), "{err}");

		let err = init_scenario(temp.path(), "file", RootMarker::GitSkeleton).unwrap_err();
		assert!(matches!(err, FixtureError::AlreadyExists { .. }), "{err}");
		assert_eq!(fs::read_to_string(temp.path().join("file")).unwrap(), "x");
	}

	#[test]
	fn test_nested_escape_link() {
		let temp = tempfile::tempdir().unwrap();
		let handle = init_scenario(temp.path(), "nested-breakout", RootMarker::GitSkeleton).unwrap();

		let link = add_nested_escape_link(&handle, "hide", "breakout", 1).unwrap();

		assert_eq!(link, handle.path("hide/breakout"));
		assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
		assert_eq!(fs::read_link(&link).unwrap(), Path::new("..").join(".."));
		// Following the link lands on the output root, which contains the scenario itself.
		assert!(link.join("nested-breakout").join("hide").is_dir());
	}

	#[test]
	fn test_nested_escape_link_normalizes_parent() {
		let temp = tempfile::tempdir().unwrap();
		let handle = init_scenario(temp.path(), "s", RootMarker::None).unwrap();

		let link = add_nested_escape_link(&handle, "hide/../hide/./deeper", "breakout", 2).unwrap();

		assert_eq!(link, handle.path("hide").join("deeper").join("breakout"));
		assert_eq!(fs::read_link(&link).unwrap(), escape_target(2, 2));
	}

	#[test]
	fn test_root_level_escape_link() {
		let temp = tempfile::tempdir().unwrap();
		let handle = init_scenario(temp.path(), "immediate-breakout", RootMarker::GitSkeleton).unwrap();

		let link = add_root_level_escape_link(&handle, "breakout").unwrap();

		assert_eq!(link, handle.path("breakout"));
		assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from(".."));
		assert!(link.join("immediate-breakout").join(".git").is_dir());
	}

	#[test]
	fn test_escape_link_argument_errors() {
		let temp = tempfile::tempdir().unwrap();
		let handle = init_scenario(temp.path(), "s", RootMarker::None).unwrap();

		assert!(matches!(add_nested_escape_link(&handle, "hide", "breakout", 0), Err(FixtureError::InvalidEscapeDepth { depth: 0 })));
		assert!(matches!(add_nested_escape_link(&handle, "../outside", "breakout", 1), Err(FixtureError::InvalidPath { .. })));
		assert!(matches!(add_nested_escape_link(&handle, "hide", "a/b", 1), Err(FixtureError::InvalidName { .. })));
		// Nothing was created for the rejected calls.
		assert_eq!(fs::read_dir(&handle.root).unwrap().count(), 0);
	}

	#[test]
	fn test_escape_link_refuses_occupied_path() {
		let temp = tempfile::tempdir().unwrap();
		let handle = init_scenario(temp.path(), "s", RootMarker::None).unwrap();
		add_root_level_escape_link(&handle, "breakout").unwrap();

		let err = add_root_level_escape_link(&handle, "breakout").unwrap_err();
		assert!(matches!(err, FixtureError::AlreadyExists { .. }), "{err}");
	}

	#[test]
	fn test_alias_link() {
		let temp = tempfile::tempdir().unwrap();
		let handle = init_scenario(temp.path(), "nested-breakout", RootMarker::GitSkeleton).unwrap();
		add_nested_escape_link(&handle, "hide", "breakout", 1).unwrap();

		let alias = add_alias_link(temp.path(), "alias-to-nested", "nested-breakout").unwrap();

		assert_eq!(fs::read_link(&alias).unwrap(), PathBuf::from("nested-breakout"));
		assert!(alias.join("hide").join("breakout").exists());

		let err = add_alias_link(temp.path(), "alias-to-nested", "nested-breakout").unwrap_err();
		assert!(matches!(err, FixtureError::AlreadyExists { .. }), "{err}");
	}

	#[test]
	#[cfg(unix)]
	fn test_refused_symlink_is_link_creation_error() {
		let temp = tempfile::tempdir().unwrap();
		let handle = init_scenario(temp.path(), "s", RootMarker::None).unwrap();
		let long_name = "x".repeat(300);

		let err = add_nested_escape_link(&handle, "hide", &long_name, 1).unwrap_err();
		assert!(!err.is_fatal_to_run());

		match err {
			FixtureError::LinkCreation { link, target, .. } => {
				assert_eq!(link, handle.path("hide").join(&long_name));
				assert_eq!(target, Path::new("..").join(".."));
			}
			other => panic!("expected LinkCreation, got {other}"),
		}
	}

	#[test]
	fn test_alias_link_rejects_path_targets() {
		let temp = tempfile::tempdir().unwrap();
		let err = add_alias_link(temp.path(), "alias", "../elsewhere").unwrap_err();
		assert!(matches!(err, FixtureError::InvalidName { .. }), "{err}");
	}
}
