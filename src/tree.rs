//! Reading generated trees back from disk.
//!
//! [`read_tree`] takes a snapshot of everything under a root without following
//! links, so two runs can be compared entry by entry. [`verify_escapes`] checks
//! the one property every scenario exists for: each link, resolved from where it
//! sits, points outside the scenario root.

use std::{
	fs,
	path::{Component, Path, PathBuf},
};

use crate::error::{FixtureError, Result};

/// What kind of filesystem entry was found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntryKind {
	Dir,
	File { contents: Vec<u8> },
	Symlink { target: PathBuf },
}

/// A single entry of a [`Tree`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeEntry {
	/// Path relative to the tree root, `/`-separated and with a leading `/` (e.g. "/hide/breakout")
	pub path: String,
	pub kind: EntryKind,
}

/// Everything below a root, sorted by path.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Tree {
	pub entries: Vec<TreeEntry>,
}

impl Tree {
	/// Get an entry by path
	pub fn entry(&self, path: &str) -> Option<&TreeEntry> {
		self.entries.iter().find(|e| e.path == path)
	}

	/// Check if the tree contains an entry at the given path
	pub fn contains(&self, path: &str) -> bool {
		self.entries.iter().any(|e| e.path == path)
	}

	/// Target of the symlink at `path`, if there is one.
	pub fn link_target(&self, path: &str) -> Option<&Path> {
		match &self.entry(path)?.kind {
			EntryKind::Symlink { target } => Some(target),
			_ => None,
		}
	}

	pub fn symlinks(&self) -> impl Iterator<Item = (&str, &Path)> {
		self.entries.iter().filter_map(|e| match &e.kind {
			EntryKind::Symlink { target } => Some((e.path.as_str(), target.as_path())),
			_ => None,
		})
	}
}

/// Snapshot everything below `root`. Symlinks are recorded, never followed.
pub fn read_tree(root: &Path) -> Result<Tree> {
	let mut entries = Vec::new();

	for entry in walkdir::WalkDir::new(root).min_depth(1).follow_links(false) {
		let entry = entry.map_err(|e| {
			let path = e.path().unwrap_or(root).to_path_buf();
			FixtureError::io("walk", path)(e.into())
		})?;
		let path = entry.path();
		let relative = path.strip_prefix(root).map_err(|_| FixtureError::InvalidPath { path: path.to_path_buf() })?;
		let file_type = entry.file_type();

		let kind = if file_type.is_symlink() {
			EntryKind::Symlink {
				target: fs::read_link(path).map_err(FixtureError::io("read_link", path))?,
			}
		} else if file_type.is_dir() {
			EntryKind::Dir
		} else {
			EntryKind::File {
				contents: fs::read(path).map_err(FixtureError::io("read", path))?,
			}
		};
		entries.push(TreeEntry {
			path: format!("/{}", slash_path(relative)),
			kind,
		});
	}

	// Sort by path for deterministic output
	entries.sort_by(|a, b| a.path.cmp(&b.path));
	Ok(Tree { entries })
}

/// Render a tree one entry per line, for comparisons and the `inspect` command.
///
/// ```text
/// d /hide
/// l /hide/breakout -> ../..
/// ```
pub fn render_tree(tree: &Tree) -> String {
	let mut out = String::new();
	for entry in &tree.entries {
		let line = match &entry.kind {
			EntryKind::Dir => format!("d {}", entry.path),
			EntryKind::File { .. } => format!("f {}", entry.path),
			EntryKind::Symlink { target } => format!("l {} -> {}", entry.path, slash_path(target)),
		};
		out.push_str(&line);
		out.push('\n');
	}
	out
}

/// Compare two trees, with a readable listing of both on failure
#[track_caller]
pub fn assert_tree_eq(expected: &Tree, actual: &Tree) {
	if expected == actual {
		return;
	}
	for expected_entry in &expected.entries {
		match actual.entry(&expected_entry.path) {
			None => panic!("missing entry in actual: {}\n--- Actual ---\n{}", expected_entry.path, render_tree(actual)),
			Some(actual_entry) if actual_entry != expected_entry => {
				panic!("entry {} differs:\n--- Expected ---\n{:?}\n--- Actual ---\n{:?}\n", expected_entry.path, expected_entry.kind, actual_entry.kind)
			}
			Some(_) => {}
		}
	}
	panic!("unexpected extra entries:\n--- Expected ---\n{}\n--- Actual ---\n{}", render_tree(expected), render_tree(actual));
}

/// Join `target` onto `link_dir` and fold `.` and `..` without touching the filesystem.
///
/// `..` at the filesystem root stays at the root; leading `..` of a relative result are kept.
///
/// ```
/// use std::path::Path;
/// use breakout_fixtures::tree::resolve_lexically;
///
/// let resolved = resolve_lexically(Path::new("/tmp/fx/nested-breakout/hide"), Path::new("../.."));
/// assert_eq!(resolved, Path::new("/tmp/fx"));
/// ```
pub fn resolve_lexically(link_dir: &Path, target: &Path) -> PathBuf {
	let joined = link_dir.join(target);
	let mut out: Vec<Component<'_>> = Vec::new();
	for component in joined.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => match out.last() {
				Some(Component::Normal(_)) => {
					out.pop();
				}
				Some(Component::RootDir | Component::Prefix(_)) => {}
				_ => out.push(component),
			},
			other => out.push(other),
		}
	}
	out.iter().collect()
}

/// Outcome of resolving one link found under a scenario root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscapeCheck {
	/// Link path relative to the scenario root, in [`TreeEntry::path`] form.
	pub link: String,
	pub target: PathBuf,
	/// Lexical resolution of `target` from the link's directory.
	pub resolved: PathBuf,
	pub escapes: bool,
	/// How many directories above the scenario root one has to climb to reach `resolved`. Zero if it does not escape.
	pub levels_above_root: usize,
}

/// Resolve every symlink under `scenario_root` and report where it lands.
pub fn verify_escapes(scenario_root: &Path) -> Result<Vec<EscapeCheck>> {
	let root = std::path::absolute(scenario_root).map_err(FixtureError::io("absolute", scenario_root))?;
	let root = resolve_lexically(&root, Path::new(""));
	let tree = read_tree(&root)?;

	let checks = tree
		.symlinks()
		.map(|(link, target)| {
			let link_path = root.join(link.trim_start_matches('/'));
			let link_dir = link_path.parent().unwrap_or(root.as_path());
			let resolved = resolve_lexically(link_dir, target);
			let escapes = !resolved.starts_with(&root);
			EscapeCheck {
				link: link.to_owned(),
				target: target.to_path_buf(),
				levels_above_root: if escapes { levels_above(&root, &resolved) } else { 0 },
				resolved,
				escapes,
			}
		})
		.collect();
	Ok(checks)
}

/// Human-readable summary of an output root: every scenario's tree and escape checks, then aliases.
pub fn describe(output_root: &Path) -> Result<String> {
	let mut names = fs::read_dir(output_root)
		.map_err(FixtureError::io("read_dir", output_root))?
		.map(|e| e.map(|e| e.file_name()))
		.collect::<std::io::Result<Vec<_>>>()
		.map_err(FixtureError::io("read_dir", output_root))?;
	names.sort();

	let mut out = String::new();
	let mut aliases = Vec::new();
	for name in names {
		let path = output_root.join(&name);
		let meta = fs::symlink_metadata(&path).map_err(FixtureError::io("symlink_metadata", &path))?;
		if meta.file_type().is_symlink() {
			let target = fs::read_link(&path).map_err(FixtureError::io("read_link", &path))?;
			aliases.push(format!("alias {} -> {}\n", name.to_string_lossy(), slash_path(&target)));
			continue;
		}
		if !meta.is_dir() {
			continue;
		}

		out.push_str(&format!("== {}\n", name.to_string_lossy()));
		out.push_str(&render_tree(&read_tree(&path)?));
		for check in verify_escapes(&path)? {
			let verdict = if check.escapes { format!("escapes {} level(s) above root", check.levels_above_root) } else { "STAYS INSIDE ROOT".to_string() };
			out.push_str(&format!("check {}: {verdict}\n", check.link));
		}
	}
	for alias in aliases {
		out.push_str(&alias);
	}
	Ok(out)
}

fn levels_above(root: &Path, resolved: &Path) -> usize {
	let shared = root.components().zip(resolved.components()).take_while(|(a, b)| a == b).count();
	root.components().count() - shared
}

fn slash_path(path: &Path) -> String {
	path.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{builder, marker::RootMarker};

	#[test]
	fn test_resolve_lexically() {
		assert_eq!(resolve_lexically(Path::new("/tmp/fx/nested-breakout/hide"), Path::new("../..")), PathBuf::from("/tmp/fx"));
		assert_eq!(resolve_lexically(Path::new("/tmp/fx/immediate-breakout"), Path::new("..")), PathBuf::from("/tmp/fx"));
		assert_eq!(resolve_lexically(Path::new("/tmp"), Path::new("../../..")), PathBuf::from("/"));
		assert_eq!(resolve_lexically(Path::new("a/./b"), Path::new("../../..")), PathBuf::from(".."));
		assert_eq!(resolve_lexically(Path::new("/tmp/fx"), Path::new("/etc/passwd")), PathBuf::from("/etc/passwd"));
	}

	#[test]
	fn test_levels_above() {
		assert_eq!(levels_above(Path::new("/tmp/fx/s"), Path::new("/tmp/fx")), 1);
		assert_eq!(levels_above(Path::new("/tmp/fx/s"), Path::new("/")), 3);
		assert_eq!(levels_above(Path::new("/tmp/fx/s"), Path::new("/tmp/fx/other")), 1);
	}

	#[test]
	fn test_read_and_render_tree() {
		let temp = tempfile::tempdir().unwrap();
		let handle = builder::init_scenario(temp.path(), "nested-breakout", RootMarker::GitSkeleton).unwrap();
		builder::add_nested_escape_link(&handle, "hide", "breakout", 1).unwrap();

		let tree = read_tree(&handle.root).unwrap();

		assert_eq!(tree.link_target("/hide/breakout"), Some(Path::new("../..")));
		assert!(tree.contains("/.git/HEAD"));
		assert_eq!(
			render_tree(&tree),
			"d /.git\nf /.git/HEAD\nd /.git/objects\nd /.git/refs\nd /hide\nl /hide/breakout -> ../..\n"
		);
	}

	#[test]
	fn test_read_tree_accepts_unnormalized_root() {
		let temp = tempfile::tempdir().unwrap();
		let handle = builder::init_scenario(temp.path(), "s", RootMarker::None).unwrap();
		builder::add_nested_escape_link(&handle, "hide", "breakout", 1).unwrap();

		let tree = read_tree(&temp.path().join(".").join("s")).unwrap();
		assert_eq!(render_tree(&tree), "d /hide\nl /hide/breakout -> ../..\n");
	}

	#[test]
	fn test_read_tree_does_not_follow_links() {
		let temp = tempfile::tempdir().unwrap();
		let handle = builder::init_scenario(temp.path(), "immediate-breakout", RootMarker::None).unwrap();
		builder::add_root_level_escape_link(&handle, "breakout").unwrap();

		let tree = read_tree(&handle.root).unwrap();
		assert_eq!(tree.entries.len(), 1);
		assert_eq!(tree.symlinks().collect::<Vec<_>>(), vec![("/breakout", Path::new(".."))]);
	}

	#[test]
	#[cfg(unix)]
	fn test_verify_escapes() {
		let temp = tempfile::tempdir().unwrap();
		let handle = builder::init_scenario(temp.path(), "s", RootMarker::None).unwrap();
		builder::add_nested_escape_link(&handle, "a/b", "deep", 3).unwrap();
		std::os::unix::fs::symlink("..", handle.path("a/inside")).unwrap();

		let checks = verify_escapes(&handle.root).unwrap();
		assert_eq!(checks.len(), 2);

		let deep = checks.iter().find(|c| c.link == "/a/b/deep").unwrap();
		assert!(deep.escapes);
		assert_eq!(deep.levels_above_root, 3);

		let inside = checks.iter().find(|c| c.link == "/a/inside").unwrap();
		assert!(!inside.escapes);
		assert_eq!(inside.levels_above_root, 0);
	}

	#[test]
	fn test_assert_tree_eq_passes_on_equal_trees() {
		let temp = tempfile::tempdir().unwrap();
		let handle = builder::init_scenario(temp.path(), "s", RootMarker::GitSkeleton).unwrap();
		let tree = read_tree(&handle.root).unwrap();
		assert_tree_eq(&tree, &tree.clone());
	}

	#[test]
	#[should_panic(expected = "missing entry in actual: /hide")]
	fn test_assert_tree_eq_reports_missing_entry() {
		let expected = Tree {
			entries: vec![TreeEntry { path: "/hide".to_owned(), kind: EntryKind::Dir }],
		};
		assert_tree_eq(&expected, &Tree::default());
	}

	#[test]
	fn test_describe() {
		let temp = tempfile::tempdir().unwrap();
		let handle = builder::init_scenario(temp.path(), "immediate-breakout", RootMarker::None).unwrap();
		builder::add_root_level_escape_link(&handle, "breakout").unwrap();
		builder::add_alias_link(temp.path(), "alias", "immediate-breakout").unwrap();

		let out = describe(temp.path()).unwrap();
		assert_eq!(out, "== immediate-breakout\nl /breakout -> ..\ncheck /breakout: escapes 1 level(s) above root\nalias alias -> immediate-breakout\n");
	}
}
