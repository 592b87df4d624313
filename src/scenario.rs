//! Declarative scenarios and the generation run.
//!
//! A [`Catalog`] lists what should exist under an output root; [`generate`]
//! builds it one scenario at a time and records what happened to each.
//!
//! # Error policy
//!
//! - A scenario that fails (name taken, link refused, bad arguments) stops at the
//!   failing step and is reported; the run moves on to the next one.
//! - An I/O failure (permissions, disk) ends the run. Everything after it is
//!   reported as skipped, unless [`GenerateOptions::keep_going`] is set.
//! - Nothing is cleaned up. Scenarios that were finished, and the partial one that
//!   failed, stay on disk for inspection.

use std::{
	collections::HashSet,
	fmt,
	path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
	builder::{self, ScenarioHandle},
	error::{FixtureError, Result},
	marker::RootMarker,
};

pub const NESTED_BREAKOUT: &str = "nested-breakout";
pub const IMMEDIATE_BREAKOUT: &str = "immediate-breakout";
pub const ALIAS_TO_NESTED: &str = "alias-to-nested";
/// Directory the nested link hides in.
pub const HIDE_DIR: &str = "hide";
pub const BREAKOUT_LINK: &str = "breakout";

/// One symbolic link to create inside a scenario.
#[derive(Clone, Debug, Eq, Hash, PartialEq, derive_new::new)]
pub struct LinkSpec {
	/// Directory containing the link, relative to the scenario root. Empty for the root itself.
	pub parent: PathBuf,
	pub link_name: String,
	/// Levels the target climbs beyond the ones needed to get back up to the scenario root.
	pub escape_depth: usize,
}

impl LinkSpec {
	/// A link directly under the scenario root, pointing at the directory containing the scenario.
	pub fn root_level(link_name: &str) -> Self {
		Self::new(PathBuf::new(), link_name.to_owned(), 1)
	}

	/// A link inside `parent`, pointing at the directory containing the scenario.
	pub fn nested(parent: impl Into<PathBuf>, link_name: &str) -> Self {
		Self::new(parent.into(), link_name.to_owned(), 1)
	}

	/// The relative target the link will be created with.
	pub fn target(&self) -> Result<PathBuf> {
		Ok(builder::escape_target(builder::nesting_depth(&self.parent)?, self.escape_depth))
	}
}

/// A named scenario root and the links inside it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Scenario {
	pub name: String,
	pub marker: RootMarker,
	pub links: Vec<LinkSpec>,
}

impl Scenario {
	pub fn new(name: &str) -> Self {
		Self {
			name: name.to_owned(),
			marker: RootMarker::default(),
			links: Vec::new(),
		}
	}

	pub fn with_marker(mut self, marker: RootMarker) -> Self {
		self.marker = marker;
		self
	}

	pub fn with_link(mut self, link: LinkSpec) -> Self {
		self.links.push(link);
		self
	}

	/// Create the scenario under `output_root`, stopping at the first failing step.
	pub fn build(&self, output_root: &Path) -> Result<ScenarioHandle> {
		let handle = builder::init_scenario(output_root, &self.name, self.marker)?;
		for link in &self.links {
			builder::add_nested_escape_link(&handle, &link.parent, &link.link_name, link.escape_depth)?;
		}
		Ok(handle)
	}
}

/// A symlink in the output root whose target is a scenario's directory name.
#[derive(Clone, Debug, Eq, Hash, PartialEq, derive_new::new)]
pub struct Alias {
	pub name: String,
	pub target_scenario: String,
}

impl Alias {
	pub fn build(&self, output_root: &Path) -> Result<PathBuf> {
		builder::add_alias_link(output_root, &self.name, &self.target_scenario)
	}
}

/// Everything one run should create. Scenarios are built first, in order, then aliases.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Catalog {
	pub scenarios: Vec<Scenario>,
	pub aliases: Vec<Alias>,
}

impl Catalog {
	/// The documented set the command line produces.
	///
	/// - `nested-breakout/hide/breakout -> ../..`, the escape hidden one directory deep
	/// - `immediate-breakout/breakout -> ..`, the escape directly at the root
	/// - `alias-to-nested -> nested-breakout`, a second layer of indirection in front of the first
	pub fn default_set() -> Self {
		Self {
			scenarios: vec![
				Scenario::new(NESTED_BREAKOUT).with_link(LinkSpec::nested(HIDE_DIR, BREAKOUT_LINK)),
				Scenario::new(IMMEDIATE_BREAKOUT).with_link(LinkSpec::root_level(BREAKOUT_LINK)),
			],
			aliases: vec![Alias::new(ALIAS_TO_NESTED.to_owned(), NESTED_BREAKOUT.to_owned())],
		}
	}

	/// Use `marker` for every scenario.
	pub fn with_marker(mut self, marker: RootMarker) -> Self {
		for scenario in &mut self.scenarios {
			scenario.marker = marker;
		}
		self
	}

	/// Names of all entries, in build order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.scenarios.iter().map(|s| s.name.as_str()).chain(self.aliases.iter().map(|a| a.name.as_str()))
	}

	/// Every scenario and alias lands in the same directory, so their names must not collide.
	pub fn validate(&self) -> Result<()> {
		let mut seen = HashSet::new();
		for name in self.names() {
			if !seen.insert(name) {
				return Err(FixtureError::DuplicateName { name: name.to_owned() });
			}
		}
		Ok(())
	}
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GenerateOptions {
	/// Continue with the remaining scenarios after an I/O failure instead of stopping the run.
	pub keep_going: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutcomeKind {
	Scenario,
	Alias,
}

#[derive(Debug)]
pub enum Status {
	/// Built; holds the scenario root or alias path.
	Built(PathBuf),
	Failed(FixtureError),
	/// Not attempted because an earlier failure ended the run.
	Skipped,
}

#[derive(Debug)]
pub struct ScenarioOutcome {
	pub name: String,
	pub kind: OutcomeKind,
	pub status: Status,
}

impl ScenarioOutcome {
	pub fn is_built(&self) -> bool {
		matches!(self.status, Status::Built(_))
	}

	pub fn error(&self) -> Option<&FixtureError> {
		match &self.status {
			Status::Failed(e) => Some(e),
			_ => None,
		}
	}
}

/// What happened to every catalog entry, in build order.
#[derive(Debug, Default)]
pub struct GenerationReport {
	pub outcomes: Vec<ScenarioOutcome>,
}

impl GenerationReport {
	pub fn is_success(&self) -> bool {
		self.outcomes.iter().all(ScenarioOutcome::is_built)
	}

	/// Entries that failed or were skipped.
	pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
		self.outcomes.iter().filter(|o| !o.is_built())
	}

	pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
		self.outcomes.iter().find(|o| o.name == name)
	}
}

impl fmt::Display for GenerationReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for outcome in &self.outcomes {
			let kind = match outcome.kind {
				OutcomeKind::Scenario => "scenario",
				OutcomeKind::Alias => "alias",
			};
			match &outcome.status {
				Status::Built(path) => writeln!(f, "{kind} {}: ok ({})", outcome.name, path.display())?,
				Status::Failed(e) => writeln!(f, "{kind} {}: FAILED: {e}", outcome.name)?,
				Status::Skipped => writeln!(f, "{kind} {}: skipped", outcome.name)?,
			}
		}
		Ok(())
	}
}

/// Build `catalog` under `output_root`.
///
/// Only an invalid catalog is returned as `Err`; construction failures are recorded per entry in the report.
pub fn generate(output_root: &Path, catalog: &Catalog, options: &GenerateOptions) -> Result<GenerationReport> {
	catalog.validate()?;

	let steps = catalog
		.scenarios
		.iter()
		.map(|s| (s.name.as_str(), OutcomeKind::Scenario, Step::Scenario(s)))
		.chain(catalog.aliases.iter().map(|a| (a.name.as_str(), OutcomeKind::Alias, Step::Alias(a))));

	let mut report = GenerationReport::default();
	let mut aborted = false;
	for (name, kind, step) in steps {
		let status = if aborted {
			Status::Skipped
		} else {
			match step.run(output_root) {
				Ok(path) => {
					info!(name, path = %path.display(), "built");
					Status::Built(path)
				}
				Err(e) => {
					warn!(name, error = %e, "failed");
					if e.is_fatal_to_run() && !options.keep_going {
						aborted = true;
					}
					Status::Failed(e)
				}
			}
		};
		report.outcomes.push(ScenarioOutcome { name: name.to_owned(), kind, status });
	}
	Ok(report)
}

enum Step<'a> {
	Scenario(&'a Scenario),
	Alias(&'a Alias),
}

impl Step<'_> {
	fn run(&self, output_root: &Path) -> Result<PathBuf> {
		match self {
			Step::Scenario(s) => s.build(output_root).map(|h| h.root),
			Step::Alias(a) => a.build(output_root),
		}
	}
}
