//! Fixture trees for testing path-containment checkers.
//!
//! Each scenario is a marked root directory (a repository, as far as a
//! version-control walker is concerned) with a symbolic link inside it whose
//! relative target climbs out of that root. A checker pointed at the scenario
//! root should refuse to traverse through the link.
//!
//! # The default set
//!
//! ```
//! use breakout_fixtures::{Catalog, GenerateOptions, generate};
//!
//! let temp = tempfile::tempdir().unwrap();
//! let report = generate(temp.path(), &Catalog::default_set(), &GenerateOptions::default()).unwrap();
//! assert!(report.is_success());
//!
//! let nested = std::fs::read_link(temp.path().join("nested-breakout/hide/breakout")).unwrap();
//! assert_eq!(nested, std::path::Path::new("../.."));
//! let immediate = std::fs::read_link(temp.path().join("immediate-breakout/breakout")).unwrap();
//! assert_eq!(immediate, std::path::Path::new(".."));
//! ```
//!
//! # Building scenarios by hand
//!
//! ```
//! use breakout_fixtures::{builder, RootMarker};
//!
//! let temp = tempfile::tempdir().unwrap();
//! let handle = builder::init_scenario(temp.path(), "deep", RootMarker::GitSkeleton).unwrap();
//! // Three directories deep, so the target needs four `..` to leave the scenario.
//! let link = builder::add_nested_escape_link(&handle, "a/b/c", "breakout", 1).unwrap();
//! assert_eq!(std::fs::read_link(link).unwrap(), std::path::Path::new("../../../.."));
//! ```
//!
//! Generation is one synchronous pass. Nothing is rolled back on failure, and
//! re-running against a populated output root fails with
//! [`FixtureError::AlreadyExists`] instead of touching existing fixtures.

pub mod builder;
pub mod error;
pub mod marker;
pub mod scenario;
pub mod tree;

pub use builder::ScenarioHandle;
pub use error::{FixtureError, Result};
pub use marker::RootMarker;
pub use scenario::{Alias, Catalog, GenerateOptions, GenerationReport, LinkSpec, Scenario, ScenarioOutcome, Status, generate};
