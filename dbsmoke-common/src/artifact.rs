//! Artifact assembly and deploy-path construction.
//!
//! An artifact is a single SOURCE-format notebook document: a header cell
//! (title + target label) followed by one cell per test fragment, with
//! cells separated by the workspace cell delimiter. Splitting by the
//! delimiter and discarding the header reproduces the original fragment
//! sequence exactly.

use crate::types::TestSpec;
use chrono::{DateTime, Utc};

/// First line of every SOURCE-format notebook document.
pub const SOURCE_HEADER: &str = "# Databricks notebook source";

/// Stable cell separator recognized by the workspace import format.
pub const CELL_DELIMITER: &str = "\n# COMMAND ----------\n";

/// Assembled deployable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    content: String,
    cell_count: usize,
}

impl Artifact {
    /// Assemble a TestSpec into a notebook document for `target`.
    ///
    /// Pure and deterministic. Cell count is always fragment count + 1
    /// (the header cell).
    pub fn assemble(spec: &TestSpec, target: &str) -> Self {
        let mut cells = Vec::with_capacity(spec.len() + 1);
        cells.push(format!(
            "{SOURCE_HEADER}\n# Deployment smoke test\n# Target: {target}"
        ));
        cells.extend(spec.fragments.iter().cloned());

        Self {
            cell_count: cells.len(),
            content: cells.join(CELL_DELIMITER),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Split the document back into cells.
    pub fn split_cells(content: &str) -> Vec<&str> {
        content.split(CELL_DELIMITER).collect()
    }
}

/// Unique-per-invocation location where the artifact is placed.
///
/// Second-granularity timestamp: two invocations for the same target in
/// the same second would collide. Not guarded here; the path stays
/// human-readable and deterministic instead of content-addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPath {
    path: String,
    timestamp: String,
}

impl DeployPath {
    pub fn new(shared_folder: &str, target: &str, now: DateTime<Utc>) -> Self {
        let timestamp = now.format("%Y%m%d-%H%M%S").to_string();
        Self {
            path: format!("{}/smoke_{}_{}", shared_folder.trim_end_matches('/'), target, timestamp),
            timestamp,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Timestamp component, reused for the run name.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl std::fmt::Display for DeployPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(fragments: &[&str]) -> TestSpec {
        TestSpec::new(fragments.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_cell_count_is_fragments_plus_header() {
        let artifact = Artifact::assemble(&spec(&["a", "b", "c"]), "dev");
        assert_eq!(artifact.cell_count(), 4);
        assert_eq!(Artifact::split_cells(artifact.content()).len(), 4);
    }

    #[test]
    fn test_round_trip_reproduces_fragments_in_order() {
        let fragments = ["print('one')", "x = 1\nassert x == 1", "print('three')"];
        let original = spec(&fragments);
        let artifact = Artifact::assemble(&original, "staging");

        let cells = Artifact::split_cells(artifact.content());
        assert_eq!(&cells[1..], &fragments);
    }

    #[test]
    fn test_header_carries_title_and_target() {
        let artifact = Artifact::assemble(&spec(&["pass"]), "prod-eu");
        let cells = Artifact::split_cells(artifact.content());
        assert!(cells[0].starts_with(SOURCE_HEADER));
        assert!(cells[0].contains("Target: prod-eu"));
    }

    #[test]
    fn test_single_fragment_round_trip() {
        let artifact = Artifact::assemble(&spec(&["only"]), "dev");
        assert_eq!(artifact.cell_count(), 2);
        let cells = Artifact::split_cells(artifact.content());
        assert_eq!(cells[1], "only");
    }

    #[test]
    fn test_deploy_path_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let path = DeployPath::new("/Shared/smoke_tests", "dev", now);
        assert_eq!(
            path.as_str(),
            "/Shared/smoke_tests/smoke_dev_20260314-092653"
        );
        assert_eq!(path.timestamp(), "20260314-092653");
    }

    #[test]
    fn test_deploy_path_trims_trailing_slash() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let path = DeployPath::new("/Shared/smoke_tests/", "dev", now);
        assert!(!path.as_str().contains("//"));
    }

    #[test]
    fn test_deploy_paths_differ_across_seconds() {
        let a = DeployPath::new(
            "/Shared/smoke_tests",
            "dev",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        );
        let b = DeployPath::new(
            "/Shared/smoke_tests",
            "dev",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap(),
        );
        assert_ne!(a, b);
    }
}
