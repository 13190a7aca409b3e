//! Core types for the test-plan engine (JSON contracts + internal models).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EngineError;
use crate::rules::{HwTest, MoblabVmTest, TastVmTest, VmTest};

// ---------------------------------------------------------------------------
// Changes under test
// ---------------------------------------------------------------------------

/// Identity of one code-review patchset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeReference {
  pub host: String,
  pub change: u64,
  pub patchset: u32,
}

impl fmt::Display for ChangeReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "https://{}/{}/{}", self.host, self.change, self.patchset)
  }
}

/// Resolved metadata for one patchset. File paths are project-relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRevision {
  #[serde(flatten)]
  pub reference: ChangeReference,
  pub project: String,
  #[serde(default)]
  pub branch: Option<String>,
  #[serde(default)]
  pub files: Vec<String>,
}

/// Revision lookup keyed by `ChangeReference`. Deserializes from a plain list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Vec<ChangeRevision>")]
pub struct ChangeRevisions {
  by_ref: BTreeMap<ChangeReference, ChangeRevision>,
}

impl From<Vec<ChangeRevision>> for ChangeRevisions {
  fn from(revisions: Vec<ChangeRevision>) -> Self {
    Self {
      by_ref: revisions
        .into_iter()
        .map(|rev| (rev.reference.clone(), rev))
        .collect(),
    }
  }
}

impl ChangeRevisions {
  pub fn get(&self, change: &ChangeReference) -> Result<&ChangeRevision, EngineError> {
    self
      .by_ref
      .get(change)
      .ok_or_else(|| EngineError::UnknownRevision {
        host: change.host.clone(),
        change: change.change,
        patchset: change.patchset,
      })
  }
}

/// Source roots for one project: either a single root, or one per branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectRoots {
  Root(String),
  ByBranch(BTreeMap<String, String>),
}

/// Project (or project + branch) to source-tree-relative root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRootMapping {
  projects: BTreeMap<String, ProjectRoots>,
}

impl SourceRootMapping {
  pub fn insert_root(&mut self, project: impl Into<String>, root: impl Into<String>) {
    self.projects.insert(project.into(), ProjectRoots::Root(root.into()));
  }

  pub fn insert_branch_root(
    &mut self,
    project: impl Into<String>,
    branch: impl Into<String>,
    root: impl Into<String>,
  ) {
    let entry = self
      .projects
      .entry(project.into())
      .or_insert_with(|| ProjectRoots::ByBranch(BTreeMap::new()));
    match entry {
      ProjectRoots::ByBranch(branches) => {
        branches.insert(branch.into(), root.into());
      }
      ProjectRoots::Root(_) => {
        let mut branches = BTreeMap::new();
        branches.insert(branch.into(), root.into());
        *entry = ProjectRoots::ByBranch(branches);
      }
    }
  }

  /// Branch-scoped projects need a branch; single-root projects ignore it.
  pub fn lookup(&self, project: &str, branch: Option<&str>) -> Option<&str> {
    match self.projects.get(project)? {
      ProjectRoots::Root(root) => Some(root.as_str()),
      ProjectRoots::ByBranch(branches) => branches.get(branch?).map(String::as_str),
    }
  }
}

// ---------------------------------------------------------------------------
// Builds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
  Scheduled,
  Started,
  Success,
  Failure,
  InfraFailure,
  Canceled,
}

/// Where a build's artifacts live, plus the files it produced per artifact type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifacts {
  pub gs_bucket: String,
  pub gs_path: String,
  #[serde(default)]
  pub files_by_artifact: BTreeMap<String, Vec<String>>,
}

/// One build produced in this run, as reported by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
  pub builder_name: String,
  #[serde(default)]
  pub build_target: Option<String>,
  pub status: BuildStatus,
  #[serde(default = "default_true")]
  pub critical: bool,
  /// Set when the builder itself decided it was pointless and terminated early.
  #[serde(default)]
  pub pointless_build: bool,
  #[serde(default)]
  pub artifacts: Option<BuildArtifacts>,
}

fn default_true() -> bool {
  true
}

impl BuildRecord {
  pub fn has_test_artifacts(&self, test_artifact_types: &[String]) -> bool {
    match &self.artifacts {
      Some(art) => test_artifact_types
        .iter()
        .any(|t| art.files_by_artifact.contains_key(t)),
      None => false,
    }
  }
}

/// Target identity of a build: build target plus the builder that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildId {
  pub build_target: String,
  pub builder_name: String,
}

impl fmt::Display for BuildId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.build_target, self.builder_name)
  }
}

// ---------------------------------------------------------------------------
// Pointless-build verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointlessBuildReason {
  #[default]
  None,
  IrrelevantToKnownNonBuildDirectories,
  IrrelevantToDependencyGraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointlessBuildVerdict {
  pub build_is_pointless: bool,
  pub pointless_build_reason: PointlessBuildReason,
}

impl PointlessBuildVerdict {
  pub fn necessary() -> Self {
    Self {
      build_is_pointless: false,
      pointless_build_reason: PointlessBuildReason::None,
    }
  }

  pub fn pointless(reason: PointlessBuildReason) -> Self {
    Self {
      build_is_pointless: true,
      pointless_build_reason: reason,
    }
  }
}

// ---------------------------------------------------------------------------
// Test plan (JSON contract, what we emit)
// ---------------------------------------------------------------------------

/// Build identity and artifact payload shared by every unit of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestUnitCommon {
  pub build_target: String,
  pub builder_name: String,
  pub build_payload: BuildArtifacts,
}

/// One test configuration scheduled against one build, with resolved criticality.
#[derive(Debug, Clone, Serialize)]
pub struct TestUnit<S> {
  pub common: TestUnitCommon,
  pub suites: Vec<S>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TestPlan {
  pub hw_test_units: Vec<TestUnit<HwTest>>,
  pub vm_test_units: Vec<TestUnit<VmTest>>,
  pub tast_vm_test_units: Vec<TestUnit<TastVmTest>>,
  pub moblab_vm_test_units: Vec<TestUnit<MoblabVmTest>>,
}

impl TestPlan {
  pub fn is_empty(&self) -> bool {
    self.hw_test_units.is_empty()
      && self.vm_test_units.is_empty()
      && self.tast_vm_test_units.is_empty()
      && self.moblab_vm_test_units.is_empty()
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for a failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn source_roots_parse_flat_and_branch_scoped() {
    let roots: SourceRootMapping = serde_json::from_str(
      r#"{
        "chromiumos/public/example": "src/pub/ex",
        "chromiumos/internal/example": {"refs/heads/main": "src/internal/ex"}
      }"#,
    )
    .unwrap();

    assert_eq!(roots.lookup("chromiumos/public/example", None), Some("src/pub/ex"));
    assert_eq!(
      roots.lookup("chromiumos/public/example", Some("refs/heads/any")),
      Some("src/pub/ex")
    );
    assert_eq!(
      roots.lookup("chromiumos/internal/example", Some("refs/heads/main")),
      Some("src/internal/ex")
    );
    assert_eq!(roots.lookup("chromiumos/internal/example", None), None);
    assert_eq!(roots.lookup("chromiumos/internal/example", Some("refs/heads/other")), None);
    assert_eq!(roots.lookup("nope", None), None);
  }

  #[test]
  fn revisions_lookup_reports_missing_reference() {
    let revisions: ChangeRevisions = serde_json::from_str(
      r#"[{"host": "review.example.com", "change": 123, "patchset": 2,
           "project": "p", "files": ["a"]}]"#,
    )
    .unwrap();
    let found = ChangeReference {
      host: "review.example.com".into(),
      change: 123,
      patchset: 2,
    };
    assert_eq!(revisions.get(&found).unwrap().project, "p");

    let missing = ChangeReference {
      patchset: 3,
      ..found
    };
    let err = revisions.get(&missing).unwrap_err();
    assert!(matches!(err, EngineError::UnknownRevision { patchset: 3, .. }));
  }

  #[test]
  fn build_record_defaults_to_critical() {
    let build: BuildRecord =
      serde_json::from_str(r#"{"builder_name": "kevin-cq", "status": "SUCCESS"}"#).unwrap();
    assert!(build.critical);
    assert!(!build.pointless_build);
    assert!(!build.has_test_artifacts(&["IMAGE_ZIP".to_string()]));
  }

  #[test]
  fn verdict_serializes_reason_in_screaming_case() {
    let json = serde_json::to_string(&PointlessBuildVerdict::pointless(
      PointlessBuildReason::IrrelevantToDependencyGraph,
    ))
    .unwrap();
    assert_eq!(
      json,
      r#"{"build_is_pointless":true,"pointless_build_reason":"IRRELEVANT_TO_DEPENDENCY_GRAPH"}"#
    );
  }
}
