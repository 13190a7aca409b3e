//! Declarative rule documents: build irrelevance, relevance, source-tree test
//! restrictions and per-target test requirements.
//!
//! These arrive already fetched and parsed; the engine only validates and reads them.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Build relevance
// ---------------------------------------------------------------------------

/// Globally build-irrelevant files (docs, OWNERS, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildIrrelevanceConfig {
  #[serde(default)]
  pub irrelevant_file_patterns: Vec<String>,
}

/// The paths that can affect a builder's output: an explicit list or a dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceConfig {
  RelevantPaths(Vec<String>),
  DepGraph(DependencyGraph),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
  #[serde(default)]
  pub package_deps: Vec<PackageDepInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageDepInfo {
  #[serde(default)]
  pub package: String,
  #[serde(default)]
  pub dependency_source_paths: Vec<String>,
}

// ---------------------------------------------------------------------------
// Source-tree test restrictions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTreeTestConfig {
  #[serde(default)]
  pub source_tree_test_restriction: Vec<SourceTreeTestRestriction>,
}

/// A restriction scoped to a directory `path` or a double-star `file_pattern` (exactly one).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTreeTestRestriction {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file_pattern: Option<String>,
  #[serde(default)]
  pub test_restriction: TestRestriction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRestriction {
  pub disable_hw_tests: bool,
  pub disable_vm_tests: bool,
  pub disable_non_tast_tests: bool,
  pub only_test_build_targets: Vec<String>,
  pub oneof_test_group: Option<String>,
  pub only_test_group: Option<String>,
  pub also_test_group: Option<String>,
}

// ---------------------------------------------------------------------------
// Per-target test requirements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetTestRequirementsConfig {
  #[serde(default)]
  pub per_target_test_requirements: Vec<PerTargetTestRequirements>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCriteria {
  #[serde(default)]
  pub build_target: String,
  #[serde(default)]
  pub builder_name: Option<String>,
}

/// Test configurations declared for one build target. An absent config means "none declared".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerTargetTestRequirements {
  #[serde(default)]
  pub target_criteria: Option<TargetCriteria>,
  #[serde(default)]
  pub hw_test_cfg: Option<Vec<HwTest>>,
  #[serde(default)]
  pub vm_test_cfg: Option<Vec<VmTest>>,
  #[serde(default)]
  pub tast_vm_test_cfg: Option<Vec<TastVmTest>>,
  #[serde(default)]
  pub moblab_vm_test_cfg: Option<Vec<MoblabVmTest>>,
}

// ---------------------------------------------------------------------------
// Test suites
// ---------------------------------------------------------------------------

/// Fields every suite variant carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuiteCommon {
  pub display_name: String,
  /// `None` inherits the build's criticality.
  #[serde(default)]
  pub critical: Option<bool>,
  #[serde(default)]
  pub disable_by_default: bool,
  #[serde(default)]
  pub test_suite_groups: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
  Hw,
  Vm,
  TastVm,
  MoblabVm,
}

impl TestKind {
  pub fn is_vm(self) -> bool {
    !matches!(self, Self::Hw)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwTestSuiteType {
  #[default]
  Autotest,
  Tast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwTest {
  pub common: TestSuiteCommon,
  pub skylab_board: String,
  #[serde(default)]
  pub suite: String,
  #[serde(default)]
  pub hw_test_suite_type: HwTestSuiteType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmTest {
  pub common: TestSuiteCommon,
  #[serde(default)]
  pub suite: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TastVmTest {
  pub common: TestSuiteCommon,
  #[serde(default)]
  pub suite_name: String,
  #[serde(default)]
  pub tast_test_expr: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoblabVmTest {
  pub common: TestSuiteCommon,
  #[serde(default)]
  pub test_type: String,
}

/// Uniform access to the suite variants for pruning, grouping and assembly.
pub trait TestSuite: Clone {
  const KIND: TestKind;

  fn common(&self) -> &TestSuiteCommon;

  fn common_mut(&mut self) -> &mut TestSuiteCommon;

  /// Board used for priority sorting. VM suites run on the build target itself.
  fn board<'a>(&'a self, build_target: &'a str) -> &'a str {
    build_target
  }
}

impl TestSuite for HwTest {
  const KIND: TestKind = TestKind::Hw;

  fn common(&self) -> &TestSuiteCommon {
    &self.common
  }

  fn common_mut(&mut self) -> &mut TestSuiteCommon {
    &mut self.common
  }

  fn board<'a>(&'a self, _build_target: &'a str) -> &'a str {
    &self.skylab_board
  }
}

impl TestSuite for VmTest {
  const KIND: TestKind = TestKind::Vm;

  fn common(&self) -> &TestSuiteCommon {
    &self.common
  }

  fn common_mut(&mut self) -> &mut TestSuiteCommon {
    &mut self.common
  }
}

impl TestSuite for TastVmTest {
  const KIND: TestKind = TestKind::TastVm;

  fn common(&self) -> &TestSuiteCommon {
    &self.common
  }

  fn common_mut(&mut self) -> &mut TestSuiteCommon {
    &mut self.common
  }
}

impl TestSuite for MoblabVmTest {
  const KIND: TestKind = TestKind::MoblabVm;

  fn common(&self) -> &TestSuiteCommon {
    &self.common
  }

  fn common_mut(&mut self) -> &mut TestSuiteCommon {
    &mut self.common
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn relevance_config_is_exactly_one_shape() {
    let paths: RelevanceConfig =
      serde_json::from_str(r#"{"relevant_paths": ["src/dep/graph/path"]}"#).unwrap();
    assert!(matches!(paths, RelevanceConfig::RelevantPaths(ref p) if p.len() == 1));

    let graph: RelevanceConfig = serde_json::from_str(
      r#"{"dep_graph": {"package_deps": [{"package": "chromeos-base/foo",
          "dependency_source_paths": ["/mnt/host/source/src/foo"]}]}}"#,
    )
    .unwrap();
    assert!(matches!(graph, RelevanceConfig::DepGraph(ref g) if g.package_deps.len() == 1));

    let both = serde_json::from_str::<RelevanceConfig>(
      r#"{"relevant_paths": [], "dep_graph": {}}"#,
    );
    assert!(both.is_err());
  }

  #[test]
  fn suite_board_depends_on_variant() {
    let hw = HwTest {
      common: TestSuiteCommon::default(),
      skylab_board: "coral".into(),
      suite: "bvt-tast-cq".into(),
      hw_test_suite_type: HwTestSuiteType::Tast,
    };
    let vm = VmTest {
      common: TestSuiteCommon::default(),
      suite: "smoke".into(),
    };
    assert_eq!(hw.board("coral-arc-r"), "coral");
    assert_eq!(vm.board("betty"), "betty");
    assert!(!HwTest::KIND.is_vm());
    assert!(VmTest::KIND.is_vm());
    assert!(TastVmTest::KIND.is_vm());
  }

  #[test]
  fn missing_restriction_flags_default_to_false() {
    let r: SourceTreeTestRestriction = serde_json::from_str(
      r#"{"path": "docs", "test_restriction": {"disable_hw_tests": true}}"#,
    )
    .unwrap();
    assert!(r.test_restriction.disable_hw_tests);
    assert!(!r.test_restriction.disable_vm_tests);
    assert!(r.test_restriction.only_test_build_targets.is_empty());
    assert!(r.file_pattern.is_none());
  }
}
