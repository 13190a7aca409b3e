//! Engine facade: one entry point per decision, sharing the path mapping step.

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::error::EngineError;
use crate::irrelevance::IrrelevanceFilter;
use crate::paths;
use crate::plan;
use crate::pointless;
use crate::pruner;
use crate::relevance::{self, RelevancePredicate};
use crate::rules::{BuildIrrelevanceConfig, RelevanceConfig, SourceTreeTestConfig, TargetTestRequirementsConfig};
use crate::skipper::{self, BuildSkipResponse, BuilderConfig};
use crate::types::{BuildRecord, ChangeReference, ChangeRevisions, PointlessBuildVerdict, SourceRootMapping, TestPlan};

/// The changes under test plus what is needed to resolve them to paths.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeInputs {
  #[serde(default)]
  pub gerrit_changes: Vec<ChangeReference>,
  #[serde(default)]
  pub change_revisions: ChangeRevisions,
  #[serde(default)]
  pub source_roots: SourceRootMapping,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointlessCheckRequest {
  pub builder_name: String,
  #[serde(flatten)]
  pub changes: ChangeInputs,
  #[serde(default)]
  pub build_irrelevance: BuildIrrelevanceConfig,
  #[serde(default)]
  pub relevance: Option<RelevanceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestPlanRequest {
  #[serde(flatten)]
  pub changes: ChangeInputs,
  #[serde(default)]
  pub source_tree_config: SourceTreeTestConfig,
  #[serde(default)]
  pub target_test_requirements: TargetTestRequirementsConfig,
  #[serde(default)]
  pub builds: Vec<BuildRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSkipRequest {
  pub builders: Vec<BuilderConfig>,
  #[serde(flatten)]
  pub changes: ChangeInputs,
  #[serde(default)]
  pub build_irrelevance: BuildIrrelevanceConfig,
}

/// Stateless decision engine. Every call is a pure function of its request and the config.
pub struct Engine {
  config: Config,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  fn affected_paths(&self, changes: &ChangeInputs) -> Result<Vec<String>, EngineError> {
    paths::affected_paths(
      &changes.gerrit_changes,
      &changes.change_revisions,
      &changes.source_roots,
      self.config.unmapped_projects,
    )
  }

  /// Decide whether a builder's run is pointless for the changes under test.
  pub fn check_build(&self, req: &PointlessCheckRequest) -> Result<PointlessBuildVerdict, EngineError> {
    let irrelevance = IrrelevanceFilter::new(&req.build_irrelevance.irrelevant_file_patterns)?;
    let affected = self.affected_paths(&req.changes)?;
    let relevant = req
      .relevance
      .as_ref()
      .map(|cfg| relevance::from_config(cfg, &self.config.dep_source_path_prefix));
    let verdict = pointless::classify(
      &req.builder_name,
      &affected,
      &irrelevance,
      relevant.as_ref().map(|r| r as &dyn RelevancePredicate),
    );
    info!(builder = %req.builder_name, pointless = verdict.build_is_pointless, "pointless check done");
    Ok(verdict)
  }

  /// Produce the test plan for this run's builds.
  pub fn generate_test_plan(&self, req: &TestPlanRequest) -> Result<TestPlan, EngineError> {
    let affected = self.affected_paths(&req.changes)?;
    let prune = pruner::extract_prune_result(&req.source_tree_config, &affected)?;
    plan::create_test_plan(&req.target_test_requirements, &req.builds, &prune, &self.config)
  }

  /// Partition builders into those that must run and those that can be skipped.
  pub fn check_builders(&self, req: &BuildSkipRequest) -> Result<BuildSkipResponse, EngineError> {
    let irrelevance = IrrelevanceFilter::new(&req.build_irrelevance.irrelevant_file_patterns)?;
    let affected = self.affected_paths(&req.changes)?;
    skipper::check_builders(&req.builders, &affected, &irrelevance)
  }
}
