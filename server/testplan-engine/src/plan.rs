//! Assemble the test plan: pick a build per target requirement, apply pruning
//! and oneof/only selection, resolve criticality.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::config::{BuildKeying, Config};
use crate::error::EngineError;
use crate::pruner::PruneResult;
use crate::rules::{
  HwTestSuiteType, PerTargetTestRequirements, TargetCriteria, TargetTestRequirementsConfig,
  TestSuite,
};
use crate::suite_sort::{self, SuiteKey, TargetBuild};
use crate::types::{BuildId, BuildRecord, BuildStatus, TestPlan, TestUnit, TestUnitCommon};

/// Builds that can be tested at all: a build target, test artifacts, not pointless.
fn eligible_builds<'a>(builds: &'a [BuildRecord], config: &Config) -> Vec<&'a BuildRecord> {
  builds
    .iter()
    .filter(|b| {
      let builder = b.builder_name.as_str();
      if b.build_target.as_deref().unwrap_or_default().is_empty() {
        warn!(builder, "filtering out build without a build target");
        false
      } else if b.pointless_build {
        info!(builder, "filtering out build marked as pointless");
        false
      } else if !b.has_test_artifacts(&config.test_artifact_types) {
        info!(builder, "filtering out build with missing test artifacts");
        false
      } else {
        true
      }
    })
    .collect()
}

fn matches_criteria(build: &BuildRecord, criteria: &TargetCriteria, keying: BuildKeying) -> bool {
  if build.build_target.as_deref() != Some(criteria.build_target.as_str()) {
    return false;
  }
  match (keying, &criteria.builder_name) {
    (BuildKeying::TargetAndBuilder, Some(builder)) => &build.builder_name == builder,
    _ => true,
  }
}

/// First successful eligible build for the criteria, in caller order.
pub fn select_build<'a>(
  criteria: &TargetCriteria,
  eligible: &[&'a BuildRecord],
  keying: BuildKeying,
) -> Option<&'a BuildRecord> {
  let mut candidates = eligible
    .iter()
    .copied()
    .filter(|b| matches_criteria(b, criteria, keying))
    .peekable();
  if candidates.peek().is_none() {
    debug!(build_target = %criteria.build_target, "no build found for target criteria");
    return None;
  }
  let chosen = candidates.find(|b| b.status == BuildStatus::Success);
  if chosen.is_none() {
    info!(build_target = %criteria.build_target, "can't test build target because all builders failed");
  }
  chosen
}

/// Drop whole test configurations the prune result rules out for this target.
fn prune_categories(
  reqs: &PerTargetTestRequirements,
  prune: &PruneResult,
  id: &BuildId,
) -> PerTargetTestRequirements {
  let mut reqs = reqs.clone();
  let build_target = id.build_target.as_str();

  if reqs.hw_test_cfg.is_some() {
    if prune.disable_hw_tests {
      info!(build_target, "no HW testing needed");
      reqs.hw_test_cfg = None;
    } else if prune.skips_hw_for_target(build_target) {
      info!(build_target, "using only-test rule to skip HW testing");
      reqs.hw_test_cfg = None;
    } else if prune.disable_non_tast_tests {
      info!(build_target, "pruning non-Tast HW tests");
      if let Some(hw) = reqs.hw_test_cfg.as_mut() {
        hw.retain(|t| t.hw_test_suite_type == HwTestSuiteType::Tast);
      }
    }
  }
  if reqs.vm_test_cfg.is_some() && (prune.disable_vm_tests || prune.disable_non_tast_tests) {
    info!(build_target, "no VM testing needed");
    reqs.vm_test_cfg = None;
  }
  if reqs.moblab_vm_test_cfg.is_some() && prune.disable_non_tast_tests {
    info!(build_target, "pruning Moblab tests due to non-Tast rule");
    reqs.moblab_vm_test_cfg = None;
  }
  reqs
}

/// Per-suite selection state shared across all targets.
struct Selection<'a> {
  prune: &'a PruneResult,
  representatives: BTreeSet<SuiteKey>,
}

impl Selection<'_> {
  fn keep<S: TestSuite>(&self, suite: &S, id: &BuildId) -> bool {
    let common = suite.common();
    if self.prune.must_add_for_also_rule(&common.test_suite_groups) {
      debug!(suite = %common.display_name, "kept by also-test rule");
      return true;
    }
    if self.prune.group_rules_active() {
      let key = SuiteKey {
        build: id.clone(),
        kind: S::KIND,
        display_name: common.display_name.clone(),
      };
      let keep = self.representatives.contains(&key) || self.prune.in_only_group(&common.test_suite_groups);
      if !keep {
        debug!(suite = %common.display_name, build = %id, "pruned by oneof/only rule");
      }
      return keep;
    }
    !common.disable_by_default
  }

  /// Kept suites with criticality resolved against the build.
  fn select<S: TestSuite>(&self, suites: Option<&Vec<S>>, id: &BuildId, build_critical: bool) -> Vec<S> {
    suites
      .into_iter()
      .flatten()
      .filter(|s| self.keep(*s, id))
      .cloned()
      .map(|mut s| {
        let common = s.common_mut();
        let critical = build_critical && common.critical.unwrap_or(true);
        if !critical {
          debug!(suite = %common.display_name, "marking as not critical");
        }
        common.critical = Some(critical);
        s
      })
      .collect()
  }
}

fn push_unit<S>(units: &mut Vec<TestUnit<S>>, common: &TestUnitCommon, suites: Vec<S>) {
  if !suites.is_empty() {
    units.push(TestUnit {
      common: common.clone(),
      suites,
    });
  }
}

/// Build the test plan for this run.
pub fn create_test_plan(
  requirements: &TargetTestRequirementsConfig,
  builds: &[BuildRecord],
  prune: &PruneResult,
  config: &Config,
) -> Result<TestPlan, EngineError> {
  let eligible = eligible_builds(builds, config);

  let mut targets: Vec<TargetBuild<'_>> = Vec::new();
  for (i, pttr) in requirements.per_target_test_requirements.iter().enumerate() {
    let criteria = pttr
      .target_criteria
      .as_ref()
      .filter(|c| !c.build_target.is_empty())
      .ok_or_else(|| {
        EngineError::validation(
          &format!("per_target_test_requirements[{}].target_criteria", i),
          "missing build target",
        )
      })?;
    let Some(build) = select_build(criteria, &eligible, config.build_keying) else {
      continue;
    };
    let id = BuildId {
      build_target: criteria.build_target.clone(),
      builder_name: build.builder_name.clone(),
    };
    let requirements = prune_categories(pttr, prune, &id);
    targets.push(TargetBuild {
      id,
      build,
      requirements,
    });
  }

  let groups = suite_sort::group_and_sort(&targets, config);
  let selection = Selection {
    prune,
    representatives: suite_sort::representatives(&groups, &prune.oneof_test_groups),
  };

  let mut plan = TestPlan::default();
  for target in &targets {
    let build_payload = target.build.artifacts.clone().ok_or_else(|| {
      EngineError::validation(&format!("builds[{}].artifacts", target.id.builder_name), "missing")
    })?;
    let common = TestUnitCommon {
      build_target: target.id.build_target.clone(),
      builder_name: target.id.builder_name.clone(),
      build_payload,
    };
    let reqs = &target.requirements;
    let id = &target.id;
    let critical = target.build.critical;

    push_unit(
      &mut plan.hw_test_units,
      &common,
      selection.select(reqs.hw_test_cfg.as_ref(), id, critical),
    );
    push_unit(
      &mut plan.vm_test_units,
      &common,
      selection.select(reqs.vm_test_cfg.as_ref(), id, critical),
    );
    push_unit(
      &mut plan.tast_vm_test_units,
      &common,
      selection.select(reqs.tast_vm_test_cfg.as_ref(), id, critical),
    );
    push_unit(
      &mut plan.moblab_vm_test_units,
      &common,
      selection.select(reqs.moblab_vm_test_cfg.as_ref(), id, critical),
    );
  }

  info!(
    hw = plan.hw_test_units.len(),
    vm = plan.vm_test_units.len(),
    tast_vm = plan.tast_vm_test_units.len(),
    moblab_vm = plan.moblab_vm_test_units.len(),
    "assembled test plan"
  );
  if plan.is_empty() {
    info!("no test units scheduled for this run");
  }
  Ok(plan)
}
