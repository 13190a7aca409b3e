//! Source-tree test pruning: which test categories and targets the affected
//! paths let us skip for the whole run.

use std::collections::BTreeSet;
use std::fmt;

use glob::Pattern;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::irrelevance::{compile, glob_matches};
use crate::paths::has_path_prefix;
use crate::rules::{SourceTreeTestConfig, TestRestriction};

/// Test categories that a restriction can disable wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCategory {
  Hw,
  Vm,
  NonTast,
}

impl TestCategory {
  fn disabled_by(self, r: &TestRestriction) -> bool {
    match self {
      Self::Hw => r.disable_hw_tests,
      Self::Vm => r.disable_vm_tests,
      Self::NonTast => r.disable_non_tast_tests,
    }
  }
}

impl fmt::Display for TestCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Hw => "HW",
      Self::Vm => "VM",
      Self::NonTast => "non-Tast",
    })
  }
}

/// Pruning verdict shared by every build target in the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneResult {
  pub disable_hw_tests: bool,
  pub disable_vm_tests: bool,
  pub disable_non_tast_tests: bool,
  /// Empty means "no restriction".
  pub only_test_build_targets: BTreeSet<String>,
  pub oneof_test_groups: BTreeSet<String>,
  pub only_test_groups: BTreeSet<String>,
  /// Groups forced in regardless of oneof/only pruning or disable-by-default.
  pub also_test_groups: BTreeSet<String>,
}

impl PruneResult {
  /// Hardware testing is restricted to a set of targets and this one is not in it.
  pub fn skips_hw_for_target(&self, build_target: &str) -> bool {
    !self.only_test_build_targets.is_empty() && !self.only_test_build_targets.contains(build_target)
  }

  pub fn group_rules_active(&self) -> bool {
    !self.oneof_test_groups.is_empty() || !self.only_test_groups.is_empty()
  }

  pub fn in_only_group(&self, groups: &[String]) -> bool {
    groups.iter().any(|g| self.only_test_groups.contains(g))
  }

  pub fn must_add_for_also_rule(&self, groups: &[String]) -> bool {
    groups.iter().any(|g| self.also_test_groups.contains(g))
  }
}

#[derive(Debug)]
enum Scope {
  Prefix(String),
  Glob(Pattern),
}

impl Scope {
  fn covers(&self, path: &str) -> bool {
    match self {
      Self::Prefix(prefix) => has_path_prefix(path, prefix),
      Self::Glob(pattern) => glob_matches(pattern, path),
    }
  }
}

/// Restrictions with their scopes validated and compiled.
#[derive(Debug)]
pub struct Pruner<'a> {
  restrictions: Vec<(Scope, &'a TestRestriction)>,
}

impl<'a> Pruner<'a> {
  pub fn new(cfg: &'a SourceTreeTestConfig) -> Result<Self, EngineError> {
    let restrictions = cfg
      .source_tree_test_restriction
      .iter()
      .enumerate()
      .map(|(i, r)| {
        let scope = match (&r.path, &r.file_pattern) {
          (Some(path), None) => Scope::Prefix(path.clone()),
          (None, Some(pattern)) => Scope::Glob(compile(pattern)?),
          _ => {
            return Err(EngineError::validation(
              &format!("source_tree_test_restriction[{}]", i),
              "exactly one of path or file_pattern must be set",
            ))
          }
        };
        Ok((scope, &r.test_restriction))
      })
      .collect::<Result<Vec<_>, EngineError>>()?;
    Ok(Self { restrictions })
  }

  fn covering<'p>(&'p self, path: &'p str) -> impl Iterator<Item = &'a TestRestriction> + 'p {
    self
      .restrictions
      .iter()
      .filter(move |(scope, _)| scope.covers(path))
      .map(|(_, r)| *r)
  }

  /// Some covering restriction disables this category for the path.
  pub fn can_disable(&self, path: &str, category: TestCategory) -> bool {
    self.covering(path).any(|r| category.disabled_by(r))
  }

  /// The category is prunable only if every path can disable it.
  pub fn can_disable_all(&self, paths: &[String], category: TestCategory) -> bool {
    match paths.iter().find(|p| !self.can_disable(p, category)) {
      Some(blocker) => {
        info!(path = %blocker, %category, "cannot disable testing due to file");
        false
      }
      None => true,
    }
  }

  /// Union of per-path sets, discarded entirely if any path contributes nothing.
  fn all_or_nothing<F>(&self, paths: &[String], what: &str, per_path: F) -> BTreeSet<String>
  where
    F: Fn(&TestRestriction) -> Vec<String>,
  {
    let mut acc = BTreeSet::new();
    for path in paths {
      let before = acc.len();
      let mut found = false;
      for r in self.covering(path) {
        let items = per_path(r);
        found |= !items.is_empty();
        acc.extend(items);
      }
      if !found {
        info!(path = %path, what, "cannot restrict testing due to file");
        return BTreeSet::new();
      }
      debug!(path = %path, what, added = acc.len() - before, "file restricts testing");
    }
    acc
  }

  fn union<F>(&self, paths: &[String], per_path: F) -> BTreeSet<String>
  where
    F: Fn(&TestRestriction) -> Option<String>,
  {
    let per_path = &per_path;
    paths
      .iter()
      .flat_map(move |path| self.covering(path).filter_map(per_path))
      .collect()
  }
}

/// Compute the run-wide pruning verdict from the affected paths.
pub fn extract_prune_result(
  cfg: &SourceTreeTestConfig,
  affected: &[String],
) -> Result<PruneResult, EngineError> {
  let pruner = Pruner::new(cfg)?;
  if affected.is_empty() {
    // Postsubmit and other runs without review changes.
    info!("no affected files, so no tests will be skipped");
    return Ok(PruneResult::default());
  }

  let result = PruneResult {
    disable_hw_tests: pruner.can_disable_all(affected, TestCategory::Hw),
    disable_vm_tests: pruner.can_disable_all(affected, TestCategory::Vm),
    disable_non_tast_tests: pruner.can_disable_all(affected, TestCategory::NonTast),
    only_test_build_targets: pruner.all_or_nothing(affected, "only-test build targets", |r| {
      r.only_test_build_targets.clone()
    }),
    oneof_test_groups: pruner.all_or_nothing(affected, "oneof test group", |r| {
      r.oneof_test_group.iter().cloned().collect()
    }),
    only_test_groups: pruner.all_or_nothing(affected, "only test group", |r| {
      r.only_test_group.iter().cloned().collect()
    }),
    also_test_groups: pruner.union(affected, |r| r.also_test_group.clone()),
  };
  info!(
    disable_hw = result.disable_hw_tests,
    disable_vm = result.disable_vm_tests,
    disable_non_tast = result.disable_non_tast_tests,
    only_targets = ?result.only_test_build_targets,
    oneof_groups = ?result.oneof_test_groups,
    only_groups = ?result.only_test_groups,
    also_groups = ?result.also_test_groups,
    "prune result"
  );
  Ok(result)
}
