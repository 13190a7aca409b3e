//! Group suites by their test-group tags and order each group by scheduling preference.
//!
//! The head of each group is the suite a oneof rule schedules: critical before
//! non-critical, VM before hardware, least-oversubscribed board first.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::rules::{PerTargetTestRequirements, TestKind, TestSuite, TestSuiteCommon};
use crate::types::{BuildId, BuildRecord};

/// A build chosen for testing, with the test requirements that still apply to it.
#[derive(Debug, Clone)]
pub struct TargetBuild<'a> {
  pub id: BuildId,
  pub build: &'a BuildRecord,
  pub requirements: PerTargetTestRequirements,
}

/// Identity of one suite within the plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SuiteKey {
  pub build: BuildId,
  pub kind: TestKind,
  pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct GroupedSuite<'a> {
  pub build: &'a BuildId,
  pub build_critical: bool,
  pub kind: TestKind,
  pub board: &'a str,
  pub common: &'a TestSuiteCommon,
}

impl GroupedSuite<'_> {
  pub fn key(&self) -> SuiteKey {
    SuiteKey {
      build: self.build.clone(),
      kind: self.kind,
      display_name: self.common.display_name.clone(),
    }
  }

  /// An unset flag inherits the build's criticality.
  fn suite_critical(&self) -> bool {
    self.common.critical.unwrap_or(self.build_critical)
  }
}

pub type SuiteGroups<'a> = BTreeMap<String, Vec<GroupedSuite<'a>>>;

/// Strict total order over suites sharing a group; `Less` means "schedule first".
pub fn compare(a: &GroupedSuite<'_>, b: &GroupedSuite<'_>, config: &Config) -> Ordering {
  b.suite_critical()
    .cmp(&a.suite_critical())
    .then_with(|| b.build_critical.cmp(&a.build_critical))
    .then_with(|| b.kind.is_vm().cmp(&a.kind.is_vm()))
    .then_with(|| {
      if a.kind.is_vm() || b.kind.is_vm() {
        Ordering::Equal
      } else {
        config
          .board_priority(a.board)
          .cmp(&config.board_priority(b.board))
      }
    })
    .then_with(|| a.common.display_name.cmp(&b.common.display_name))
    .then_with(|| a.build.cmp(b.build))
    .then_with(|| a.kind.cmp(&b.kind))
}

fn collect<'a, S: TestSuite>(
  target: &'a TargetBuild<'_>,
  suites: Option<&'a Vec<S>>,
  groups: &mut SuiteGroups<'a>,
) {
  for suite in suites.into_iter().flatten() {
    let common = suite.common();
    for group in &common.test_suite_groups {
      groups.entry(group.clone()).or_default().push(GroupedSuite {
        build: &target.id,
        build_critical: target.build.critical,
        kind: S::KIND,
        board: suite.board(&target.id.build_target),
        common,
      });
    }
  }
}

/// Bucket every suite of every target by group tag, then sort each bucket.
pub fn group_and_sort<'a>(targets: &'a [TargetBuild<'_>], config: &Config) -> SuiteGroups<'a> {
  let mut groups = SuiteGroups::new();
  for target in targets {
    let reqs = &target.requirements;
    collect(target, reqs.hw_test_cfg.as_ref(), &mut groups);
    collect(target, reqs.vm_test_cfg.as_ref(), &mut groups);
    collect(target, reqs.tast_vm_test_cfg.as_ref(), &mut groups);
    collect(target, reqs.moblab_vm_test_cfg.as_ref(), &mut groups);
  }
  for suites in groups.values_mut() {
    suites.sort_by(|a, b| compare(a, b, config));
  }
  groups
}

/// Heads of the named groups: the one suite each oneof rule keeps.
pub fn representatives<'g>(
  groups: &SuiteGroups<'_>,
  names: impl IntoIterator<Item = &'g String>,
) -> BTreeSet<SuiteKey> {
  names
    .into_iter()
    .filter_map(|name| groups.get(name)?.first())
    .map(GroupedSuite::key)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::{HwTest, HwTestSuiteType, TastVmTest};
  use crate::types::BuildStatus;

  fn config() -> Config {
    Config {
      board_priorities: [("ocean", -100), ("coral", -6), ("sarien", 2), ("eve", 5)]
        .into_iter()
        .map(|(b, p)| (b.to_string(), p))
        .collect(),
      ..Config::default()
    }
  }

  fn record(builder: &str, critical: bool) -> BuildRecord {
    BuildRecord {
      builder_name: builder.into(),
      build_target: None,
      status: BuildStatus::Success,
      critical,
      pointless_build: false,
      artifacts: None,
    }
  }

  fn common(name: &str, critical: bool, groups: &[&str]) -> TestSuiteCommon {
    TestSuiteCommon {
      display_name: name.into(),
      critical: Some(critical),
      disable_by_default: false,
      test_suite_groups: groups.iter().map(|g| g.to_string()).collect(),
    }
  }

  fn hw_target<'a>(
    record: &'a BuildRecord,
    target: &str,
    board: &str,
    critical_suite: bool,
    groups: &[&str],
  ) -> TargetBuild<'a> {
    TargetBuild {
      id: BuildId {
        build_target: target.into(),
        builder_name: record.builder_name.clone(),
      },
      build: record,
      requirements: PerTargetTestRequirements {
        hw_test_cfg: Some(vec![HwTest {
          common: common(&format!("{}.bvt-tast-cq", record.builder_name), critical_suite, groups),
          skylab_board: board.into(),
          suite: "bvt-tast-cq".into(),
          hw_test_suite_type: HwTestSuiteType::Tast,
        }]),
        ..Default::default()
      },
    }
  }

  fn vm_target<'a>(record: &'a BuildRecord, target: &str, critical_suite: bool, groups: &[&str]) -> TargetBuild<'a> {
    TargetBuild {
      id: BuildId {
        build_target: target.into(),
        builder_name: record.builder_name.clone(),
      },
      build: record,
      requirements: PerTargetTestRequirements {
        tast_vm_test_cfg: Some(vec![TastVmTest {
          common: common(&format!("{}.bvt-tast-vm-cq", record.builder_name), critical_suite, groups),
          suite_name: "bvt-tast-vm-cq".into(),
          tast_test_expr: vec![],
        }]),
        ..Default::default()
      },
    }
  }

  fn names(suites: &[GroupedSuite<'_>]) -> Vec<String> {
    suites.iter().map(|s| s.common.display_name.clone()).collect()
  }

  #[test]
  fn sort_order_prefers_critical_vm_then_quiet_boards() {
    let coral_arc = record("coral-arc-r-cq", true);
    let sarien = record("sarien-cq", true);
    let ocean = record("ocean-cq", true);
    let ocean_bark = record("ocean-bark-r-cq", false);
    let coral = record("coral-cq", true);
    let betty_arc = record("betty-arc-b-cq", true);
    let betty_shark = record("betty-shark-cq", true);

    let targets = vec![
      hw_target(&coral_arc, "coral-arc-r", "coral", true, &["group 1", "group 5"]),
      hw_target(&sarien, "sarien", "sarien", true, &["group 1"]),
      hw_target(&ocean, "ocean", "ocean", false, &["group 1"]),
      hw_target(&ocean_bark, "ocean-bark-r", "ocean", true, &["group 1"]),
      hw_target(&coral, "coral", "coral", true, &["group 1"]),
      vm_target(&betty_arc, "betty", true, &["group 1"]),
      vm_target(&betty_shark, "betty", false, &["group 1"]),
    ];
    let groups = group_and_sort(&targets, &config());

    assert_eq!(names(&groups["group 5"]), vec!["coral-arc-r-cq.bvt-tast-cq"]);
    assert_eq!(
      names(&groups["group 1"]),
      vec![
        "betty-arc-b-cq.bvt-tast-vm-cq",
        "coral-arc-r-cq.bvt-tast-cq",
        "coral-cq.bvt-tast-cq",
        "sarien-cq.bvt-tast-cq",
        "ocean-bark-r-cq.bvt-tast-cq",
        "betty-shark-cq.bvt-tast-vm-cq",
        "ocean-cq.bvt-tast-cq",
      ]
    );
  }

  #[test]
  fn unlisted_board_sits_between_negative_and_positive_scores() {
    let a = record("a-cq", true);
    let b = record("b-cq", true);
    let c = record("c-cq", true);
    let targets = vec![
      hw_target(&a, "eve", "eve", true, &["g"]),
      hw_target(&b, "kevin", "kevin", true, &["g"]),
      hw_target(&c, "coral", "coral", true, &["g"]),
    ];
    let groups = group_and_sort(&targets, &config());
    assert_eq!(
      names(&groups["g"]),
      vec!["c-cq.bvt-tast-cq", "b-cq.bvt-tast-cq", "a-cq.bvt-tast-cq"]
    );
  }

  #[test]
  fn comparator_is_a_strict_total_order() {
    let builds: Vec<BuildRecord> = (0..6).map(|i| record(&format!("b{}", i % 3), i % 2 == 0)).collect();
    let mut targets = Vec::new();
    for (i, b) in builds.iter().enumerate() {
      if i % 2 == 0 {
        targets.push(hw_target(b, &format!("t{}", i), ["coral", "eve", "kevin"][i % 3], i % 3 != 0, &["g"]));
      } else {
        targets.push(vm_target(b, &format!("t{}", i), i % 3 != 0, &["g"]));
      }
    }
    let config = config();
    let groups = group_and_sort(&targets, &config);
    let suites = &groups["g"];

    for a in suites {
      assert_eq!(compare(a, a, &config), Ordering::Equal);
      for b in suites {
        if a.key() != b.key() {
          assert_ne!(compare(a, b, &config), Ordering::Equal);
          assert_eq!(compare(a, b, &config), compare(b, a, &config).reverse());
        }
        for c in suites {
          if compare(a, b, &config) == Ordering::Less && compare(b, c, &config) == Ordering::Less {
            assert_eq!(compare(a, c, &config), Ordering::Less);
          }
        }
      }
    }

    let mut resorted = suites.clone();
    resorted.sort_by(|a, b| compare(a, b, &config));
    assert_eq!(names(&resorted), names(suites));
  }

  #[test]
  fn unset_suite_criticality_follows_the_build() {
    let eve = record("eve-cq", true);
    let coral = record("coral-cq", false);
    let mut coral_target = hw_target(&coral, "coral", "coral", true, &["g"]);
    if let Some(hw) = coral_target.requirements.hw_test_cfg.as_mut() {
      hw[0].common.critical = None;
    }
    let targets = vec![hw_target(&eve, "eve", "eve", false, &["g"]), coral_target];
    let groups = group_and_sort(&targets, &config());

    assert_eq!(names(&groups["g"]), vec!["eve-cq.bvt-tast-cq", "coral-cq.bvt-tast-cq"]);
    let reps = representatives(&groups, &["g".to_string()]);
    assert_eq!(reps.iter().next().unwrap().build.build_target, "eve");
  }

  #[test]
  fn representatives_are_group_heads() {
    let a = record("a-cq", true);
    let b = record("b-cq", true);
    let targets = vec![
      hw_target(&a, "eve", "eve", true, &["g"]),
      vm_target(&b, "betty", true, &["g"]),
    ];
    let groups = group_and_sort(&targets, &config());
    let wanted = vec!["g".to_string(), "missing".to_string()];
    let reps = representatives(&groups, &wanted);
    assert_eq!(reps.len(), 1);
    let head = reps.iter().next().unwrap();
    assert_eq!(head.kind, TestKind::TastVm);
    assert_eq!(head.build.build_target, "betty");
  }
}
