//! Engine configuration with sane defaults.

use std::collections::BTreeMap;

use serde::Deserialize;

/// What the Path Mapper does with a change whose project (or branch) has no source root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedProjectPolicy {
  /// Abort the whole evaluation with `EngineError::UnmappedProject`.
  #[default]
  Fail,
  /// Drop that change's files and keep going.
  SkipChange,
}

/// How a per-target requirement is matched against build records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildKeying {
  /// A requirement that names a builder only matches builds from that builder.
  #[default]
  TargetAndBuilder,
  /// Builder names are ignored; any build of the target matches.
  TargetOnly,
}

/// Tunables for one engine instance. Callers build it once and pass it through.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Per-board lab oversubscription score. Lower is preferred; unlisted boards are 0.
  pub board_priorities: BTreeMap<String, i32>,
  pub unmapped_projects: UnmappedProjectPolicy,
  pub build_keying: BuildKeying,
  /// Artifact types whose presence makes a build eligible for testing.
  pub test_artifact_types: Vec<String>,
  /// Chroot prefix stripped from dependency-graph source paths.
  pub dep_source_path_prefix: String,
}

impl Config {
  pub fn board_priority(&self, board: &str) -> i32 {
    self.board_priorities.get(board).copied().unwrap_or(0)
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      board_priorities: [("coral", -20), ("sarien", 2), ("eve", 5)]
        .into_iter()
        .map(|(board, score)| (board.to_string(), score))
        .collect(),
      unmapped_projects: UnmappedProjectPolicy::default(),
      build_keying: BuildKeying::default(),
      test_artifact_types: [
        "AUTOTEST_FILES",
        "IMAGE_ZIP",
        "PINNED_GUEST_IMAGES",
        "TAST_FILES",
        "TEST_UPDATE_PAYLOAD",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      dep_source_path_prefix: "/mnt/host/source/".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unlisted_board_defaults_to_zero() {
    let config = Config::default();
    assert_eq!(config.board_priority("coral"), -20);
    assert_eq!(config.board_priority("kevin"), 0);
  }

  #[test]
  fn partial_json_keeps_remaining_defaults() {
    let config: Config =
      serde_json::from_str(r#"{"unmapped_projects": "skip_change", "board_priorities": {"ocean": -100}}"#)
        .unwrap();
    assert_eq!(config.unmapped_projects, UnmappedProjectPolicy::SkipChange);
    assert_eq!(config.board_priority("ocean"), -100);
    assert_eq!(config.board_priority("coral"), 0);
    assert_eq!(config.build_keying, BuildKeying::TargetAndBuilder);
    assert_eq!(config.test_artifact_types.len(), 5);
  }
}
