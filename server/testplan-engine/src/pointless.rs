//! Decide whether a builder's run is pointless for the changes under test.

use tracing::info;

use crate::irrelevance::IrrelevanceFilter;
use crate::relevance::RelevancePredicate;
use crate::types::{PointlessBuildReason, PointlessBuildVerdict};

/// Classify a run from its already-mapped affected paths.
///
/// Order matters: an empty change set is never pointless, then build-irrelevant
/// globs are applied, then the relevance predicate (if any).
pub fn classify(
  builder: &str,
  affected: &[String],
  irrelevance: &IrrelevanceFilter,
  relevance: Option<&dyn RelevancePredicate>,
) -> PointlessBuildVerdict {
  if affected.is_empty() {
    info!(builder, "no affected files, so this can't be a CQ run; build is necessary");
    return PointlessBuildVerdict::necessary();
  }

  let remaining = irrelevance.retain_relevant(affected);
  if remaining.is_empty() {
    info!(builder, "all files ruled out by build-irrelevant patterns");
    return PointlessBuildVerdict::pointless(PointlessBuildReason::IrrelevantToKnownNonBuildDirectories);
  }

  let remaining: Vec<&String> = match relevance {
    Some(predicate) => remaining.iter().filter(|p| predicate.is_relevant(p)).collect(),
    None => {
      info!(builder, "no relevance source provided; no files filtered by it");
      remaining.iter().collect()
    }
  };
  if remaining.is_empty() {
    info!(builder, "all files ruled out by relevant paths");
    return PointlessBuildVerdict::pointless(PointlessBuildReason::IrrelevantToDependencyGraph);
  }

  info!(builder, files = ?remaining, "build is not pointless");
  PointlessBuildVerdict::necessary()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::relevance::RelevantPaths;

  fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn filter(patterns: &[&str]) -> IrrelevanceFilter {
    IrrelevanceFilter::new(&paths(patterns)).unwrap()
  }

  #[test]
  fn empty_change_set_is_never_pointless() {
    let rel = RelevantPaths::default();
    let verdict = classify("b", &[], &filter(&["**"]), Some(&rel));
    assert_eq!(verdict, PointlessBuildVerdict::necessary());
  }

  #[test]
  fn all_irrelevant_files_make_build_pointless() {
    let verdict = classify(
      "b",
      &paths(&["src/pub/ex/chromite-maybe/someotherdir/ignore_me.txt"]),
      &filter(&["**/ignore_me.txt"]),
      None,
    );
    assert_eq!(
      verdict,
      PointlessBuildVerdict::pointless(PointlessBuildReason::IrrelevantToKnownNonBuildDirectories)
    );
  }

  #[test]
  fn irrelevance_wins_over_relevance() {
    let rel = RelevantPaths::new(paths(&["src/pub/ex/chromite-maybe"]));
    let verdict = classify(
      "b",
      &paths(&["src/pub/ex/chromite-maybe/ignore_me.txt"]),
      &filter(&["**/ignore_me.txt"]),
      Some(&rel),
    );
    assert_eq!(
      verdict.pointless_build_reason,
      PointlessBuildReason::IrrelevantToKnownNonBuildDirectories
    );
  }

  #[test]
  fn files_outside_relevant_paths_are_pointless() {
    let rel = RelevantPaths::new(paths(&["src/dep/graph/path"]));
    let verdict = classify("b", &paths(&["src/pub/ex/relevantfile"]), &filter(&[]), Some(&rel));
    assert_eq!(
      verdict,
      PointlessBuildVerdict::pointless(PointlessBuildReason::IrrelevantToDependencyGraph)
    );
  }

  #[test]
  fn one_relevant_file_makes_build_necessary() {
    let rel = RelevantPaths::new(paths(&["src/internal/ex/important_stuff"]));
    let verdict = classify(
      "b",
      &paths(&["src/internal/ex/important_stuff/important_file", "src/pub/ex/a/b/c"]),
      &filter(&[]),
      Some(&rel),
    );
    assert_eq!(verdict, PointlessBuildVerdict::necessary());
  }

  #[test]
  fn missing_relevance_source_filters_nothing() {
    let verdict = classify("b", &paths(&["src/pub/ex/a"]), &filter(&["**/*.md"]), None);
    assert_eq!(verdict, PointlessBuildVerdict::necessary());
  }

  #[test]
  fn extra_irrelevant_pattern_only_moves_toward_pointless() {
    let affected = paths(&["src/a/README.md", "src/a/OWNERS"]);
    let before = classify("b", &affected, &filter(&["**/*.md"]), None);
    let after = classify("b", &affected, &filter(&["**/*.md", "**/OWNERS"]), None);
    assert!(!before.build_is_pointless);
    assert!(after.build_is_pointless);
  }
}
