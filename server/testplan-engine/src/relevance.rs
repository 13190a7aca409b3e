//! Relevance predicates: which paths can affect a builder's output.
//!
//! Two interchangeable sources: an explicit relevant-path list, or a package
//! dependency graph whose source paths are flattened into the same kind of list.

use tracing::{debug, warn};

use crate::paths::has_path_prefix;
use crate::rules::{DependencyGraph, RelevanceConfig};

pub trait RelevancePredicate {
  fn is_relevant(&self, path: &str) -> bool;
}

/// Explicit list of relevant files or directories.
#[derive(Debug, Clone, Default)]
pub struct RelevantPaths {
  paths: Vec<String>,
}

impl RelevantPaths {
  pub fn new(paths: impl IntoIterator<Item = String>) -> Self {
    let mut paths: Vec<String> = paths
      .into_iter()
      .map(|p| p.trim_end_matches('/').to_string())
      .collect();
    paths.sort();
    paths.dedup();
    Self { paths }
  }

  /// Flatten every package's source paths, stripping the chroot prefix.
  pub fn from_dep_graph(graph: &DependencyGraph, chroot_prefix: &str) -> Self {
    Self::new(
      graph
        .package_deps
        .iter()
        .flat_map(|pd| pd.dependency_source_paths.iter())
        .map(|sp| sp.strip_prefix(chroot_prefix).unwrap_or(sp).to_string()),
    )
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }
}

impl RelevancePredicate for RelevantPaths {
  /// Relevant if the path lies under a declared entry, or a declared entry lies under it.
  fn is_relevant(&self, path: &str) -> bool {
    match self
      .paths
      .iter()
      .find(|rel| has_path_prefix(path, rel) || has_path_prefix(rel, path))
    {
      Some(rel) => {
        debug!(path, relevant = %rel, "file is relevant");
        true
      }
      None => {
        debug!(path, "no relevant path covers file");
        false
      }
    }
  }
}

/// Build the predicate for whichever relevance shape the caller supplied.
pub fn from_config(config: &RelevanceConfig, chroot_prefix: &str) -> RelevantPaths {
  let relevant = match config {
    RelevanceConfig::RelevantPaths(paths) => RelevantPaths::new(paths.iter().cloned()),
    RelevanceConfig::DepGraph(graph) => RelevantPaths::from_dep_graph(graph, chroot_prefix),
  };
  if relevant.is_empty() {
    warn!("relevance source declares no paths; every file will be irrelevant");
  } else {
    debug!(count = relevant.len(), "relevant paths loaded");
  }
  relevant
}
