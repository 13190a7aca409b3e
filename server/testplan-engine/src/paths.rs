//! Resolve review changes into canonical source-tree paths.

use tracing::{debug, warn};

use crate::config::UnmappedProjectPolicy;
use crate::error::EngineError;
use crate::types::{ChangeReference, ChangeRevisions, SourceRootMapping};

/// `path` is under `prefix` iff it equals it or continues with a `/` after it.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
  let prefix = prefix.trim_end_matches('/');
  if prefix.is_empty() {
    return true;
  }
  match path.strip_prefix(prefix) {
    Some(rest) => rest.is_empty() || rest.starts_with('/'),
    None => false,
  }
}

/// Map every file of every change to `<source root>/<file>`, sorted.
///
/// Changes are visited in input order; the result is sorted so the output is
/// identical for identical input. Duplicates are kept.
pub fn affected_paths(
  changes: &[ChangeReference],
  revisions: &ChangeRevisions,
  roots: &SourceRootMapping,
  policy: UnmappedProjectPolicy,
) -> Result<Vec<String>, EngineError> {
  let mut all = Vec::new();
  for change in changes {
    let rev = revisions.get(change)?;
    let root = match roots.lookup(&rev.project, rev.branch.as_deref()) {
      Some(root) => root.trim_end_matches('/'),
      None => match policy {
        UnmappedProjectPolicy::Fail => {
          return Err(EngineError::UnmappedProject {
            project: rev.project.clone(),
            branch: rev.branch.clone(),
          });
        }
        UnmappedProjectPolicy::SkipChange => {
          warn!(
            change = %change,
            project = %rev.project,
            branch = ?rev.branch,
            "no source root; skipping change"
          );
          continue;
        }
      },
    };

    let mut files: Vec<String> = rev
      .files
      .iter()
      .map(|f| format!("{}/{}", root, f.trim_start_matches('/')))
      .collect();
    files.sort();
    debug!(change = %change, files = ?files, "affected files for change");
    all.extend(files);
  }
  all.sort();
  debug!(count = all.len(), "all affected files");
  Ok(all)
}
