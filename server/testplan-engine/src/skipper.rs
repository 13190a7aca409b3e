//! Decide which builders can be skipped before they are ever scheduled.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::irrelevance::{self, IrrelevanceFilter};

/// Artifact type that marks a builder as producing an OS image.
pub const IMAGE_ARTIFACT: &str = "IMAGE_ZIP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunWhenMode {
  #[default]
  Unspecified,
  AlwaysRun,
  OnlyRunOnFileMatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunWhen {
  pub mode: RunWhenMode,
  pub file_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
  pub name: String,
  #[serde(default)]
  pub artifact_types: Vec<String>,
  #[serde(default)]
  pub run_when: RunWhen,
}

impl BuilderConfig {
  pub fn is_image_builder(&self) -> bool {
    self.artifact_types.iter().any(|a| a == IMAGE_ARTIFACT)
  }
}

/// Builder names, partitioned by outcome, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSkipResponse {
  pub builds_to_run: Vec<String>,
  pub skip_for_global_build_irrelevance: Vec<String>,
  pub skip_for_run_when_rules: Vec<String>,
}

/// True when at least one path remains and every path is build-irrelevant.
fn image_builders_ignorable(affected: &[String], irrelevance: &IrrelevanceFilter) -> bool {
  if affected.is_empty() {
    debug!("no affected files; image builders can't be ignored");
    return false;
  }
  let remaining = irrelevance.retain_relevant(affected);
  if remaining.is_empty() {
    info!("all files ruled out by build-irrelevant patterns; image builders are irrelevant");
    return true;
  }
  debug!(files = ?remaining, "files still relevant to image builders");
  false
}

fn skip_by_file_match(builder: &BuilderConfig, affected: &[String]) -> Result<bool, EngineError> {
  if builder.run_when.file_patterns.is_empty() {
    debug!(builder = %builder.name, "only-run-on-file-match rule has no patterns");
    return Ok(false);
  }
  let patterns = builder
    .run_when
    .file_patterns
    .iter()
    .map(|p| irrelevance::compile(p))
    .collect::<Result<Vec<Pattern>, _>>()?;
  let matched = affected
    .iter()
    .find(|path| patterns.iter().any(|p| irrelevance::glob_matches(p, path)));
  match matched {
    Some(path) => {
      debug!(builder = %builder.name, path = %path, "file requires builder");
      Ok(false)
    }
    None => Ok(true),
  }
}

/// Partition builders into run / skip lists for the affected paths.
pub fn check_builders(
  builders: &[BuilderConfig],
  affected: &[String],
  irrelevance: &IrrelevanceFilter,
) -> Result<BuildSkipResponse, EngineError> {
  let ignore_images = image_builders_ignorable(affected, irrelevance);
  let mut response = BuildSkipResponse::default();

  for builder in builders {
    let name = builder.name.clone();
    if ignore_images && builder.is_image_builder() {
      info!(builder = %name, "skipping image builder; changes don't affect the build");
      response.skip_for_global_build_irrelevance.push(name);
      continue;
    }
    if builder.run_when.mode == RunWhenMode::OnlyRunOnFileMatch
      && !affected.is_empty()
      && skip_by_file_match(builder, affected)?
    {
      info!(builder = %name, "skipping builder; no file matches its run-when patterns");
      response.skip_for_run_when_rules.push(name);
      continue;
    }
    debug!(builder = %name, mode = ?builder.run_when.mode, "must run builder");
    response.builds_to_run.push(name);
  }
  Ok(response)
}
