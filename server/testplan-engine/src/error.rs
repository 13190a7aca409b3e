//! Structured error types for the test-plan engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("unknown revision: {host}/{change}/{patchset}")]
  UnknownRevision {
    host: String,
    change: u64,
    patchset: u32,
  },

  #[error("no source root for project {project}{}", branch_suffix(.branch))]
  UnmappedProject {
    project: String,
    branch: Option<String>,
  },

  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("invalid pattern {pattern:?}: {reason}")]
  InvalidPattern { pattern: String, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

fn branch_suffix(branch: &Option<String>) -> String {
  match branch {
    Some(b) => format!(" and branch {}", b),
    None => String::new(),
  }
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn invalid_pattern(pattern: &str, err: glob::PatternError) -> Self {
    Self::InvalidPattern {
      pattern: pattern.to_string(),
      reason: err.to_string(),
    }
  }
}
