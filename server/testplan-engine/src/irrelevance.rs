//! Drop paths that match known build-irrelevant glob patterns.

use std::borrow::Cow;

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::error::EngineError;

/// `*` stays within one path component; `**` spans directories.
pub(crate) const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: true,
  require_literal_leading_dot: false,
};

/// `**` only spans directories as a whole component; elsewhere it is a plain `*`.
fn collapse_partial_double_stars(pattern: &str) -> Cow<'_, str> {
  let partial = pattern
    .split('/')
    .any(|component| component != "**" && component.contains("**"));
  if !partial {
    return Cow::Borrowed(pattern);
  }
  let components: Vec<String> = pattern
    .split('/')
    .map(|component| {
      if component == "**" {
        return component.to_string();
      }
      let mut out = String::with_capacity(component.len());
      for c in component.chars() {
        if !(c == '*' && out.ends_with('*')) {
          out.push(c);
        }
      }
      out
    })
    .collect();
  Cow::Owned(components.join("/"))
}

/// Compile a double-star glob.
pub(crate) fn compile(pattern: &str) -> Result<Pattern, EngineError> {
  Pattern::new(&collapse_partial_double_stars(pattern))
    .map_err(|e| EngineError::invalid_pattern(pattern, e))
}

pub(crate) fn glob_matches(pattern: &Pattern, path: &str) -> bool {
  pattern.matches_with(path, MATCH_OPTIONS)
}

/// Compiled set of build-irrelevant patterns.
#[derive(Debug, Clone)]
pub struct IrrelevanceFilter {
  patterns: Vec<Pattern>,
}

impl IrrelevanceFilter {
  pub fn new(patterns: &[String]) -> Result<Self, EngineError> {
    let patterns = patterns
      .iter()
      .map(|p| compile(p))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { patterns })
  }

  /// First matching pattern, if any.
  pub fn matching_pattern(&self, path: &str) -> Option<&str> {
    self
      .patterns
      .iter()
      .find(|p| glob_matches(p, path))
      .map(Pattern::as_str)
  }

  /// Paths that match no pattern, in input order.
  pub fn retain_relevant(&self, paths: &[String]) -> Vec<String> {
    paths
      .iter()
      .filter(|path| match self.matching_pattern(path) {
        Some(pattern) => {
          debug!(path = %path, pattern, "ignoring build-irrelevant file");
          false
        }
        None => {
          debug!(path = %path, "file not ruled out by build-irrelevant patterns");
          true
        }
      })
      .cloned()
      .collect()
  }
}
