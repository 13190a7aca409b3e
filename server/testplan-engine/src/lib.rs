//! Build-relevance and test-plan decision engine.
//!
//! Given the review changes in a CI run, decides whether a builder's work is
//! pointless, which builders can be skipped, and which test suites to run
//! against which builds.
//!
//! Deterministic and stateless; inputs arrive fully materialized, no I/O.

pub mod config;
pub mod engine;
pub mod error;
pub mod irrelevance;
pub mod logging;
pub mod paths;
pub mod plan;
pub mod pointless;
pub mod pruner;
pub mod relevance;
pub mod rules;
pub mod skipper;
pub mod suite_sort;
pub mod types;

pub use config::Config;
pub use engine::{BuildSkipRequest, ChangeInputs, Engine, PointlessCheckRequest, TestPlanRequest};
pub use error::EngineError;
pub use types::{PointlessBuildVerdict, TestPlan};
