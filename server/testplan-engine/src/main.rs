//! Binary entrypoint: read one JSON request envelope from stdin, write one JSON result to stdout.
//!
//! The envelope is `{"config": {...}, "request": {"command": ..., ...}}`; `config`
//! is optional. Failures are written as an ErrorOutput and exit with status 1.

use std::io::{self, Read, Write};

use serde::Deserialize;
use testplan_engine::types::ErrorOutput;
use testplan_engine::{
  logging, BuildSkipRequest, Config, Engine, EngineError, PointlessCheckRequest, TestPlanRequest,
};

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Request {
  CheckBuild(PointlessCheckRequest),
  GenerateTestPlan(TestPlanRequest),
  CheckBuilders(BuildSkipRequest),
}

#[derive(Deserialize)]
struct Envelope {
  #[serde(default)]
  config: Config,
  request: Request,
}

fn run(input: &str) -> Result<serde_json::Value, EngineError> {
  let envelope: Envelope = serde_json::from_str(input)?;
  let engine = Engine::new(envelope.config);
  let value = match &envelope.request {
    Request::CheckBuild(req) => serde_json::to_value(engine.check_build(req)?)?,
    Request::GenerateTestPlan(req) => serde_json::to_value(engine.generate_test_plan(req)?)?,
    Request::CheckBuilders(req) => serde_json::to_value(engine.check_builders(req)?)?,
  };
  Ok(value)
}

fn main() {
  logging::init();

  let mut input = String::new();
  if let Err(e) = io::stdin().read_to_string(&mut input) {
    let _ = writeln!(io::stderr(), "testplan-engine: read error: {}", e);
    std::process::exit(1);
  }

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  let code = match run(&input) {
    Ok(value) => {
      let _ = serde_json::to_writer(&mut out, &value);
      0
    }
    Err(e) => {
      let err = match &e {
        EngineError::Validation { field, reason } => ErrorOutput::new(reason.clone()).with_field(field.clone()),
        _ => ErrorOutput::new(e.to_string()),
      };
      let _ = serde_json::to_writer(&mut out, &err);
      1
    }
  };
  let _ = writeln!(out);
  let _ = out.flush();
  drop(out);
  std::process::exit(code);
}
