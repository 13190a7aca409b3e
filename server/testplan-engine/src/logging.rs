//! Decision tracing for the binary: `RUST_LOG` filtered, compact lines on stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Defaults to `warn` when `RUST_LOG` is unset.
///
/// Stdout is reserved for JSON results, so everything goes to stderr.
pub fn init() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr).compact())
    .init();
}
