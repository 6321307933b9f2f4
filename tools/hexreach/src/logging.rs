//! tracing subscriber setup for the CLI

use hexreach_common::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `RUST_LOG` if set, `info` otherwise
///
/// Logs go to stderr so JSON reports on stdout stay machine readable.
pub fn init(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| Error::Config(format!("log filter: {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::Config(format!("tracing subscriber: {e}")))
}
