//! Structured logging setup.
//!
//! Logs go to stderr so the pre-flight report on stdout stays readable.
//! `RUST_LOG` overrides the configured level when set.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::{Error, Result};

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = env_filter(level);

    let installed = if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        Registry::default().with(filter).with(fmt_layer).try_init()
    };
    installed.map_err(|e| Error::internal(format!("failed to initialize tracing: {e}")))?;

    tracing::debug!(level, json, "Tracing initialized");
    Ok(())
}
