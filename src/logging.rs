//! `tracing` subscriber setup for the CLI.
//!
//! The library only emits events; installing a subscriber is the binary's
//! job. Filter directives come from `GALLEY_LOG`, then `RUST_LOG`, then the
//! `-v` count.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "GALLEY_LOG";

/// Default level for a `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_env_filter(verbosity: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(level_for(verbosity))
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// reserved for build output.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(build_env_filter(verbosity))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 2),
        )
        .try_init()?;
    Ok(())
}
