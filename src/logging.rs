//! Logging setup for the `credvault` binary.
//!
//! Events go to stderr so stdout stays clean for command output. The
//! `CREDVAULT_LOG` environment variable (an `EnvFilter` directive) wins
//! over the configured level.

use tracing_subscriber::EnvFilter;

pub const ENV_VAR: &str = "CREDVAULT_LOG";

/// Install the global subscriber. Later calls are ignored.
pub fn init(default_level: &str) {
    let env_filter = EnvFilter::try_from_env(ENV_VAR)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
