//! Process-wide `tracing` subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to every
//! `huddle_*` target and `warn` to everything else.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INSTALLED: OnceLock<Result<(), String>> = OnceLock::new();

/// Install the global subscriber. Only the first call installs; later calls,
/// concurrent ones included, return its outcome.
pub fn init(level: &str) -> Result<(), crate::error::HuddleError> {
    INSTALLED
        .get_or_init(|| install(level))
        .clone()
        .map_err(crate::error::HuddleError::Telemetry)
}

fn install(level: &str) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| e.to_string())?;

    tracing::debug!(level, "telemetry initialized");
    Ok(())
}

fn default_directives(level: &str) -> String {
    [
        "huddle_core",
        "huddle_xmpp",
        "huddle_rest",
        "huddle_admin",
        "huddle_invitations",
        "huddle_presence",
    ]
    .iter()
    .fold("warn".to_string(), |mut acc, target| {
        acc.push_str(&format!(",{target}={level}"));
        acc
    })
}
