//! Diagnostics output.
//!
//! The crate only emits `tracing` events; embedders with their own subscriber
//! need nothing from here. [`init`] installs a plain `fmt` subscriber filtered
//! by the `FLUENT_ROUTINE_LOG` environment variable (`info` when unset), e.g.
//! `FLUENT_ROUTINE_LOG=fluent_routine=trace`.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "FLUENT_ROUTINE_LOG";

static INIT: Once = Once::new();

/// Install the global subscriber. Later calls, or an already installed
/// subscriber, are left alone.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt().with_env_filter(filter).with_target(true).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        tracing::info!("logging initialised");
    }
}
