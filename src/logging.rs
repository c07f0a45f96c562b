//! Logging and tracing setup.
//!
//! Structured logging through the tracing crate, with a human-readable and a
//! JSON output mode. Filtering follows `RUST_LOG` and falls back to the
//! level requested on the command line.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the global tracing subscriber.
///
/// This should be called once at program startup.
/// Subsequent calls are ignored.
pub fn init_tracing(default_level: &str) {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer().with_target(false);

        // try_init: a test harness may already own the global subscriber
        let _ = tracing_subscriber::registry()
            .with(env_filter(default_level))
            .with(fmt_layer)
            .try_init();

        info!("canister research tracing initialized");
    });
}

/// Initialize tracing with JSON output for structured logging.
pub fn init_tracing_json(default_level: &str) {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true);

        let _ = tracing_subscriber::registry()
            .with(env_filter(default_level))
            .with(fmt_layer)
            .try_init();

        info!("canister research tracing initialized (JSON mode)");
    });
}
