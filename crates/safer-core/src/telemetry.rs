//! Tracing setup for the monitoring daemon.
//!
//! Without `RUST_LOG`, the chosen level applies to the SAFER crates only;
//! dependencies (reqwest, hyper, rustls) stay at `warn` so the HTTP stack
//! does not drown the cycle log at debug level.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const SAFER_TARGETS: [&str; 3] = ["safer_core", "safer_io", "saferd"];

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(level: Level) -> String {
    let mut directive = String::from("warn");
    for target in SAFER_TARGETS {
        directive.push_str(&format!(",{target}={}", level.as_str().to_lowercase()));
    }
    directive
}

/// Install the global subscriber. `json` switches to newline-delimited JSON
/// for shipping logs off the device. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
