// src/logging.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Install the global subscriber.
///
/// `RUST_LOG` drives the filter, `LOG_FORMAT=json` switches to JSON lines.
/// Uses `try_init`, so a subscriber installed by the hosting runtime wins.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    if res.is_err() {
        tracing::debug!("tracing subscriber already installed; keeping it");
    }
}
