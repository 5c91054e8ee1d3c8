use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with `level` as the default directive.
///
/// `RUST_LOG` still takes precedence and `RUST_LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_tracing(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();

    if !matches!(log_format.as_str(), "" | "json" | "compact") {
        warn!("Unknown RUST_LOG_FORMAT {log_format:?}, using compact output");
    }
}
