pub mod metrics;
pub mod pii;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global subscriber. Later calls are no-ops.
/// Level comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let result = match format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_current_span(true)
                .with_env_filter(filter)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .with_target(true)
                .with_env_filter(filter)
                .try_init(),
        };
        if result.is_err() {
            tracing::debug!("global tracing subscriber already set");
        }
    });
}
