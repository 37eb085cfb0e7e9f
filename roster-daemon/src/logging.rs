//! Process-wide log setup for the daemon and the CLI.
//!
//! Library crates log through the `log` facade; `tracing-subscriber`'s
//! `tracing-log` bridge forwards those records into the same subscriber.

use tracing_subscriber::{fmt, EnvFilter};

/// Set to `json` for one JSON object per line.
pub const LOG_FORMAT_ENV: &str = "ROSTER_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), stderr.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    init_tracing_with(LogFormat::from_env());
}

pub fn init_tracing_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
