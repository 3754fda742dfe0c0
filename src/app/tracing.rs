use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

impl LogFormat {
    /// `RUST_LOG_FORMAT=json` or unset selects JSON (production default); anything else is plain.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            None => LogFormat::Json,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(_) => LogFormat::Plain,
        }
    }
}

/// Initialize the tracing subscriber from `RUST_LOG_FORMAT` and `RUST_LOG`.
pub fn init_tracing() {
    let format = LogFormat::from_env_value(std::env::var("RUST_LOG_FORMAT").ok().as_deref());
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .with(filter)
            .init(),
        LogFormat::Plain => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
}
