use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow `APP_LOG_LEVEL` when it is a bare level.
const LEAD_TARGETS: [&str; 2] = ["lead_agent", "lead_agent_cli"];
/// Level applied to every other target (axum, hyper, the prometheus exporter).
const DEPENDENCY_LEVEL: &str = "warn";

#[derive(Debug)]
pub enum TelemetryError {
    InvalidFilter { directive: String, source: ParseError },
    Install(tracing_subscriber::util::TryInitError),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidFilter { directive, .. } => {
                write!(f, "APP_LOG_LEVEL '{directive}' is not a valid tracing filter")
            }
            TelemetryError::Install(err) => write!(f, "could not install subscriber: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidFilter { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(err),
        }
    }
}

/// Where the active filter came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSource {
    RustLog,
    Configured(String),
}

/// Expand a bare level into per-crate directives; full directive strings pass through.
///
/// `debug` becomes `warn,lead_agent=debug,lead_agent_cli=debug`.
pub fn lead_directives(log_level: &str) -> String {
    let level = log_level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    let mut directives = DEPENDENCY_LEVEL.to_string();
    for target in LEAD_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// `RUST_LOG` wins over the configured level when it parses.
pub fn build_filter(config: &TelemetryConfig) -> Result<(EnvFilter, FilterSource), TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok((filter, FilterSource::RustLog));
    }

    let directives = lead_directives(&config.log_level);
    let filter =
        EnvFilter::try_new(&directives).map_err(|source| TelemetryError::InvalidFilter {
            directive: config.log_level.clone(),
            source,
        })?;
    Ok((filter, FilterSource::Configured(directives)))
}

/// Install the process-wide subscriber. Events go to stderr so menu and report output on
/// stdout stay clean.
pub fn init(config: &TelemetryConfig) -> Result<FilterSource, TelemetryError> {
    let (filter, source) = build_filter(config)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(TelemetryError::Install)?;

    tracing::debug!(filter = ?source, "telemetry initialized");
    Ok(source)
}
