//! # docqa-telemetry
//!
//! Logging for docqa binaries and tests.
//!
//! [`init_telemetry`] installs a global `tracing` subscriber filtered by
//! `RUST_LOG` (default `info`) that writes human-readable or JSON lines to
//! stderr. [`CaptureLayer`] records events in memory so tests can assert on
//! structured fields.

pub mod capture;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt as layer_fmt, prelude::*};

pub use capture::{CaptureLayer, CapturedEvent, CapturedEvents};

/// Errors from installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),

    #[error("unknown log format '{0}', expected 'pretty' or 'json'")]
    UnknownFormat(String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset or unparsable.
    pub default_directive: String,
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { format: LogFormat::Pretty, default_directive: "info".to_string(), with_target: false }
    }
}

impl TelemetryConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// `RUST_LOG` if set and valid, else the default directive.
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(&self.default_directive)?),
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the default directive does not parse or a global subscriber is
/// already installed.
pub fn try_init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry
            .with(layer_fmt::layer().with_target(config.with_target).with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                layer_fmt::layer()
                    .json()
                    .with_target(config.with_target)
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    Ok(())
}

/// Install the global subscriber, reporting failure on stderr instead of
/// returning it.
pub fn init_telemetry(config: &TelemetryConfig) {
    if let Err(e) = try_init_telemetry(config) {
        eprintln!("telemetry not initialised: {e}");
    }
}
