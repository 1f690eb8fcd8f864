//! Observability infrastructure for the VNF manager.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors shared by every component.

use std::str::FromStr;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else if s.eq_ignore_ascii_case("pretty") {
            Ok(Self::Pretty)
        } else {
            Err(Error::configuration(format!(
                "unknown log format '{s}', expected 'json' or 'pretty'"
            )))
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `vnfm_lifecycle=debug`)
///
/// # Example
///
/// ```rust
/// use vnfm_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for a lifecycle operation on a single VNF.
///
/// # Example
///
/// ```rust
/// use vnfm_core::observability::lifecycle_span;
///
/// let span = lifecycle_span("create_wait", "01HZX5J6Q5T8V1H3M2K4N6P8R0");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn lifecycle_span(operation: &str, vnf_id: &str) -> Span {
    tracing::info_span!("lifecycle", op = operation, vnf_id = vnf_id)
}

/// Creates a span for a backend driver call.
#[must_use]
pub fn driver_span(kind: &str, driver: &str, operation: &str) -> Span {
    tracing::debug_span!("driver", kind = kind, driver = driver, op = operation)
}
