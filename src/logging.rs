//! # Structured Logging
//!
//! Environment-aware `tracing` initialization. Production-like environments
//! get JSON output for log shipping; everything else gets human-readable
//! console output. `RATES_LOG` overrides the default filter with a full
//! `EnvFilter` directive string.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber. Idempotent, and tolerant of a
/// subscriber already installed by the embedding application.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = Environment::detect();
        let filter = EnvFilter::try_from_env("RATES_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_directive(environment)));

        let initialized = if environment.is_production_like() {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(false),
                )
                .with(filter)
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(filter)
                .try_init()
        };

        if initialized.is_err() {
            tracing::debug!("global tracing subscriber already installed, keeping it");
        } else {
            tracing::info!(environment = %environment, "structured logging initialized");
        }
    });
}

fn default_directive(environment: Environment) -> String {
    let level = match environment {
        Environment::Production => "info",
        Environment::Staging => "info",
        Environment::Development | Environment::Test => "debug",
    };
    format!("rates_core={level},{level}")
}
