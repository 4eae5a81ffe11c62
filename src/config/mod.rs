//! # Service Configuration
//!
//! Declarative configuration for assembling a rates service instance.
//! Defaults are environment-aware (metrics and activity tracking are only on
//! by default in production-like environments); `from_env` layers
//! `RATES_`-prefixed environment variables over those defaults.
//!
//! ```rust
//! use rates_core::config::{Environment, RateServiceConfig};
//!
//! let config = RateServiceConfig::for_environment(Environment::Production);
//! assert!(config.metrics.enabled);
//! assert_eq!(config.rate_limit.limit, 100);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{RateError, RateErrorCode, RateResult};

/// Deployment environment, detected from `RATES_ENV` / `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    pub fn detect() -> Self {
        std::env::var("RATES_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Environment::Development)
    }

    /// Staging and production get the full observability defaults.
    pub fn is_production_like(&self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("Invalid environment: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: "rates".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ActivityConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Admitted requests per key per window.
    pub limit: usize,
    pub window_secs: u64,
    /// Strict denial throws; non-strict logs and reports `false`.
    pub strict: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
            window_secs: 60,
            strict: false,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AwardConfig {
    pub enabled: bool,
}

impl Default for AwardConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhancedConfig {
    pub enabled: bool,
}

impl Default for EnhancedConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Whether multi-step writes should be wrapped in persistence-layer
/// transactions. The service itself performs no compensating transactions;
/// this is delegated to the management layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TransactionConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RateServiceConfig {
    pub environment: Environment,
    pub metrics: MetricsConfig,
    pub activity: ActivityConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub award: AwardConfig,
    pub enhanced: EnhancedConfig,
    pub transactions: TransactionConfig,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

impl RateServiceConfig {
    /// Documented defaults for an environment: metrics and activity tracking
    /// on only when production-like, everything else per its own default.
    pub fn for_environment(environment: Environment) -> Self {
        let production_like = environment.is_production_like();
        Self {
            environment,
            metrics: MetricsConfig {
                enabled: production_like,
                ..Default::default()
            },
            activity: ActivityConfig {
                enabled: production_like,
            },
            ..Default::default()
        }
    }

    /// Environment-variable overlay: `RATES_RATE_LIMIT__LIMIT=50` overrides
    /// `rate_limit.limit`, and so on, over [`Self::for_environment`]
    /// defaults for the detected environment.
    pub fn from_env() -> RateResult<Self> {
        let defaults = Self::for_environment(Environment::detect());
        let layered = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(config_error)?)
            .add_source(config::Environment::with_prefix("RATES").separator("__"))
            .build()
            .map_err(config_error)?;
        layered.try_deserialize().map_err(config_error)
    }
}

fn config_error(e: config::ConfigError) -> RateError {
    RateError::from_source(RateErrorCode::ValidationFailed, "invalid service configuration", e)
}
