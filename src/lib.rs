#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Rates Core
//!
//! Business-logic layer for managing pay-rate templates: versioned CRUD
//! with lifecycle hooks, rate calculation, award-minimum compliance
//! validation, template comparison, analytics, and asynchronous bulk
//! validation.
//!
//! The crate is storage-agnostic. Persistence sits behind
//! [`service::RateManagementService`]; callers consume
//! [`service::RatesService`] (or [`service::EnhancedRateService`]) and
//! assemble an instance with [`service::create_configured_rate_service`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rates_core::config::RateServiceConfig;
//! use rates_core::service::{create_configured_rate_service, ServiceOptions};
//! # fn management() -> Arc<dyn rates_core::service::RateManagementService> { unimplemented!() }
//!
//! rates_core::logging::init_structured_logging();
//! let config = RateServiceConfig::from_env().unwrap();
//! let service = create_configured_rate_service(
//!     management(),
//!     None,
//!     &config,
//!     ServiceOptions::default(),
//! );
//! let rates = service.rates_service();
//! ```

pub mod activity;
pub mod award;
pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod monitoring;
pub mod rate_limiter;
pub mod service;

pub use error::{RateError, RateErrorCode, RateResult};
pub use models::{NewRateTemplate, RateTemplate, RateTemplateUpdate, TemplateStatus};
pub use service::{RateManagementService, RatesService};
