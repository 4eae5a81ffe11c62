//! # Rate Service Layer
//!
//! The programmatic contract exposed to API/UI callers ([`RatesService`],
//! plus [`enhanced::EnhancedRateService`]) and the persistence-facing
//! contract the service delegates to ([`RateManagementService`]).
//!
//! - [`core`] - `RateServiceImpl`: CRUD, calculation, analytics with hooks,
//!   metrics, rate limiting, and caching
//! - [`enhanced`] - comparison, compliance, enhanced analytics, version
//!   restore, asynchronous bulk validation
//! - [`factory`] - declarative assembly from a `RateServiceConfig`

pub mod core;
pub mod enhanced;
pub mod factory;

use async_trait::async_trait;

use crate::error::RateResult;
use crate::models::{
    BulkCalculation, BulkCalculationParams, NewRateTemplate, RateAnalytics, RateCalculation,
    RateEmployee, RateTemplate, RateTemplateHistory, RateTemplateUpdate, StructuralValidation,
    TemplateStatus,
};

pub use self::core::RateServiceImpl;
pub use self::enhanced::{
    AnalyticsQuery, BulkOperationStore, BulkStoreError, ComplianceCheck, ComplianceStatus,
    EnhancedRateService, EnhancedRateServiceImpl, ExtendedValidationResult,
    InMemoryBulkOperationStore,
};
pub use self::factory::{create_configured_rate_service, ConfiguredRateService, ServiceOptions};

/// Persistence-facing contract. Storage, version increments, and history
/// diff capture are the implementer's responsibility: every successful
/// `update_template` must increment `version` by exactly one and append a
/// history entry recording the applied change set.
#[async_trait]
pub trait RateManagementService: Send + Sync {
    async fn get_templates(&self, org_id: &str) -> RateResult<Vec<RateTemplate>>;

    /// `Ok(None)` means the id does not exist; the service layer turns that
    /// into the `NOT_FOUND` contract.
    async fn get_template(&self, id: &str) -> RateResult<Option<RateTemplate>>;

    async fn create_template(&self, template: NewRateTemplate) -> RateResult<RateTemplate>;

    async fn update_template(
        &self,
        id: &str,
        update: RateTemplateUpdate,
    ) -> RateResult<RateTemplate>;

    /// Must reject transitions outside the status graph with
    /// `INVALID_STATUS_TRANSITION`.
    async fn update_status(
        &self,
        id: &str,
        status: TemplateStatus,
        updated_by: &str,
    ) -> RateResult<()>;

    async fn delete_template(&self, id: &str) -> RateResult<()>;

    async fn get_history(&self, template_id: &str) -> RateResult<Vec<RateTemplateHistory>>;

    async fn get_calculations(&self, template_id: &str) -> RateResult<Vec<RateCalculation>>;

    /// Shape/required-field validation only; award compliance is the
    /// service layer's concern.
    async fn validate_template(&self, template: &RateTemplate) -> RateResult<StructuralValidation>;

    /// Rate composition arithmetic lives behind this call.
    async fn calculate_rate(&self, template: &RateTemplate) -> RateResult<f64>;

    async fn get_bulk_calculations(&self, org_id: &str) -> RateResult<Vec<BulkCalculation>>;

    async fn create_bulk_calculation(
        &self,
        params: BulkCalculationParams,
    ) -> RateResult<BulkCalculation>;

    async fn get_analytics(&self, org_id: &str) -> RateResult<RateAnalytics>;

    async fn get_employees(&self) -> RateResult<Vec<RateEmployee>>;
}

/// The service contract consumed by the API/UI layer. All operations are
/// async and reject with a [`crate::error::RateError`] carrying a code,
/// HTTP status, and operation context.
#[async_trait]
pub trait RatesService: Send + Sync {
    async fn get_templates(&self, org_id: &str) -> RateResult<Vec<RateTemplate>>;

    /// Rejects with `NOT_FOUND` (HTTP 404) for unknown ids; callers can rely
    /// on distinguishing that from other failures.
    async fn get_rate_template(&self, id: &str) -> RateResult<RateTemplate>;

    async fn create_rate_template(&self, template: NewRateTemplate) -> RateResult<RateTemplate>;

    async fn update_rate_template(
        &self,
        id: &str,
        update: RateTemplateUpdate,
    ) -> RateResult<RateTemplate>;

    async fn update_rate_template_status(
        &self,
        id: &str,
        status: TemplateStatus,
        updated_by: &str,
    ) -> RateResult<()>;

    async fn delete_rate_template(&self, id: &str) -> RateResult<()>;

    async fn get_rate_template_history(&self, id: &str)
        -> RateResult<Vec<RateTemplateHistory>>;

    async fn get_rate_calculations(&self, id: &str) -> RateResult<Vec<RateCalculation>>;

    /// Structural validity only; see
    /// [`enhanced::EnhancedRateService::validate_template_compliance`] for
    /// award compliance.
    async fn validate_rate_template(&self, template: &RateTemplate) -> RateResult<bool>;

    async fn calculate_rate(&self, template: &RateTemplate) -> RateResult<f64>;

    async fn get_bulk_calculations(&self, org_id: &str) -> RateResult<Vec<BulkCalculation>>;

    async fn create_bulk_calculation(
        &self,
        params: BulkCalculationParams,
    ) -> RateResult<BulkCalculation>;

    async fn get_analytics(&self, org_id: &str) -> RateResult<RateAnalytics>;

    async fn get_employees(&self) -> RateResult<Vec<RateEmployee>>;
}
