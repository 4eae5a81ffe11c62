//! # Domain Models
//!
//! Entities and derived aggregates for the rates service:
//!
//! - [`template`] - rate templates, change sets, history, calculations
//! - [`status`] - template status state machine and pricing types
//! - [`comparison`] - per-field template diff results
//! - [`bulk`] - bulk operation progress records
//! - [`analytics`] - base and enhanced analytics aggregates, service health

pub mod analytics;
pub mod bulk;
pub mod comparison;
pub mod status;
pub mod template;

pub use analytics::{
    ComplianceMetrics, EnhancedRateAnalytics, HealthStatus, HistogramBucket, RateAnalytics,
    RateDistribution, ServiceHealth, StatusBreakdown,
};
pub use bulk::{BulkOperation, BulkOperationProgress, BulkOperationStatus};
pub use comparison::{
    ComparisonSummary, FieldDifference, RateTemplateComparisonResult, SIGNIFICANT_CHANGE_PERCENT,
};
pub use status::{TemplateStatus, TemplateType};
pub use template::{
    BulkCalculation, BulkCalculationParams, BulkCalculationStatus, NewRateTemplate,
    RateCalculation, RateComponents, RateEmployee, RateTemplate, RateTemplateHistory,
    RateTemplateUpdate, StructuralValidation, TemplateMetadata,
};
