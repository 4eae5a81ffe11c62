//! Derived, read-only analytics aggregates.
//!
//! Nothing here is persisted by the service; base analytics come from the
//! management layer and the enhanced figures are computed on demand from the
//! current template set and its history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::SpanRecord;

/// Base aggregate supplied by the management layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateAnalytics {
    pub org_id: String,
    pub total_templates: usize,
    pub active_templates: usize,
    pub average_base_rate: f64,
    pub total_calculations: usize,
}

/// One bucket of the five-bucket base-rate histogram spanning `[min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Sorted-rate summary over the current template set. Degenerates to an
/// empty histogram when there are no templates or min == max.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RateDistribution {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p90: f64,
    pub histogram: Vec<HistogramBucket>,
}

/// Exact per-status template counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub draft: usize,
    pub active: usize,
    pub archived: usize,
    pub deleted: usize,
}

/// Structural compliance counts over the current template set.
///
/// Derived from real template fields (base rate floor, casual loading
/// floor), not award-provider calls; `estimated` marks that award minimums
/// were not consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceMetrics {
    pub checked: usize,
    pub passed: usize,
    pub compliance_percent: f64,
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedRateAnalytics {
    #[serde(flatten)]
    pub base: RateAnalytics,
    pub rate_distribution: RateDistribution,
    pub status_breakdown: StatusBreakdown,
    pub compliance: ComplianceMetrics,
    /// History entries per template per 30 days over the queried window.
    pub change_frequency: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
}

/// Liveness/readiness summary for the service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub uptime_seconds: u64,
    pub metrics: serde_json::Value,
    pub recent_spans: Vec<SpanRecord>,
}
