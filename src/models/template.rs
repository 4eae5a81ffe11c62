//! # Rate Template Model
//!
//! The central entity of the rates service: a named, versioned configuration
//! of pay-rate components (base rate, margins, loadings, statutory rates)
//! used to compute a chargeable/payable rate.
//!
//! Updates are expressed as partial-field change sets
//! ([`RateTemplateUpdate`]) rather than whole-record replacement; the
//! management layer captures each change set as a [`RateTemplateHistory`]
//! entry, which is also what version restore replays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RateError, RateErrorCode, RateResult};

use super::status::{TemplateStatus, TemplateType};

/// The ten numeric rate components every template carries.
///
/// Kept as a dedicated struct so comparison and analytics code can iterate
/// the field set without reflection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RateComponents {
    pub base_rate: f64,
    pub base_margin: f64,
    pub super_rate: f64,
    pub leave_loading: f64,
    pub workers_comp_rate: f64,
    pub payroll_tax_rate: f64,
    pub training_cost_rate: f64,
    pub other_costs_rate: f64,
    pub funding_offset: f64,
    pub casual_loading: f64,
}

impl RateComponents {
    /// The compared field set, in a fixed order.
    pub fn fields(&self) -> [(&'static str, f64); 10] {
        [
            ("baseRate", self.base_rate),
            ("baseMargin", self.base_margin),
            ("superRate", self.super_rate),
            ("leaveLoading", self.leave_loading),
            ("workersCompRate", self.workers_comp_rate),
            ("payrollTaxRate", self.payroll_tax_rate),
            ("trainingCostRate", self.training_cost_rate),
            ("otherCostsRate", self.other_costs_rate),
            ("fundingOffset", self.funding_offset),
            ("casualLoading", self.casual_loading),
        ]
    }
}

/// Award classification carried in a template's metadata bag, consumed by
/// award validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    /// Anything else callers choose to stash on the template.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A versioned pay-rate template scoped to one organisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTemplate {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub template_type: TemplateType,
    pub status: TemplateStatus,
    /// Strictly increases on every mutating operation, including restore.
    pub version: i64,
    #[serde(flatten)]
    pub rates: RateComponents,
    pub effective_from: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
}

impl RateTemplate {
    /// Apply a partial-field change set, producing the merged template.
    ///
    /// Keys use the serialized (camelCase) field names, matching what the
    /// management layer records into history entries. Values that do not
    /// deserialize into the target field fail with `TEMPLATE_INVALID`.
    pub fn apply_changes(&self, changes: &Map<String, Value>) -> RateResult<RateTemplate> {
        let mut value = serde_json::to_value(self).map_err(|e| {
            RateError::from_source(
                RateErrorCode::Unknown,
                "failed to serialize template for merge",
                e,
            )
            .with_context("template_id", Value::String(self.id.clone()))
        })?;
        if let Value::Object(ref mut fields) = value {
            for (key, change) in changes {
                fields.insert(key.clone(), change.clone());
            }
        }
        serde_json::from_value(value).map_err(|e| {
            RateError::from_source(
                RateErrorCode::TemplateInvalid,
                "change set does not produce a valid template",
                e,
            )
            .with_context("template_id", Value::String(self.id.clone()))
        })
    }
}

/// Input for template creation. The management layer assigns identity,
/// version 1, and provenance timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRateTemplate {
    pub org_id: String,
    pub name: String,
    pub template_type: TemplateType,
    /// Defaulted to `Draft` by the standard before-create hook when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TemplateStatus>,
    #[serde(flatten)]
    pub rates: RateComponents,
    pub effective_from: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
}

/// A partial-field update, keyed by serialized field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RateTemplateUpdate {
    #[serde(flatten)]
    pub changes: Map<String, Value>,
}

impl RateTemplateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.changes.insert(field.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// One immutable audit entry per template change, written by the management
/// layer on every update. `changes` is the partial-field diff that produced
/// the recorded `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTemplateHistory {
    pub id: String,
    pub template_id: String,
    pub version: i64,
    pub changes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Result of computing a rate from a template. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCalculation {
    pub id: String,
    pub template_id: String,
    pub result: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkCalculationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A batch of rate calculations created through `create_bulk_calculation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCalculation {
    pub id: String,
    pub org_id: String,
    pub status: BulkCalculationStatus,
    pub calculations: Vec<RateCalculation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a bulk calculation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCalculationParams {
    pub org_id: String,
    pub template_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// Employee record surfaced by the management layer for rate assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateEmployee {
    pub id: String,
    pub org_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

/// Structural validation outcome from the management layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralValidation {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
