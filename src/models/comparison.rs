//! Template comparison results.
//!
//! Ephemeral computation produced by `compare_templates`: one entry per rate
//! component whose value differs between the two templates, with fields whose
//! percentage change exceeds 5% flagged as significant. Unchanged components
//! still count toward `fields_compared` and the overall percentage.

use serde::{Deserialize, Serialize};

/// Percentage-change threshold above which a field counts as significant.
pub const SIGNIFICANT_CHANGE_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDifference {
    pub field: String,
    pub base_value: f64,
    pub compare_value: f64,
    /// `compare_value - base_value`
    pub difference_amount: f64,
    /// Signed percentage relative to the base value.
    pub difference_percent: f64,
}

impl FieldDifference {
    pub fn is_significant(&self) -> bool {
        self.difference_percent.abs() > SIGNIFICANT_CHANGE_PERCENT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub fields_compared: usize,
    pub fields_changed: usize,
    pub significant_changes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTemplateComparisonResult {
    pub base_id: String,
    pub compare_id: String,
    /// Entries only for components whose values differ.
    pub differences: Vec<FieldDifference>,
    /// Sum of absolute per-field percentage differences divided by the
    /// number of compared fields.
    pub difference_percent: f64,
    pub summary: ComparisonSummary,
}
