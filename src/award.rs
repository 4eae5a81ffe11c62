//! # Award Integration
//!
//! Validates template base rates against an external wage-rules provider
//! (Fair Work award minimums) and surfaces rate suggestions by
//! industry/role/experience. The provider is a narrow async contract;
//! provider failures surface as `FAIRWORK_SERVICE_ERROR`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::error::{RateError, RateErrorCode, RateResult};
use crate::models::RateTemplate;

/// Baseline classification applied when a template's metadata carries no
/// award details.
pub const DEFAULT_AWARD_CODE: &str = "MA000025";
pub const DEFAULT_LEVEL_CODE: &str = "L1";
pub const DEFAULT_EMPLOYMENT_TYPE: &str = "casual";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardValidationRequest {
    pub rate: f64,
    pub award_code: String,
    pub level_code: String,
    pub employment_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardValidationResponse {
    pub is_valid: bool,
    pub minimum_rate: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRateSuggestion {
    pub award_code: String,
    pub level_code: String,
    pub suggested_rate: f64,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
#[error("wage rules provider error: {0}")]
pub struct WageRulesError(pub String);

/// External wage-rules provider contract. Ranking and matching policy for
/// suggestions is provider-defined.
#[async_trait]
pub trait WageRulesProvider: Send + Sync {
    async fn validate_rate(
        &self,
        request: AwardValidationRequest,
    ) -> Result<AwardValidationResponse, WageRulesError>;

    async fn suggested_rates(
        &self,
        criteria: SuggestionCriteria,
    ) -> Result<Vec<AwardRateSuggestion>, WageRulesError>;
}

/// Outcome of checking one template against award minimums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRateValidationResult {
    pub is_valid: bool,
    pub minimum_rate: f64,
    pub award_code: String,
    pub level_code: String,
    /// `base_rate - minimum_rate`; negative means below the award floor.
    pub difference: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

/// Facade over the wage-rules provider working in template terms.
#[derive(Clone)]
pub struct AwardRateValidator {
    provider: Arc<dyn WageRulesProvider>,
}

impl std::fmt::Debug for AwardRateValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwardRateValidator").finish_non_exhaustive()
    }
}

impl AwardRateValidator {
    pub fn new(provider: Arc<dyn WageRulesProvider>) -> Self {
        Self { provider }
    }

    /// Validate a template's base rate against its award classification.
    /// Overall validity is provider-determined; `difference` reports the
    /// margin over (or shortfall under) the award minimum.
    pub async fn validate_template(
        &self,
        template: &RateTemplate,
    ) -> RateResult<AwardRateValidationResult> {
        let metadata = template.metadata.as_ref();
        let award_code = metadata
            .and_then(|m| m.award_code.clone())
            .unwrap_or_else(|| DEFAULT_AWARD_CODE.to_string());
        let level_code = metadata
            .and_then(|m| m.level_code.clone())
            .unwrap_or_else(|| DEFAULT_LEVEL_CODE.to_string());
        let employment_type = metadata
            .and_then(|m| m.employment_type.clone())
            .unwrap_or_else(|| DEFAULT_EMPLOYMENT_TYPE.to_string());

        debug!(
            template_id = %template.id,
            award_code = %award_code,
            level_code = %level_code,
            "validating template against award"
        );

        let response = self
            .provider
            .validate_rate(AwardValidationRequest {
                rate: template.rates.base_rate,
                award_code: award_code.clone(),
                level_code: level_code.clone(),
                employment_type,
            })
            .await
            .map_err(|e| {
                RateError::from_source(
                    RateErrorCode::FairworkServiceError,
                    "award validation failed",
                    e,
                )
                .with_context("template_id", json!(template.id))
                .with_context("award_code", json!(award_code))
            })?;

        Ok(AwardRateValidationResult {
            is_valid: response.is_valid,
            minimum_rate: response.minimum_rate,
            award_code,
            level_code,
            difference: template.rates.base_rate - response.minimum_rate,
            messages: response.messages,
        })
    }

    /// Candidate award/level/rate combinations for the given criteria.
    pub async fn suggested_rates(
        &self,
        criteria: SuggestionCriteria,
    ) -> RateResult<Vec<AwardRateSuggestion>> {
        self.provider
            .suggested_rates(criteria)
            .await
            .map_err(|e| {
                RateError::from_source(
                    RateErrorCode::FairworkServiceError,
                    "rate suggestion lookup failed",
                    e,
                )
            })
    }
}
