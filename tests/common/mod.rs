//! Shared test fixtures: an in-memory management layer and a mock
//! wage-rules provider.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rates_core::award::{
    AwardRateSuggestion, AwardValidationRequest, AwardValidationResponse, SuggestionCriteria,
    WageRulesError, WageRulesProvider,
};
use rates_core::error::{RateError, RateResult};
use rates_core::models::{
    BulkCalculation, BulkCalculationParams, BulkCalculationStatus, NewRateTemplate, RateAnalytics,
    RateCalculation, RateEmployee, RateTemplate, RateTemplateHistory, RateTemplateUpdate,
    StructuralValidation, TemplateStatus, TemplateType,
};
use rates_core::service::RateManagementService;

/// In-memory management layer with the same contract a database-backed one
/// carries: version bumps by exactly one per mutation, a history entry per
/// change, and status-graph enforcement.
#[derive(Default)]
pub struct InMemoryRateManagement {
    templates: Mutex<HashMap<String, RateTemplate>>,
    history: Mutex<HashMap<String, Vec<RateTemplateHistory>>>,
    calculations: Mutex<HashMap<String, Vec<RateCalculation>>>,
    bulk: Mutex<Vec<BulkCalculation>>,
    employees: Mutex<Vec<RateEmployee>>,
    next_id: AtomicUsize,
    pub get_templates_calls: AtomicUsize,
    /// When set, reads fail with a `DATABASE_ERROR` as a real outage would.
    pub simulate_outage: AtomicBool,
}

impl InMemoryRateManagement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employees(employees: Vec<RateEmployee>) -> Self {
        let management = Self::new();
        *management.employees.lock() = employees;
        management
    }

    fn check_outage(&self) -> RateResult<()> {
        if self.simulate_outage.load(Ordering::SeqCst) {
            return Err(RateError::database_error("simulated outage")
                .with_context("store", json!("in-memory")));
        }
        Ok(())
    }

    fn append_history(&self, template_id: &str, version: i64, changes: Map<String, Value>) {
        let entry = RateTemplateHistory {
            id: format!("hist-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            template_id: template_id.to_string(),
            version,
            changes,
            created_at: Utc::now(),
        };
        self.history
            .lock()
            .entry(template_id.to_string())
            .or_default()
            .push(entry);
    }
}

#[async_trait]
impl RateManagementService for InMemoryRateManagement {
    async fn get_templates(&self, org_id: &str) -> RateResult<Vec<RateTemplate>> {
        self.check_outage()?;
        self.get_templates_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .templates
            .lock()
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn get_template(&self, id: &str) -> RateResult<Option<RateTemplate>> {
        self.check_outage()?;
        Ok(self.templates.lock().get(id).cloned())
    }

    async fn create_template(&self, template: NewRateTemplate) -> RateResult<RateTemplate> {
        let now = Utc::now();
        let id = format!("tpl-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = RateTemplate {
            id: id.clone(),
            org_id: template.org_id,
            name: template.name,
            template_type: template.template_type,
            status: template.status.unwrap_or(TemplateStatus::Draft),
            version: 1,
            rates: template.rates,
            effective_from: template.effective_from,
            effective_to: template.effective_to,
            created_at: now,
            updated_at: now,
            created_by: template.created_by.clone(),
            updated_by: template.created_by,
            metadata: template.metadata,
        };

        // Version 1's history entry is the creation snapshot, so a restore
        // to version 1 can replay it like any other change set.
        let snapshot = match serde_json::to_value(&created) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        self.append_history(&id, 1, snapshot);

        self.templates.lock().insert(id, created.clone());
        Ok(created)
    }

    async fn update_template(
        &self,
        id: &str,
        update: RateTemplateUpdate,
    ) -> RateResult<RateTemplate> {
        let current = self
            .templates
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RateError::not_found("rate template", id))?;

        let mut merged = current.apply_changes(&update.changes)?;
        merged.version = current.version + 1;
        merged.updated_at = Utc::now();

        self.append_history(id, merged.version, update.changes);
        self.templates.lock().insert(id.to_string(), merged.clone());
        Ok(merged)
    }

    async fn update_status(
        &self,
        id: &str,
        status: TemplateStatus,
        updated_by: &str,
    ) -> RateResult<()> {
        let mut templates = self.templates.lock();
        let current = templates
            .get_mut(id)
            .ok_or_else(|| RateError::not_found("rate template", id))?;

        if !current.status.can_transition_to(status) {
            return Err(RateError::new(
                format!("cannot transition from {} to {status}", current.status),
                rates_core::RateErrorCode::InvalidStatusTransition,
            )
            .with_context("from", json!(current.status))
            .with_context("to", json!(status)));
        }

        current.status = status;
        current.version += 1;
        current.updated_at = Utc::now();
        current.updated_by = updated_by.to_string();
        let version = current.version;
        drop(templates);

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(status));
        self.append_history(id, version, changes);
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> RateResult<()> {
        self.templates
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RateError::not_found("rate template", id))
    }

    async fn get_history(&self, template_id: &str) -> RateResult<Vec<RateTemplateHistory>> {
        self.check_outage()?;
        Ok(self
            .history
            .lock()
            .get(template_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_calculations(&self, template_id: &str) -> RateResult<Vec<RateCalculation>> {
        Ok(self
            .calculations
            .lock()
            .get(template_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn validate_template(&self, template: &RateTemplate) -> RateResult<StructuralValidation> {
        let mut errors = Vec::new();
        if template.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if template.rates.base_rate <= 0.0 {
            errors.push("baseRate must be positive".to_string());
        }
        Ok(StructuralValidation {
            is_valid: errors.is_empty(),
            errors,
        })
    }

    async fn calculate_rate(&self, template: &RateTemplate) -> RateResult<f64> {
        let rates = &template.rates;
        let loaded = rates.base_rate * (1.0 + rates.casual_loading / 100.0);
        let oncosts = rates.super_rate
            + rates.leave_loading
            + rates.workers_comp_rate
            + rates.payroll_tax_rate
            + rates.training_cost_rate
            + rates.other_costs_rate
            - rates.funding_offset;
        let result = loaded * (1.0 + oncosts / 100.0) + rates.base_margin;

        let calculation = RateCalculation {
            id: format!("calc-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            template_id: template.id.clone(),
            result,
            created_at: Utc::now(),
        };
        self.calculations
            .lock()
            .entry(template.id.clone())
            .or_default()
            .push(calculation);
        Ok(result)
    }

    async fn get_bulk_calculations(&self, org_id: &str) -> RateResult<Vec<BulkCalculation>> {
        Ok(self
            .bulk
            .lock()
            .iter()
            .filter(|b| b.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn create_bulk_calculation(
        &self,
        params: BulkCalculationParams,
    ) -> RateResult<BulkCalculation> {
        let now = Utc::now();
        let mut calculations = Vec::new();
        for template_id in &params.template_ids {
            let template = self
                .get_template(template_id)
                .await?
                .ok_or_else(|| RateError::not_found("rate template", template_id))?;
            let result = self.calculate_rate(&template).await?;
            calculations.push(RateCalculation {
                id: format!("calc-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                template_id: template_id.clone(),
                result,
                created_at: now,
            });
        }

        let batch = BulkCalculation {
            id: format!("bulk-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            org_id: params.org_id,
            status: BulkCalculationStatus::Completed,
            calculations,
            created_at: now,
            updated_at: now,
        };
        self.bulk.lock().push(batch.clone());
        Ok(batch)
    }

    async fn get_analytics(&self, org_id: &str) -> RateResult<RateAnalytics> {
        let templates: Vec<RateTemplate> = self
            .templates
            .lock()
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect();
        let total = templates.len();
        let active = templates
            .iter()
            .filter(|t| t.status == TemplateStatus::Active)
            .count();
        let average_base_rate = if total == 0 {
            0.0
        } else {
            templates.iter().map(|t| t.rates.base_rate).sum::<f64>() / total as f64
        };
        let total_calculations = self.calculations.lock().values().map(Vec::len).sum();
        Ok(RateAnalytics {
            org_id: org_id.to_string(),
            total_templates: total,
            active_templates: active,
            average_base_rate,
            total_calculations,
        })
    }

    async fn get_employees(&self) -> RateResult<Vec<RateEmployee>> {
        self.check_outage()?;
        Ok(self.employees.lock().clone())
    }
}

/// Wage-rules provider with a fixed minimum. `award_code` "BROKEN" simulates
/// an upstream outage.
pub struct MockWageRules {
    pub minimum: f64,
}

#[async_trait]
impl WageRulesProvider for MockWageRules {
    async fn validate_rate(
        &self,
        request: AwardValidationRequest,
    ) -> Result<AwardValidationResponse, WageRulesError> {
        if request.award_code == "BROKEN" {
            return Err(WageRulesError("wage rules service unavailable".into()));
        }
        let is_valid = request.rate >= self.minimum;
        Ok(AwardValidationResponse {
            is_valid,
            minimum_rate: self.minimum,
            messages: if is_valid {
                vec![]
            } else {
                vec![format!(
                    "rate {} is below the award minimum {}",
                    request.rate, self.minimum
                )]
            },
        })
    }

    async fn suggested_rates(
        &self,
        _criteria: SuggestionCriteria,
    ) -> Result<Vec<AwardRateSuggestion>, WageRulesError> {
        Ok(vec![AwardRateSuggestion {
            award_code: "MA000025".to_string(),
            level_code: "L1".to_string(),
            suggested_rate: self.minimum,
            description: "award minimum".to_string(),
        }])
    }
}

pub fn new_template(org_id: &str, name: &str, base_rate: f64) -> NewRateTemplate {
    NewRateTemplate {
        org_id: org_id.to_string(),
        name: name.to_string(),
        template_type: TemplateType::Hourly,
        status: None,
        rates: rates_core::models::RateComponents {
            base_rate,
            casual_loading: 25.0,
            ..Default::default()
        },
        effective_from: Utc::now(),
        effective_to: None,
        created_by: "user-1".to_string(),
        metadata: None,
    }
}
