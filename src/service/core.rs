//! # Core Rate Service
//!
//! CRUD, calculation, and analytics over rate templates, orchestrating
//! lifecycle hooks, metrics, rate limiting, and caching around the
//! management layer. Infrastructure pieces are optional; absence means
//! no-op, never a branch in business logic outcomes.
//!
//! Failure policy: management-layer errors are logged at error level with
//! operation context and propagated unchanged (they are already structured
//! `RateError`s). Secondary concerns - metrics, audit recording, the
//! best-effort previous-data fetch before updates - are logged and swallowed.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::activity::{ActivityTracker, ActivityType};
use crate::cache::MemoryCache;
use crate::error::{RateError, RateResult};
use crate::hooks::{DeleteRequest, LifecycleHooks, StatusChangeRequest, UpdateRequest};
use crate::metrics::MetricsCollector;
use crate::models::{
    BulkCalculation, BulkCalculationParams, NewRateTemplate, RateAnalytics, RateCalculation,
    RateEmployee, RateTemplate, RateTemplateHistory, RateTemplateUpdate, StructuralValidation,
    TemplateStatus,
};
use crate::rate_limiter::SlidingWindowRateLimiter;

use super::{RateManagementService, RatesService};

/// Caller identity used when recording calculation audit events.
#[derive(Clone)]
pub struct AuditContext {
    pub tracker: Arc<ActivityTracker>,
    pub user_id: String,
    pub org_id: String,
}

impl std::fmt::Debug for AuditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditContext")
            .field("user_id", &self.user_id)
            .field("org_id", &self.org_id)
            .finish_non_exhaustive()
    }
}

pub struct RateServiceImpl {
    pub(crate) management: Arc<dyn RateManagementService>,
    pub(crate) hooks: LifecycleHooks,
    pub(crate) metrics: Option<Arc<MetricsCollector>>,
    pub(crate) limiter: Option<Arc<SlidingWindowRateLimiter>>,
    pub(crate) cache: Option<Arc<MemoryCache>>,
    pub(crate) audit: Option<AuditContext>,
}

impl std::fmt::Debug for RateServiceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateServiceImpl")
            .field("hooks", &self.hooks)
            .field("metrics", &self.metrics.is_some())
            .field("limiter", &self.limiter.is_some())
            .field("cache", &self.cache.is_some())
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

fn log_failure(operation: &str, err: &RateError) {
    error!(
        operation = operation,
        code = %err.code,
        context = ?err.context,
        error = %err,
        "rate service operation failed"
    );
}

impl RateServiceImpl {
    pub fn new(management: Arc<dyn RateManagementService>) -> Self {
        Self {
            management,
            hooks: LifecycleHooks::defaults(),
            metrics: None,
            limiter: None,
            cache: None,
            audit: None,
        }
    }

    /// Replace the hook bundle. The standard defaults are not re-applied;
    /// compose them explicitly with `LifecycleHooks::defaults().merge(...)`
    /// if wanted.
    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<SlidingWindowRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_cache(mut self, cache: Arc<MemoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_audit(mut self, audit: AuditContext) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Admission check under `<operation>:<scope>`. Strict limiters deny by
    /// erroring; non-strict denial has already been logged by the limiter
    /// and the operation proceeds.
    fn check_rate_limit(&self, operation: &str, scope: &str) -> RateResult<()> {
        if let Some(limiter) = &self.limiter {
            let key = format!("{operation}:{scope}");
            limiter.check(&key).map_err(|e| {
                log_failure(operation, &e);
                e
            })?;
        }
        Ok(())
    }

    fn invalidate_template_caches(&self, id: &str, org_id: Option<&str>) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&format!("template:{id}"));
            match org_id {
                Some(org) => cache.invalidate(&format!("templates:{org}")),
                // Org unknown without an extra read; drop all listings.
                None => cache.invalidate_prefix("templates:"),
            }
        }
    }

    async fn count_metric(&self, name: &str, labels: &[(&str, &str)]) {
        if let Some(metrics) = &self.metrics {
            metrics.increment_counter(name, 1.0, labels).await;
        }
    }
}

#[async_trait]
impl RatesService for RateServiceImpl {
    async fn get_templates(&self, org_id: &str) -> RateResult<Vec<RateTemplate>> {
        self.check_rate_limit("getTemplates", org_id)?;

        let templates = match &self.cache {
            Some(cache) => {
                let key = format!("templates:{org_id}");
                cache
                    .get_or_set(&key, || self.management.get_templates(org_id), None)
                    .await
            }
            None => self.management.get_templates(org_id).await,
        }
        .map_err(|e| {
            log_failure("getTemplates", &e);
            e
        })?;

        if let Some(metrics) = &self.metrics {
            metrics
                .record_distribution(
                    "template.list.count",
                    templates.len() as f64,
                    &[("org_id", org_id)],
                )
                .await;
        }
        Ok(templates)
    }

    async fn get_rate_template(&self, id: &str) -> RateResult<RateTemplate> {
        self.check_rate_limit("getRateTemplate", id)?;

        let fetch = || async {
            self.management
                .get_template(id)
                .await?
                .ok_or_else(|| RateError::not_found("rate template", id))
        };

        let template = match &self.cache {
            Some(cache) => {
                let key = format!("template:{id}");
                cache.get_or_set(&key, fetch, None).await
            }
            None => fetch().await,
        };

        template.map_err(|e| {
            log_failure("getRateTemplate", &e);
            e
        })
    }

    async fn create_rate_template(&self, template: NewRateTemplate) -> RateResult<RateTemplate> {
        let org_hint = template.org_id.clone();
        self.count_metric("template.create.attempt", &[("org_id", &org_hint)])
            .await;

        // Every attempt resolves to exactly one of success or error.
        let processed = match self.hooks.run_before_create(template).await {
            Ok(processed) => processed,
            Err(e) => {
                self.count_metric("template.create.error", &[("org_id", &org_hint)])
                    .await;
                log_failure("createRateTemplate", &e);
                return Err(e);
            }
        };
        let org_id = processed.org_id.clone();

        let created = match &self.metrics {
            Some(metrics) => {
                metrics
                    .time_async(
                        "template.create.duration",
                        &[("org_id", &org_id)],
                        self.management.create_template(processed),
                    )
                    .await
            }
            None => self.management.create_template(processed).await,
        };

        let created = match created {
            Ok(created) => created,
            Err(e) => {
                self.count_metric("template.create.error", &[("org_id", &org_id)])
                    .await;
                log_failure("createRateTemplate", &e);
                return Err(e);
            }
        };

        self.count_metric("template.create.success", &[("org_id", &org_id)])
            .await;
        self.invalidate_template_caches(&created.id, Some(&org_id));

        self.hooks.run_after_create(created).await.map_err(|e| {
            log_failure("createRateTemplate", &e);
            e
        })
    }

    async fn update_rate_template(
        &self,
        id: &str,
        update: RateTemplateUpdate,
    ) -> RateResult<RateTemplate> {
        // Best-effort: hooks receive previous data when it can be fetched,
        // but a failed fetch never blocks the update.
        let previous = match self.management.get_template(id).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(template_id = id, error = %e, "failed to fetch previous template data");
                None
            }
        };

        let request = UpdateRequest {
            id: id.to_string(),
            changes: update,
            previous,
        };
        let processed = self.hooks.run_before_update(request).await.map_err(|e| {
            log_failure("updateRateTemplate", &e);
            e
        })?;

        let updated = self
            .management
            .update_template(&processed.id, processed.changes)
            .await
            .map_err(|e| {
                log_failure("updateRateTemplate", &e);
                e
            })?;

        self.invalidate_template_caches(id, Some(&updated.org_id));

        self.hooks.run_after_update(updated).await.map_err(|e| {
            log_failure("updateRateTemplate", &e);
            e
        })
    }

    async fn update_rate_template_status(
        &self,
        id: &str,
        status: TemplateStatus,
        updated_by: &str,
    ) -> RateResult<()> {
        let request = StatusChangeRequest {
            id: id.to_string(),
            status,
            updated_by: updated_by.to_string(),
        };
        let processed = self
            .hooks
            .run_before_status_change(request)
            .await
            .map_err(|e| {
                log_failure("updateRateTemplateStatus", &e);
                e
            })?;

        self.management
            .update_status(&processed.id, processed.status, &processed.updated_by)
            .await
            .map_err(|e| {
                log_failure("updateRateTemplateStatus", &e);
                e
            })?;

        self.invalidate_template_caches(id, None);
        debug!(template_id = id, status = %status, "template status updated");
        self.count_metric("template.status_change", &[("status", status.as_str())])
            .await;

        self.hooks
            .run_after_status_change(processed)
            .await
            .map_err(|e| {
                log_failure("updateRateTemplateStatus", &e);
                e
            })?;
        Ok(())
    }

    async fn delete_rate_template(&self, id: &str) -> RateResult<()> {
        let request = DeleteRequest { id: id.to_string() };
        let processed = self.hooks.run_before_delete(request).await.map_err(|e| {
            log_failure("deleteRateTemplate", &e);
            e
        })?;

        self.management
            .delete_template(&processed.id)
            .await
            .map_err(|e| {
                log_failure("deleteRateTemplate", &e);
                e
            })?;

        self.invalidate_template_caches(id, None);
        self.count_metric("template.delete", &[]).await;

        self.hooks.run_after_delete(processed).await.map_err(|e| {
            log_failure("deleteRateTemplate", &e);
            e
        })?;
        Ok(())
    }

    async fn get_rate_template_history(
        &self,
        id: &str,
    ) -> RateResult<Vec<RateTemplateHistory>> {
        self.management.get_history(id).await.map_err(|e| {
            log_failure("getRateTemplateHistory", &e);
            e
        })
    }

    async fn get_rate_calculations(&self, id: &str) -> RateResult<Vec<RateCalculation>> {
        self.management.get_calculations(id).await.map_err(|e| {
            log_failure("getRateCalculations", &e);
            e
        })
    }

    async fn validate_rate_template(&self, template: &RateTemplate) -> RateResult<bool> {
        let validation: StructuralValidation = self
            .management
            .validate_template(template)
            .await
            .map_err(|e| {
                log_failure("validateRateTemplate", &e);
                e
            })?;
        Ok(validation.is_valid)
    }

    async fn calculate_rate(&self, template: &RateTemplate) -> RateResult<f64> {
        let result = self.management.calculate_rate(template).await.map_err(|e| {
            log_failure("calculateRate", &e);
            e
        })?;

        if let Some(audit) = &self.audit {
            audit
                .tracker
                .record_activity(
                    ActivityType::RateCalculated,
                    &audit.user_id,
                    &audit.org_id,
                    json!({ "templateId": template.id, "result": result }),
                    None,
                )
                .await;
        }
        Ok(result)
    }

    async fn get_bulk_calculations(&self, org_id: &str) -> RateResult<Vec<BulkCalculation>> {
        self.management
            .get_bulk_calculations(org_id)
            .await
            .map_err(|e| {
                log_failure("getBulkCalculations", &e);
                e
            })
    }

    async fn create_bulk_calculation(
        &self,
        params: BulkCalculationParams,
    ) -> RateResult<BulkCalculation> {
        let org_id = params.org_id.clone();
        let template_count = params.template_ids.len();

        let batch = self
            .management
            .create_bulk_calculation(params)
            .await
            .map_err(|e| {
                log_failure("createBulkCalculation", &e);
                e
            })?;

        if let Some(audit) = &self.audit {
            audit
                .tracker
                .record_activity(
                    ActivityType::BulkCalculation,
                    &audit.user_id,
                    &audit.org_id,
                    json!({ "batchId": batch.id, "templateCount": template_count }),
                    None,
                )
                .await;
        }
        self.count_metric("bulk_calculation.create", &[("org_id", &org_id)])
            .await;
        Ok(batch)
    }

    async fn get_analytics(&self, org_id: &str) -> RateResult<RateAnalytics> {
        self.management.get_analytics(org_id).await.map_err(|e| {
            log_failure("getAnalytics", &e);
            e
        })
    }

    async fn get_employees(&self) -> RateResult<Vec<RateEmployee>> {
        self.management.get_employees().await.map_err(|e| {
            log_failure("getEmployees", &e);
            e
        })
    }
}
