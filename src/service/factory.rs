//! # Service Factory
//!
//! Declarative assembly of a rates service from a [`RateServiceConfig`]:
//! each enabled concern (metrics, rate limiting, caching, activity tracking,
//! award validation) is constructed and wired in, disabled concerns are
//! simply absent. Returns the enhanced service when enabled, otherwise the
//! core service alone.

use std::sync::Arc;
use tracing::info;

use crate::activity::{activity_tracking_hooks, ActivityStore, ActivityTracker};
use crate::award::{AwardRateValidator, WageRulesProvider};
use crate::cache::MemoryCache;
use crate::config::RateServiceConfig;
use crate::hooks::LifecycleHooks;
use crate::metrics::{MetricsCollector, MetricsSink, TracingMetricsSink};
use crate::rate_limiter::SlidingWindowRateLimiter;

use super::core::{AuditContext, RateServiceImpl};
use super::enhanced::{BulkOperationStore, EnhancedRateServiceImpl};
use super::RateManagementService;

/// Per-instance options the configuration cannot express: caller identity
/// for audit records, extra hooks, and infrastructure overrides.
#[derive(Default)]
pub struct ServiceOptions {
    pub user_id: Option<String>,
    pub org_id: Option<String>,
    /// Run before the standard activity-tracking hooks at every lifecycle
    /// point.
    pub custom_hooks: Option<LifecycleHooks>,
    pub metrics_sink: Option<Arc<dyn MetricsSink>>,
    pub activity_store: Option<Arc<dyn ActivityStore>>,
    pub bulk_store: Option<Arc<dyn BulkOperationStore>>,
}

impl std::fmt::Debug for ServiceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceOptions")
            .field("user_id", &self.user_id)
            .field("org_id", &self.org_id)
            .field("custom_hooks", &self.custom_hooks.is_some())
            .field("metrics_sink", &self.metrics_sink.is_some())
            .field("activity_store", &self.activity_store.is_some())
            .field("bulk_store", &self.bulk_store.is_some())
            .finish()
    }
}

/// What the factory produced, depending on `config.enhanced.enabled`.
#[derive(Debug)]
pub enum ConfiguredRateService {
    Core(Arc<RateServiceImpl>),
    Enhanced(Arc<EnhancedRateServiceImpl>),
}

impl ConfiguredRateService {
    /// The [`super::RatesService`] view, regardless of variant.
    pub fn rates_service(&self) -> Arc<dyn super::RatesService> {
        match self {
            Self::Core(service) => service.clone(),
            Self::Enhanced(service) => service.clone(),
        }
    }

    pub fn enhanced(&self) -> Option<&Arc<EnhancedRateServiceImpl>> {
        match self {
            Self::Core(_) => None,
            Self::Enhanced(service) => Some(service),
        }
    }
}

/// Assemble a service instance from configuration.
///
/// Hook order at every lifecycle point is standard defaults, then
/// `options.custom_hooks`, then activity tracking. Activity tracking is only
/// wired when enabled and both `user_id` and `org_id` are supplied; award
/// validation only when enabled and a provider is supplied.
pub fn create_configured_rate_service(
    management: Arc<dyn RateManagementService>,
    wage_provider: Option<Arc<dyn WageRulesProvider>>,
    config: &RateServiceConfig,
    options: ServiceOptions,
) -> ConfiguredRateService {
    let environment = config.environment.as_str();

    let metrics = config.metrics.enabled.then(|| {
        let sink = options
            .metrics_sink
            .clone()
            .unwrap_or_else(|| Arc::new(TracingMetricsSink));
        Arc::new(MetricsCollector::new(
            config.metrics.namespace.clone(),
            environment,
            sink,
        ))
    });

    let limiter = config.rate_limit.enabled.then(|| {
        Arc::new(SlidingWindowRateLimiter::new(
            config.rate_limit.limit,
            config.rate_limit.window(),
            config.rate_limit.strict,
        ))
    });

    let cache = config
        .cache
        .enabled
        .then(|| Arc::new(MemoryCache::new(config.cache.ttl())));

    let mut hooks = LifecycleHooks::defaults();
    if let Some(custom) = options.custom_hooks {
        hooks = hooks.merge(custom);
    }

    let mut audit = None;
    if config.activity.enabled {
        if let (Some(user_id), Some(org_id)) = (&options.user_id, &options.org_id) {
            let tracker = Arc::new(match &options.activity_store {
                Some(store) => ActivityTracker::new(store.clone(), environment),
                None => ActivityTracker::in_memory(environment),
            });
            hooks = hooks.merge(activity_tracking_hooks(
                tracker.clone(),
                user_id.clone(),
                org_id.clone(),
            ));
            audit = Some(AuditContext {
                tracker,
                user_id: user_id.clone(),
                org_id: org_id.clone(),
            });
        }
    }

    let mut core = RateServiceImpl::new(management).with_hooks(hooks);
    if let Some(metrics) = metrics {
        core = core.with_metrics(metrics);
    }
    if let Some(limiter) = limiter {
        core = core.with_rate_limiter(limiter);
    }
    if let Some(cache) = cache {
        core = core.with_cache(cache);
    }
    if let Some(audit) = audit {
        core = core.with_audit(audit);
    }

    info!(
        environment = environment,
        metrics = config.metrics.enabled,
        rate_limit = config.rate_limit.enabled,
        cache = config.cache.enabled,
        activity = config.activity.enabled,
        award = config.award.enabled && wage_provider.is_some(),
        enhanced = config.enhanced.enabled,
        "rates service assembled"
    );

    if !config.enhanced.enabled {
        return ConfiguredRateService::Core(Arc::new(core));
    }

    let mut enhanced = EnhancedRateServiceImpl::new(core);
    if config.award.enabled {
        if let Some(provider) = wage_provider {
            enhanced =
                enhanced.with_award_validator(Arc::new(AwardRateValidator::new(provider)));
        }
    }
    if let Some(store) = options.bulk_store {
        enhanced = enhanced.with_bulk_store(store);
    }
    ConfiguredRateService::Enhanced(Arc::new(enhanced))
}
