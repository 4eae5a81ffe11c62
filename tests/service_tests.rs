//! Core service behavior against an in-memory management layer.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;

use rates_core::activity::{ActivityQuery, ActivityType, InMemoryActivityStore};
use rates_core::config::{Environment, RateServiceConfig};
use rates_core::error::{RateError, RateErrorCode};
use rates_core::hooks::LifecycleHooks;
use rates_core::metrics::{InMemoryMetricsSink, MetricsCollector};
use rates_core::models::{NewRateTemplate, RateTemplateUpdate, TemplateStatus};
use rates_core::service::{
    create_configured_rate_service, ConfiguredRateService, RateServiceImpl, RatesService,
    ServiceOptions,
};

use common::{new_template, InMemoryRateManagement};

fn bare_service() -> (Arc<InMemoryRateManagement>, RateServiceImpl) {
    let management = Arc::new(InMemoryRateManagement::new());
    let service = RateServiceImpl::new(management.clone());
    (management, service)
}

#[tokio::test]
async fn created_template_defaults_to_draft_at_version_one() {
    let (_management, service) = bare_service();

    let created = service
        .create_rate_template(new_template("org-1", "Apprentice L1", 28.0))
        .await
        .unwrap();

    assert_eq!(created.status, TemplateStatus::Draft);
    assert_eq!(created.version, 1);
    assert_eq!(created.rates.base_rate, 28.0);

    let fetched = service.get_rate_template(&created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn explicit_status_is_not_overridden() {
    let (_management, service) = bare_service();

    let mut template = new_template("org-1", "Active from day one", 30.0);
    template.status = Some(TemplateStatus::Active);
    let created = service.create_rate_template(template).await.unwrap();
    assert_eq!(created.status, TemplateStatus::Active);
}

#[tokio::test]
async fn version_increases_by_one_on_every_mutation() {
    let (_management, service) = bare_service();

    let created = service
        .create_rate_template(new_template("org-1", "t", 28.0))
        .await
        .unwrap();
    assert_eq!(created.version, 1);

    let updated = service
        .update_rate_template(
            &created.id,
            RateTemplateUpdate::new().set("baseRate", json!(30.0)),
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    let updated = service
        .update_rate_template(
            &created.id,
            RateTemplateUpdate::new().set("name", json!("renamed")),
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 3);

    service
        .update_rate_template_status(&created.id, TemplateStatus::Active, "user-2")
        .await
        .unwrap();
    let current = service.get_rate_template(&created.id).await.unwrap();
    assert_eq!(current.version, 4);
    assert_eq!(current.updated_by, "user-2");
}

#[tokio::test]
async fn unknown_template_is_a_404_not_found() {
    let (_management, service) = bare_service();

    let err = service.get_rate_template("missing").await.unwrap_err();
    assert_eq!(err.code, RateErrorCode::NotFound);
    assert_eq!(err.http_status, 404);
    assert_eq!(err.context["id"], json!("missing"));
}

#[tokio::test]
async fn illegal_status_transition_is_rejected() {
    let (_management, service) = bare_service();

    let created = service
        .create_rate_template(new_template("org-1", "t", 28.0))
        .await
        .unwrap();
    service
        .update_rate_template_status(&created.id, TemplateStatus::Deleted, "user-1")
        .await
        .unwrap();

    let err = service
        .update_rate_template_status(&created.id, TemplateStatus::Active, "user-1")
        .await
        .unwrap_err();
    assert_eq!(err.code, RateErrorCode::InvalidStatusTransition);
}

#[tokio::test]
async fn management_errors_pass_through_unwrapped() {
    let (management, service) = bare_service();
    management.simulate_outage.store(true, Ordering::SeqCst);

    let err = service.get_templates("org-1").await.unwrap_err();
    assert_eq!(err.code, RateErrorCode::DatabaseError);
    // The original message and context survive untouched.
    assert_eq!(err.message, "simulated outage");
    assert_eq!(err.context["store"], json!("in-memory"));
}

#[tokio::test]
async fn updates_record_history_diffs() {
    let (_management, service) = bare_service();

    let created = service
        .create_rate_template(new_template("org-1", "t", 28.0))
        .await
        .unwrap();
    service
        .update_rate_template(
            &created.id,
            RateTemplateUpdate::new().set("baseRate", json!(32.0)),
        )
        .await
        .unwrap();

    let history = service
        .get_rate_template_history(&created.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].version, 2);
    assert_eq!(history[1].changes["baseRate"], json!(32.0));
}

#[tokio::test]
async fn calculation_results_are_recorded() {
    let (_management, service) = bare_service();

    let created = service
        .create_rate_template(new_template("org-1", "t", 20.0))
        .await
        .unwrap();
    let result = service.calculate_rate(&created).await.unwrap();
    // base 20 with 25% casual loading and no oncosts or margin.
    assert!((result - 25.0).abs() < 1e-9);

    let calculations = service.get_rate_calculations(&created.id).await.unwrap();
    assert_eq!(calculations.len(), 1);
    assert_eq!(calculations[0].result, result);
}

#[tokio::test]
async fn structural_validation_reflects_management_verdict() {
    let (_management, service) = bare_service();

    let valid = service
        .create_rate_template(new_template("org-1", "t", 28.0))
        .await
        .unwrap();
    assert!(service.validate_rate_template(&valid).await.unwrap());

    let mut broken = valid.clone();
    broken.rates.base_rate = 0.0;
    assert!(!service.validate_rate_template(&broken).await.unwrap());
}

#[tokio::test]
async fn rejected_create_hook_still_reconciles_the_attempt_counter() {
    let management = Arc::new(InMemoryRateManagement::new());
    let sink = Arc::new(InMemoryMetricsSink::new());
    let metrics = Arc::new(MetricsCollector::new("rates", "test", sink.clone()));
    let hooks =
        LifecycleHooks::defaults().on_before_create(|_t: NewRateTemplate| async move {
            Err(RateError::validation_failed("rejected by policy hook"))
        });
    let service = RateServiceImpl::new(management)
        .with_hooks(hooks)
        .with_metrics(metrics);

    let err = service
        .create_rate_template(new_template("org-1", "t", 28.0))
        .await
        .unwrap_err();
    assert_eq!(err.code, RateErrorCode::ValidationFailed);

    // Every attempt ends up in exactly one of the success or error counters.
    assert_eq!(sink.counter_total("rates.template.create.attempt"), 1.0);
    assert_eq!(sink.counter_total("rates.template.create.error"), 1.0);
    assert_eq!(sink.counter_total("rates.template.create.success"), 0.0);
}

#[tokio::test]
async fn factory_wires_caching_so_repeated_reads_skip_management() {
    let management = Arc::new(InMemoryRateManagement::new());
    let mut config = RateServiceConfig::for_environment(Environment::Test);
    config.enhanced.enabled = false;

    let service = create_configured_rate_service(
        management.clone(),
        None,
        &config,
        ServiceOptions::default(),
    );
    let rates = service.rates_service();

    rates
        .create_rate_template(new_template("org-1", "t", 28.0))
        .await
        .unwrap();

    rates.get_templates("org-1").await.unwrap();
    rates.get_templates("org-1").await.unwrap();
    rates.get_templates("org-1").await.unwrap();
    assert_eq!(management.get_templates_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn writes_invalidate_cached_listings() {
    let management = Arc::new(InMemoryRateManagement::new());
    let mut config = RateServiceConfig::for_environment(Environment::Test);
    config.enhanced.enabled = false;

    let service = create_configured_rate_service(
        management.clone(),
        None,
        &config,
        ServiceOptions::default(),
    );
    let rates = service.rates_service();

    rates
        .create_rate_template(new_template("org-1", "first", 28.0))
        .await
        .unwrap();
    assert_eq!(rates.get_templates("org-1").await.unwrap().len(), 1);

    rates
        .create_rate_template(new_template("org-1", "second", 30.0))
        .await
        .unwrap();
    assert_eq!(rates.get_templates("org-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn strict_rate_limit_denial_is_a_429() {
    let management = Arc::new(InMemoryRateManagement::new());
    let mut config = RateServiceConfig::for_environment(Environment::Test);
    config.enhanced.enabled = false;
    config.cache.enabled = false;
    config.rate_limit.limit = 1;
    config.rate_limit.strict = true;

    let service =
        create_configured_rate_service(management, None, &config, ServiceOptions::default());
    let rates = service.rates_service();

    rates.get_templates("org-1").await.unwrap();
    let err = rates.get_templates("org-1").await.unwrap_err();
    assert_eq!(err.code, RateErrorCode::RateLimitExceeded);
    assert_eq!(err.http_status, 429);

    // Other tenants are unaffected.
    rates.get_templates("org-2").await.unwrap();
}

#[tokio::test]
async fn non_strict_rate_limiting_never_blocks() {
    let management = Arc::new(InMemoryRateManagement::new());
    let mut config = RateServiceConfig::for_environment(Environment::Test);
    config.enhanced.enabled = false;
    config.cache.enabled = false;
    config.rate_limit.limit = 1;
    config.rate_limit.strict = false;

    let service =
        create_configured_rate_service(management, None, &config, ServiceOptions::default());
    let rates = service.rates_service();

    for _ in 0..5 {
        rates.get_templates("org-1").await.unwrap();
    }
}

#[tokio::test]
async fn lifecycle_activities_are_recorded_when_tracking_is_enabled() {
    let management = Arc::new(InMemoryRateManagement::new());
    let store = Arc::new(InMemoryActivityStore::new());
    let mut config = RateServiceConfig::for_environment(Environment::Test);
    config.enhanced.enabled = false;
    config.activity.enabled = true;

    let service = create_configured_rate_service(
        management,
        None,
        &config,
        ServiceOptions {
            user_id: Some("user-1".to_string()),
            org_id: Some("org-1".to_string()),
            activity_store: Some(store.clone()),
            ..Default::default()
        },
    );
    let rates = service.rates_service();

    let created = rates
        .create_rate_template(new_template("org-1", "t", 28.0))
        .await
        .unwrap();
    rates
        .update_rate_template(
            &created.id,
            RateTemplateUpdate::new().set("baseRate", json!(29.0)),
        )
        .await
        .unwrap();
    rates.delete_rate_template(&created.id).await.unwrap();

    use rates_core::activity::ActivityStore;
    let recorded = store
        .list("org-1", &ActivityQuery::default())
        .await
        .unwrap();
    let types: Vec<ActivityType> = recorded.iter().map(|a| a.activity_type).collect();
    assert!(types.contains(&ActivityType::TemplateCreated));
    assert!(types.contains(&ActivityType::TemplateUpdated));
    assert!(types.contains(&ActivityType::TemplateDeleted));
}

#[tokio::test]
async fn factory_returns_enhanced_when_enabled() {
    let management = Arc::new(InMemoryRateManagement::new());
    let config = RateServiceConfig::for_environment(Environment::Test);

    let service =
        create_configured_rate_service(management, None, &config, ServiceOptions::default());
    assert!(matches!(&service, ConfiguredRateService::Enhanced(_)));
    assert!(service.enhanced().is_some());
}
