//! # Activity Tracking
//!
//! Append-only audit records for domain events (template lifecycle,
//! calculations), queryable per organisation. Recording is strictly
//! best-effort: a store failure is logged and swallowed so audit problems
//! never fail the operation being audited.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{RateError, RateErrorCode, RateResult};
use crate::hooks::LifecycleHooks;

/// Domain events recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    TemplateCreated,
    TemplateUpdated,
    TemplateStatusChanged,
    TemplateDeleted,
    RateCalculated,
    BulkCalculation,
}

/// Caller-supplied context, enriched by the tracker with service identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub activity_type: ActivityType,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub org_id: String,
    pub details: Value,
    pub metadata: ActivityMetadata,
}

/// Filter for audit reads.
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
    pub activity_type: Option<ActivityType>,
}

#[derive(Debug, thiserror::Error)]
#[error("activity store error: {0}")]
pub struct ActivityStoreError(pub String);

/// Persistence seam for audit records. The in-memory default suits a single
/// process; production deployments back this with their audit table.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn record(&self, activity: Activity) -> Result<(), ActivityStoreError>;
    async fn list(
        &self,
        org_id: &str,
        query: &ActivityQuery,
    ) -> Result<Vec<Activity>, ActivityStoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    activities: Mutex<Vec<Activity>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn record(&self, activity: Activity) -> Result<(), ActivityStoreError> {
        self.activities.lock().push(activity);
        Ok(())
    }

    async fn list(
        &self,
        org_id: &str,
        query: &ActivityQuery,
    ) -> Result<Vec<Activity>, ActivityStoreError> {
        let activities = self.activities.lock();
        let mut matched: Vec<Activity> = activities
            .iter()
            .filter(|a| a.org_id == org_id)
            .filter(|a| {
                query
                    .activity_type
                    .map_or(true, |wanted| a.activity_type == wanted)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

/// Records audit activities and serves the audit read path.
#[derive(Clone)]
pub struct ActivityTracker {
    store: Arc<dyn ActivityStore>,
    environment: String,
}

impl std::fmt::Debug for ActivityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityTracker")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl ActivityTracker {
    pub fn new(store: Arc<dyn ActivityStore>, environment: impl Into<String>) -> Self {
        Self {
            store,
            environment: environment.into(),
        }
    }

    pub fn in_memory(environment: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemoryActivityStore::new()), environment)
    }

    /// Record one audit activity. Never fails the caller; store problems are
    /// logged at warn.
    pub async fn record_activity(
        &self,
        activity_type: ActivityType,
        user_id: &str,
        org_id: &str,
        details: Value,
        metadata: Option<ActivityMetadata>,
    ) {
        let mut metadata = metadata.unwrap_or_default();
        metadata.service = Some(crate::metrics::SERVICE_TAG.to_string());
        metadata.service_version = Some(env!("CARGO_PKG_VERSION").to_string());
        metadata.environment = Some(self.environment.clone());

        let activity = Activity {
            id: Uuid::new_v4(),
            activity_type,
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            details,
            metadata,
        };

        if let Err(e) = self.store.record(activity).await {
            warn!(
                activity_type = ?activity_type,
                org_id = org_id,
                error = %e,
                "failed to record activity"
            );
        }
    }

    /// Audit read path, newest-first, optionally filtered by type.
    pub async fn get_rate_activities(
        &self,
        org_id: &str,
        query: ActivityQuery,
    ) -> RateResult<Vec<Activity>> {
        self.store.list(org_id, &query).await.map_err(|e| {
            RateError::from_source(
                RateErrorCode::DatabaseError,
                "failed to read activities",
                e,
            )
            .with_context("org_id", Value::String(org_id.to_string()))
        })
    }
}

/// Hook bundle recording the relevant activity after each mutating
/// lifecycle point. Tracking failures are already swallowed by
/// [`ActivityTracker::record_activity`], so these hooks cannot fail the
/// operation they observe.
pub fn activity_tracking_hooks(
    tracker: Arc<ActivityTracker>,
    user_id: String,
    org_id: String,
) -> LifecycleHooks {
    let hooks = LifecycleHooks::new();

    let hooks = {
        let tracker = tracker.clone();
        let user_id = user_id.clone();
        let org_id = org_id.clone();
        hooks.on_after_create(move |template| {
            let tracker = tracker.clone();
            let user_id = user_id.clone();
            let org_id = org_id.clone();
            async move {
                tracker
                    .record_activity(
                        ActivityType::TemplateCreated,
                        &user_id,
                        &org_id,
                        serde_json::json!({
                            "templateId": template.id,
                            "version": template.version,
                        }),
                        None,
                    )
                    .await;
                Ok(template)
            }
        })
    };

    let hooks = {
        let tracker = tracker.clone();
        let user_id = user_id.clone();
        let org_id = org_id.clone();
        hooks.on_after_update(move |template| {
            let tracker = tracker.clone();
            let user_id = user_id.clone();
            let org_id = org_id.clone();
            async move {
                tracker
                    .record_activity(
                        ActivityType::TemplateUpdated,
                        &user_id,
                        &org_id,
                        serde_json::json!({
                            "templateId": template.id,
                            "version": template.version,
                        }),
                        None,
                    )
                    .await;
                Ok(template)
            }
        })
    };

    let hooks = {
        let tracker = tracker.clone();
        let user_id = user_id.clone();
        let org_id = org_id.clone();
        hooks.on_after_status_change(move |change| {
            let tracker = tracker.clone();
            let user_id = user_id.clone();
            let org_id = org_id.clone();
            async move {
                tracker
                    .record_activity(
                        ActivityType::TemplateStatusChanged,
                        &user_id,
                        &org_id,
                        serde_json::json!({
                            "templateId": change.id,
                            "status": change.status,
                        }),
                        None,
                    )
                    .await;
                Ok(change)
            }
        })
    };

    hooks.on_after_delete(move |request| {
        let tracker = tracker.clone();
        let user_id = user_id.clone();
        let org_id = org_id.clone();
        async move {
            tracker
                .record_activity(
                    ActivityType::TemplateDeleted,
                    &user_id,
                    &org_id,
                    serde_json::json!({ "templateId": request.id }),
                    None,
                )
                .await;
            Ok(request)
        }
    })
}
