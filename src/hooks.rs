//! # Lifecycle Hooks
//!
//! Before/after interceptors around template create, update, status-change,
//! and delete. Each lifecycle point holds an explicit ordered list of
//! interceptors; running a point awaits each interceptor in registration
//! order, threading the (possibly transformed) value through. Merging hook
//! bundles appends, so "custom hooks first, activity-tracking hooks second"
//! is a property of merge order, not of the interceptors themselves.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::RateResult;
use crate::models::{NewRateTemplate, RateTemplate, RateTemplateUpdate, TemplateStatus};

/// One interceptor in a chain: receives the value, returns the (possibly
/// transformed) value.
pub type Interceptor<T> = Box<dyn Fn(T) -> BoxFuture<'static, RateResult<T>> + Send + Sync>;

/// Input threaded through the update hooks.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub id: String,
    pub changes: RateTemplateUpdate,
    /// Best-effort snapshot of the pre-update record; absent when the fetch
    /// failed.
    pub previous: Option<RateTemplate>,
}

/// Input threaded through the status-change hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub id: String,
    pub status: TemplateStatus,
    pub updated_by: String,
}

/// Input threaded through the delete hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub id: String,
}

async fn run_chain<T>(chain: &[Interceptor<T>], mut value: T) -> RateResult<T> {
    for interceptor in chain {
        value = interceptor(value).await?;
    }
    Ok(value)
}

fn boxed<T, F, Fut>(f: F) -> Interceptor<T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = RateResult<T>> + Send + 'static,
{
    Box::new(move |value| Box::pin(f(value)))
}

/// Composable hook bundle. All fields are ordered chains; empty chains are
/// pass-throughs.
#[derive(Default)]
pub struct LifecycleHooks {
    before_create: Vec<Interceptor<NewRateTemplate>>,
    after_create: Vec<Interceptor<RateTemplate>>,
    before_update: Vec<Interceptor<UpdateRequest>>,
    after_update: Vec<Interceptor<RateTemplate>>,
    before_status_change: Vec<Interceptor<StatusChangeRequest>>,
    after_status_change: Vec<Interceptor<StatusChangeRequest>>,
    before_delete: Vec<Interceptor<DeleteRequest>>,
    after_delete: Vec<Interceptor<DeleteRequest>>,
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("before_create", &self.before_create.len())
            .field("after_create", &self.after_create.len())
            .field("before_update", &self.before_update.len())
            .field("after_update", &self.after_update.len())
            .field("before_status_change", &self.before_status_change.len())
            .field("after_status_change", &self.after_status_change.len())
            .field("before_delete", &self.before_delete.len())
            .field("after_delete", &self.after_delete.len())
            .finish()
    }
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard defaults applied by the service: new templates without a
    /// status start as drafts.
    pub fn defaults() -> Self {
        Self::new().on_before_create(|mut template: NewRateTemplate| async move {
            if template.status.is_none() {
                template.status = Some(TemplateStatus::Draft);
            }
            Ok(template)
        })
    }

    pub fn on_before_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(NewRateTemplate) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<NewRateTemplate>> + Send + 'static,
    {
        self.before_create.push(boxed(f));
        self
    }

    pub fn on_after_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RateTemplate) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<RateTemplate>> + Send + 'static,
    {
        self.after_create.push(boxed(f));
        self
    }

    pub fn on_before_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(UpdateRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<UpdateRequest>> + Send + 'static,
    {
        self.before_update.push(boxed(f));
        self
    }

    pub fn on_after_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RateTemplate) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<RateTemplate>> + Send + 'static,
    {
        self.after_update.push(boxed(f));
        self
    }

    pub fn on_before_status_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(StatusChangeRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<StatusChangeRequest>> + Send + 'static,
    {
        self.before_status_change.push(boxed(f));
        self
    }

    pub fn on_after_status_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(StatusChangeRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<StatusChangeRequest>> + Send + 'static,
    {
        self.after_status_change.push(boxed(f));
        self
    }

    pub fn on_before_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(DeleteRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<DeleteRequest>> + Send + 'static,
    {
        self.before_delete.push(boxed(f));
        self
    }

    pub fn on_after_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(DeleteRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RateResult<DeleteRequest>> + Send + 'static,
    {
        self.after_delete.push(boxed(f));
        self
    }

    /// Append `other`'s interceptors after this bundle's at every lifecycle
    /// point. `a.merge(b)` runs `a`'s interceptors first.
    pub fn merge(mut self, other: LifecycleHooks) -> Self {
        self.before_create.extend(other.before_create);
        self.after_create.extend(other.after_create);
        self.before_update.extend(other.before_update);
        self.after_update.extend(other.after_update);
        self.before_status_change.extend(other.before_status_change);
        self.after_status_change.extend(other.after_status_change);
        self.before_delete.extend(other.before_delete);
        self.after_delete.extend(other.after_delete);
        self
    }

    pub async fn run_before_create(&self, value: NewRateTemplate) -> RateResult<NewRateTemplate> {
        run_chain(&self.before_create, value).await
    }

    pub async fn run_after_create(&self, value: RateTemplate) -> RateResult<RateTemplate> {
        run_chain(&self.after_create, value).await
    }

    pub async fn run_before_update(&self, value: UpdateRequest) -> RateResult<UpdateRequest> {
        run_chain(&self.before_update, value).await
    }

    pub async fn run_after_update(&self, value: RateTemplate) -> RateResult<RateTemplate> {
        run_chain(&self.after_update, value).await
    }

    pub async fn run_before_status_change(
        &self,
        value: StatusChangeRequest,
    ) -> RateResult<StatusChangeRequest> {
        run_chain(&self.before_status_change, value).await
    }

    pub async fn run_after_status_change(
        &self,
        value: StatusChangeRequest,
    ) -> RateResult<StatusChangeRequest> {
        run_chain(&self.after_status_change, value).await
    }

    pub async fn run_before_delete(&self, value: DeleteRequest) -> RateResult<DeleteRequest> {
        run_chain(&self.before_delete, value).await
    }

    pub async fn run_after_delete(&self, value: DeleteRequest) -> RateResult<DeleteRequest> {
        run_chain(&self.after_delete, value).await
    }
}
