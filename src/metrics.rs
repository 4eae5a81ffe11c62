//! # Metrics Collection
//!
//! Namespaced counters, timers, gauges, and distributions emitted through a
//! [`MetricsSink`] seam. Every metric carries `service` and `environment`
//! tags plus caller labels. Emission is strictly best-effort: a sink failure
//! is logged at warn and never surfaces to the caller.
//!
//! The default [`TracingMetricsSink`] emits through `tracing`;
//! [`InMemoryMetricsSink`] keeps a snapshot for tests and health reporting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Service tag attached to every emitted metric.
pub const SERVICE_TAG: &str = "rates-service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Timer,
    Gauge,
    Distribution,
}

/// A single emitted measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub labels: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("metrics sink error: {0}")]
pub struct MetricsSinkError(pub String);

/// Destination for emitted metrics. Implementations must be cheap; the
/// collector awaits emission inline.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn emit(&self, metric: Metric) -> Result<(), MetricsSinkError>;
}

/// Default sink: structured `tracing` events at debug level.
#[derive(Debug, Default)]
pub struct TracingMetricsSink;

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn emit(&self, metric: Metric) -> Result<(), MetricsSinkError> {
        debug!(
            metric = %metric.name,
            kind = ?metric.kind,
            value = metric.value,
            labels = ?metric.labels,
            "metric emitted"
        );
        Ok(())
    }
}

/// Test/health sink retaining every emitted metric.
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    metrics: Mutex<Vec<Metric>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }

    /// Sum of counter increments recorded under `name`.
    pub fn counter_total(&self, name: &str) -> f64 {
        self.metrics
            .lock()
            .iter()
            .filter(|m| m.kind == MetricKind::Counter && m.name == name)
            .map(|m| m.value)
            .sum()
    }

    pub fn timer_count(&self, name: &str) -> usize {
        self.metrics
            .lock()
            .iter()
            .filter(|m| m.kind == MetricKind::Timer && m.name == name)
            .count()
    }
}

#[async_trait]
impl MetricsSink for InMemoryMetricsSink {
    async fn emit(&self, metric: Metric) -> Result<(), MetricsSinkError> {
        self.metrics.lock().push(metric);
        Ok(())
    }
}

/// Namespaced metrics front-end over a sink.
pub struct MetricsCollector {
    namespace: String,
    environment: String,
    sink: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("namespace", &self.namespace)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl MetricsCollector {
    pub fn new(
        namespace: impl Into<String>,
        environment: impl Into<String>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            environment: environment.into(),
            sink,
        }
    }

    pub async fn increment_counter(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.emit(name, MetricKind::Counter, value, labels).await;
    }

    pub async fn record_timer(&self, name: &str, duration: Duration, labels: &[(&str, &str)]) {
        self.emit(
            name,
            MetricKind::Timer,
            duration.as_secs_f64() * 1000.0,
            labels,
        )
        .await;
    }

    pub async fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.emit(name, MetricKind::Gauge, value, labels).await;
    }

    pub async fn record_distribution(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.emit(name, MetricKind::Distribution, value, labels)
            .await;
    }

    /// Run `fut`, recording its wall-clock duration as a timer under `name`
    /// whether it succeeds or fails.
    pub async fn time_async<T, F>(&self, name: &str, labels: &[(&str, &str)], fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let result = fut.await;
        self.record_timer(name, started.elapsed(), labels).await;
        result
    }

    async fn emit(&self, name: &str, kind: MetricKind, value: f64, labels: &[(&str, &str)]) {
        let mut tagged: BTreeMap<String, String> = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        tagged.insert("service".to_string(), SERVICE_TAG.to_string());
        tagged.insert("environment".to_string(), self.environment.clone());

        let metric = Metric {
            name: format!("{}.{}", self.namespace, name),
            kind,
            value,
            labels: tagged,
            recorded_at: Utc::now(),
        };

        if let Err(e) = self.sink.emit(metric).await {
            warn!(metric = name, error = %e, "failed to emit metric");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> (MetricsCollector, Arc<InMemoryMetricsSink>) {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let collector = MetricsCollector::new("rates", "test", sink.clone());
        (collector, sink)
    }

    #[tokio::test]
    async fn metrics_are_namespaced_and_tagged() {
        let (collector, sink) = collector();
        collector
            .increment_counter("template.create.attempt", 1.0, &[("org_id", "org-1")])
            .await;

        let metrics = sink.snapshot();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "rates.template.create.attempt");
        assert_eq!(metrics[0].labels["service"], SERVICE_TAG);
        assert_eq!(metrics[0].labels["environment"], "test");
        assert_eq!(metrics[0].labels["org_id"], "org-1");
    }

    #[tokio::test]
    async fn time_async_records_duration_on_error_paths() {
        let (collector, sink) = collector();
        let result: Result<(), &str> = collector
            .time_async("template.create.duration", &[], async { Err("boom") })
            .await;
        assert!(result.is_err());
        assert_eq!(sink.timer_count("rates.template.create.duration"), 1);
    }

    #[tokio::test]
    async fn sink_failures_never_propagate() {
        struct FailingSink;

        #[async_trait]
        impl MetricsSink for FailingSink {
            async fn emit(&self, _metric: Metric) -> Result<(), MetricsSinkError> {
                Err(MetricsSinkError("sink offline".into()))
            }
        }

        let collector = MetricsCollector::new("rates", "test", Arc::new(FailingSink));
        collector.increment_counter("anything", 1.0, &[]).await;
        collector.set_gauge("anything", 2.0, &[]).await;
    }

    #[tokio::test]
    async fn counter_totals_accumulate() {
        let (collector, sink) = collector();
        collector.increment_counter("c", 1.0, &[]).await;
        collector.increment_counter("c", 2.0, &[]).await;
        assert_eq!(sink.counter_total("rates.c"), 3.0);
    }
}
