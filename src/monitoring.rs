//! # Operation Monitoring
//!
//! Span-based tracing for service operations: a span records one logical
//! operation's timing, status, and attributes, optionally nested under a
//! parent. Finished spans feed the metrics collector
//! (`span.<category>.<operation>` timers, `error.<category>.<operation>`
//! counters) and land in a bounded completed-history ring.
//!
//! Tracing must never break business logic: finishing an unknown span id is
//! a warning, not an error.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::metrics::MetricsCollector;

/// Completed spans retained for health/diagnostic reads.
pub const SPAN_HISTORY_LIMIT: usize = 100;

pub type SpanId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
}

/// Snapshot of a span, either still running (`finished_at` unset) or
/// completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub id: SpanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SpanId>,
    pub operation: String,
    pub category: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpanStatus>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug)]
struct ActiveSpan {
    parent_id: Option<SpanId>,
    operation: String,
    category: String,
    started: Instant,
    started_at: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct OperationMonitor {
    metrics: Option<Arc<MetricsCollector>>,
    active: DashMap<SpanId, ActiveSpan>,
    completed: Mutex<VecDeque<SpanRecord>>,
}

impl OperationMonitor {
    pub fn new(metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self {
            metrics,
            active: DashMap::new(),
            completed: Mutex::new(VecDeque::new()),
        }
    }

    pub fn start_span(
        &self,
        operation: &str,
        category: &str,
        attributes: BTreeMap<String, String>,
    ) -> SpanId {
        self.start(None, operation, category, attributes)
    }

    /// Start a span nested under `parent`. An unknown parent is tolerated;
    /// the relationship is still recorded.
    pub fn start_child_span(
        &self,
        parent: SpanId,
        operation: &str,
        category: &str,
        attributes: BTreeMap<String, String>,
    ) -> SpanId {
        if !self.active.contains_key(&parent) {
            warn!(parent = %parent, operation = operation, "child span started under inactive parent");
        }
        self.start(Some(parent), operation, category, attributes)
    }

    fn start(
        &self,
        parent_id: Option<SpanId>,
        operation: &str,
        category: &str,
        attributes: BTreeMap<String, String>,
    ) -> SpanId {
        let id = Uuid::new_v4();
        self.active.insert(
            id,
            ActiveSpan {
                parent_id,
                operation: operation.to_string(),
                category: category.to_string(),
                started: Instant::now(),
                started_at: Utc::now(),
                attributes,
            },
        );
        id
    }

    /// Finish a span, recording duration and emitting metrics. Extra
    /// attributes are merged over those supplied at start.
    pub async fn finish_span(
        &self,
        span_id: SpanId,
        status: SpanStatus,
        extra_attributes: BTreeMap<String, String>,
    ) {
        let Some((_, span)) = self.active.remove(&span_id) else {
            warn!(span_id = %span_id, "finish requested for unknown span");
            return;
        };

        let duration = span.started.elapsed();
        let mut attributes = span.attributes;
        attributes.extend(extra_attributes);

        let record = SpanRecord {
            id: span_id,
            parent_id: span.parent_id,
            operation: span.operation.clone(),
            category: span.category.clone(),
            started_at: span.started_at,
            finished_at: Some(Utc::now()),
            duration_ms: Some(duration.as_millis() as u64),
            status: Some(status),
            attributes: attributes.clone(),
        };

        {
            let mut completed = self.completed.lock();
            if completed.len() >= SPAN_HISTORY_LIMIT {
                completed.pop_front();
            }
            completed.push_back(record);
        }

        if let Some(metrics) = &self.metrics {
            let labels: Vec<(&str, &str)> = attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let timer_name = format!("span.{}.{}", span.category, span.operation);
            metrics.record_timer(&timer_name, duration, &labels).await;

            if status == SpanStatus::Error {
                let counter_name = format!("error.{}.{}", span.category, span.operation);
                metrics.increment_counter(&counter_name, 1.0, &labels).await;
            }
        }
    }

    pub fn active_spans(&self) -> Vec<SpanRecord> {
        self.active
            .iter()
            .map(|entry| SpanRecord {
                id: *entry.key(),
                parent_id: entry.parent_id,
                operation: entry.operation.clone(),
                category: entry.category.clone(),
                started_at: entry.started_at,
                finished_at: None,
                duration_ms: None,
                status: None,
                attributes: entry.attributes.clone(),
            })
            .collect()
    }

    /// Most recent completed spans, newest last, at most `limit`.
    pub fn recent_spans(&self, limit: usize) -> Vec<SpanRecord> {
        let completed = self.completed.lock();
        completed
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.completed.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetricsSink;

    fn monitored() -> (OperationMonitor, Arc<InMemoryMetricsSink>) {
        let sink = Arc::new(InMemoryMetricsSink::new());
        let collector = Arc::new(MetricsCollector::new("rates", "test", sink.clone()));
        (OperationMonitor::new(Some(collector)), sink)
    }

    #[tokio::test]
    async fn finished_span_emits_timer_and_lands_in_history() {
        let (monitor, sink) = monitored();
        let span = monitor.start_span("compareTemplates", "rate_analysis", BTreeMap::new());
        assert_eq!(monitor.active_spans().len(), 1);

        monitor
            .finish_span(span, SpanStatus::Ok, BTreeMap::new())
            .await;

        assert!(monitor.active_spans().is_empty());
        let recent = monitor.recent_spans(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, Some(SpanStatus::Ok));
        assert_eq!(sink.timer_count("rates.span.rate_analysis.compareTemplates"), 1);
    }

    #[tokio::test]
    async fn error_status_also_increments_error_counter() {
        let (monitor, sink) = monitored();
        let span = monitor.start_span("compareTemplates", "rate_analysis", BTreeMap::new());
        monitor
            .finish_span(span, SpanStatus::Error, BTreeMap::new())
            .await;
        assert_eq!(
            sink.counter_total("rates.error.rate_analysis.compareTemplates"),
            1.0
        );
    }

    #[tokio::test]
    async fn unknown_span_finish_is_a_no_op() {
        let (monitor, _) = monitored();
        monitor
            .finish_span(Uuid::new_v4(), SpanStatus::Ok, BTreeMap::new())
            .await;
        assert!(monitor.recent_spans(10).is_empty());
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (monitor, _) = monitored();
        for _ in 0..(SPAN_HISTORY_LIMIT + 20) {
            let span = monitor.start_span("op", "cat", BTreeMap::new());
            monitor
                .finish_span(span, SpanStatus::Ok, BTreeMap::new())
                .await;
        }
        assert_eq!(monitor.recent_spans(1000).len(), SPAN_HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn child_spans_keep_their_parent_link() {
        let (monitor, _) = monitored();
        let parent = monitor.start_span("outer", "cat", BTreeMap::new());
        let child = monitor.start_child_span(parent, "inner", "cat", BTreeMap::new());
        monitor
            .finish_span(child, SpanStatus::Ok, BTreeMap::new())
            .await;
        let recent = monitor.recent_spans(10);
        assert_eq!(recent[0].parent_id, Some(parent));
    }
}
