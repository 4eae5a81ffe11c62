//! In-memory bulk operation tracking records.
//!
//! A bulk validation run is created in `Pending` state, moved to
//! `Processing` by the background task, and finishes `Completed` (per-item
//! failures included) or `Failed` (the processing loop itself broke).
//! State is process-local and non-durable; see `BulkOperationStore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BulkOperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationProgress {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub succeeded_ids: Vec<String>,
    pub failed_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperation {
    pub operation_id: String,
    pub status: BulkOperationStatus,
    pub progress: BulkOperationProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkOperation {
    /// Initial snapshot for a new batch: everything in progress, nothing
    /// resolved.
    pub fn pending(operation_id: String, total: usize) -> Self {
        let now = Utc::now();
        Self {
            operation_id,
            status: BulkOperationStatus::Pending,
            progress: BulkOperationProgress {
                total,
                completed: 0,
                in_progress: total,
                failed: 0,
                succeeded_ids: Vec::new(),
                failed_ids: Vec::new(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_success(&mut self, template_id: &str) {
        self.progress.completed += 1;
        self.progress.in_progress = self.progress.in_progress.saturating_sub(1);
        self.progress.succeeded_ids.push(template_id.to_string());
        self.updated_at = Utc::now();
    }

    pub fn record_failure(&mut self, template_id: &str) {
        self.progress.failed += 1;
        self.progress.in_progress = self.progress.in_progress.saturating_sub(1);
        self.progress.failed_ids.push(template_id.to_string());
        self.updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: BulkOperationStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
