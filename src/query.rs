use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::status::{JobKey, JobStatus, LogEntry, StatusStore};

/// How many log entries a polling client gets to see.
const RECENT_LOG_LIMIT: usize = 10;

/// Read-only projection of a job's status for polling clients.
///
/// Carries only the most recent log entries; the full history and the active
/// token never leave the store.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recent_logs: Vec<LogEntry>,
}

/// Read-only status lookups over the shared store.
pub struct StatusQuery {
    store: Arc<StatusStore>,
}

impl StatusQuery {
    pub fn new(store: Arc<StatusStore>) -> Self {
        Self { store }
    }

    /// The current projection for a job, or `None` if it was never initiated.
    /// Never-initiated is a distinct outcome from an error — polling an
    /// unknown job is a normal thing for a client to do.
    pub fn status(&self, job_id: &str, owner_id: &str) -> Option<StatusView> {
        let key = JobKey::new(job_id, owner_id);
        let record = self.store.get(&key).ok()?;
        let recent_logs = record.recent_logs(RECENT_LOG_LIMIT).to_vec();
        Some(StatusView {
            job_id: job_id.to_string(),
            status: record.status,
            start_time: record.start_time,
            end_time: record.end_time,
            progress: record.progress,
            error: record.error,
            recent_logs,
        })
    }
}
