use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a generation job.
///
/// Transitions move only forward: `Pending → InProgress → Completed | Failed`.
/// The single backward edge — `InProgress → Pending` on a scheduled retry —
/// goes through [`StatusStore::increment_retry`](super::StatusStore::increment_retry)
/// and nothing else. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether any further transition out of this status is forbidden.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Severity of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One entry in a job's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Identifies one generation job: the requirement being diagrammed and the
/// account that owns it. At most one live record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub job_id: String,
    pub owner_id: String,
}

impl JobKey {
    pub fn new(job_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            owner_id: owner_id.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.job_id, self.owner_id)
    }
}

/// Full lifecycle record of one generation job.
///
/// `active_token` is the opaque secret guarding the current attempt's
/// callback. It never leaves the store through any read projection — see
/// [`StatusView`](crate::query::StatusView) for what polling clients get.
#[derive(Debug, Clone)]
pub struct GenerationRecord {
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Completion estimate, 0–100.
    pub progress: u8,
    pub error: Option<String>,
    /// Append-only, timestamps monotonic. Read paths truncate, never mutate.
    pub logs: Vec<LogEntry>,
    pub retry_count: u32,
    pub active_token: String,
}

impl GenerationRecord {
    pub(crate) fn new(token: String) -> Self {
        Self {
            status: JobStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            progress: 0,
            error: None,
            logs: Vec::new(),
            retry_count: 0,
            active_token: token,
        }
    }

    /// The most recent `limit` log entries, oldest first.
    pub fn recent_logs(&self, limit: usize) -> &[LogEntry] {
        let start = self.logs.len().saturating_sub(limit);
        &self.logs[start..]
    }
}

/// Retry and timeout policy for generation attempts.
///
/// Backoff is flat, not exponential: expected volume is low and the external
/// generation task is idempotent when re-run with the same job id.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries before a timed-out job is marked failed for good.
    pub max_retries: u32,
    /// Hard ceiling on a single attempt.
    pub attempt_timeout: Duration,
    /// Delay before a retry attempt is re-dispatched.
    pub retry_backoff: Duration,
}

// Defaults match existing deployments and must not drift.
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn status_display_matches_wire_format() {
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert_eq!(JobStatus::InProgress.to_string(), "in_progress");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, r#""in_progress""#);
    }

    #[test]
    fn record_creation_defaults() {
        let record = GenerationRecord::new("tok-1".into());
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.progress, 0);
        assert!(record.end_time.is_none());
        assert!(record.error.is_none());
        assert!(record.logs.is_empty());
        assert_eq!(record.active_token, "tok-1");
    }

    #[test]
    fn recent_logs_truncates_to_tail() {
        let mut record = GenerationRecord::new("tok".into());
        for i in 0..25 {
            record.logs.push(LogEntry::now(LogLevel::Info, format!("entry {i}")));
        }
        let recent = record.recent_logs(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].message, "entry 15");
        assert_eq!(recent[9].message, "entry 24");

        // Fewer entries than the limit come back whole.
        let few = GenerationRecord::new("tok".into());
        assert!(few.recent_logs(10).is_empty());
    }

    #[test]
    fn retry_policy_interop_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(60));
        assert_eq!(policy.retry_backoff, Duration::from_secs(5));
    }

    #[test]
    fn job_key_display() {
        let key = JobKey::new("r1", "owner-9");
        assert_eq!(key.to_string(), "r1:owner-9");
    }
}
