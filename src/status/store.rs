use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::StoreError;
use crate::token;

use super::record::{GenerationRecord, JobKey, JobStatus, LogEntry, LogLevel};

/// Key-addressed record of every generation job's lifecycle.
///
/// The store is the sole coordination point between concurrent initiators,
/// callback attempts, and status polls. A single lock serializes all writers,
/// so duplicate initiations collapse into one record and a late result from an
/// abandoned attempt can never overwrite a record that already advanced past
/// it — terminal states are guarded on every mutation.
///
/// Constructed once at startup and shared as `Arc<StatusStore>`; retention of
/// finished records belongs to the surrounding job registry, not to the store.
pub struct StatusStore {
    records: Mutex<HashMap<JobKey, GenerationRecord>>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, GenerationRecord>> {
        self.records.lock().expect("status store lock poisoned")
    }

    /// Create the record for `key`, or return the existing one unchanged.
    ///
    /// Idempotent under concurrent duplicate calls: exactly one record and one
    /// active token result, whichever caller wins the lock.
    pub fn init(&self, key: &JobKey) -> GenerationRecord {
        let mut records = self.lock();
        records
            .entry(key.clone())
            .or_insert_with(|| {
                let mut record = GenerationRecord::new(token::mint());
                record
                    .logs
                    .push(LogEntry::now(LogLevel::Info, "generation job initiated"));
                record
            })
            .clone()
    }

    /// Snapshot of the current record.
    pub fn get(&self, key: &JobKey) -> Result<GenerationRecord, StoreError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Forward-only status transition plus a log append.
    ///
    /// Terminal targets set `end_time`; `Completed` also pins progress to 100.
    /// Anything that is not a forward edge — including any transition out of a
    /// terminal state — is rejected with [`StoreError::InvalidTransition`].
    pub fn set_status(
        &self,
        key: &JobKey,
        next: JobStatus,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut records = self.lock();
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if !forward_edge(record.status, next) {
            return Err(StoreError::InvalidTransition {
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        if next.is_terminal() {
            record.end_time = Some(Utc::now());
        }
        if next == JobStatus::Completed {
            record.progress = 100;
        }
        record.logs.push(LogEntry::now(LogLevel::Info, message));
        Ok(())
    }

    /// Append a log entry. Never fails the operation it is attached to:
    /// a missing record is silently ignored.
    pub fn append_log(&self, key: &JobKey, level: LogLevel, message: &str) {
        if let Some(record) = self.lock().get_mut(key) {
            record.logs.push(LogEntry::now(level, message));
        }
    }

    /// Clamp and record a progress estimate. No-op on missing or terminal
    /// records so a straggling attempt cannot disturb a settled job.
    pub fn set_progress(&self, key: &JobKey, progress: u8) {
        if let Some(record) = self.lock().get_mut(key) {
            if !record.status.is_terminal() {
                record.progress = progress.min(100);
            }
        }
    }

    /// Book a retry: bump the counter, reset the record to `Pending`, and
    /// rotate the active token. The previous token is invalid the moment this
    /// returns — there is no grace window for in-flight callbacks.
    ///
    /// Returns the new retry count and the freshly minted token.
    pub fn increment_retry(&self, key: &JobKey) -> Result<(u32, String), StoreError> {
        let mut records = self.lock();
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if record.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                from: record.status,
                to: JobStatus::Pending,
            });
        }

        record.retry_count += 1;
        record.status = JobStatus::Pending;
        record.progress = 0;
        record.active_token = token::mint();
        record.logs.push(LogEntry::now(
            LogLevel::Warn,
            format!("retry {} booked, token rotated", record.retry_count),
        ));
        Ok((record.retry_count, record.active_token.clone()))
    }

    /// Terminal failure: status → `Failed`, error recorded, `end_time` set.
    pub fn set_error(&self, key: &JobKey, message: &str) -> Result<(), StoreError> {
        let mut records = self.lock();
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if record.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                from: record.status,
                to: JobStatus::Failed,
            });
        }

        record.status = JobStatus::Failed;
        record.error = Some(message.to_string());
        record.end_time = Some(Utc::now());
        record.logs.push(LogEntry::now(LogLevel::Error, message));
        Ok(())
    }
}

/// The forward edges of the status state machine. Retry's `InProgress →
/// Pending` reset is not listed — it only happens inside `increment_retry`.
fn forward_edge(from: JobStatus, to: JobStatus) -> bool {
    matches!(
        (from, to),
        (JobStatus::Pending, JobStatus::InProgress)
            | (JobStatus::InProgress, JobStatus::Completed)
            | (JobStatus::InProgress, JobStatus::Failed)
            | (JobStatus::Pending, JobStatus::Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key() -> JobKey {
        JobKey::new("req-1", "owner-1")
    }

    #[test]
    fn init_creates_pending_record_with_token() {
        let store = StatusStore::new();
        let record = store.init(&key());

        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.retry_count, 0);
        assert!(!record.active_token.is_empty());
        assert_eq!(record.logs.len(), 1);
    }

    #[test]
    fn init_is_idempotent() {
        let store = StatusStore::new();
        let first = store.init(&key());
        store
            .set_status(&key(), JobStatus::InProgress, "starting attempt 1")
            .unwrap();

        let second = store.init(&key());
        assert_eq!(second.status, JobStatus::InProgress);
        assert_eq!(second.active_token, first.active_token);
    }

    #[test]
    fn concurrent_init_yields_one_record_and_one_token() {
        let store = Arc::new(StatusStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.init(&key()).active_token)
            })
            .collect();

        let tokens: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = &tokens[0];
        assert!(tokens.iter().all(|t| t == first));
        assert_eq!(store.get(&key()).unwrap().active_token, *first);
    }

    #[test]
    fn get_unknown_key_is_not_found() {
        let store = StatusStore::new();
        let err = store.get(&key()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn forward_transitions_only() {
        let store = StatusStore::new();
        store.init(&key());

        store
            .set_status(&key(), JobStatus::InProgress, "starting attempt 1")
            .unwrap();
        // Skipping backwards is rejected.
        let err = store
            .set_status(&key(), JobStatus::Pending, "rewind")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store
            .set_status(&key(), JobStatus::Completed, "diagram ready")
            .unwrap();
        let record = store.get(&key()).unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.end_time.is_some());
        assert_eq!(record.progress, 100);
    }

    #[test]
    fn terminal_records_reject_every_mutation() {
        let store = StatusStore::new();
        store.init(&key());
        store.set_error(&key(), "generation task exploded").unwrap();

        assert!(matches!(
            store.set_status(&key(), JobStatus::InProgress, "late attempt"),
            Err(StoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.increment_retry(&key()),
            Err(StoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.set_error(&key(), "again"),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn stale_success_cannot_reopen_failed_record() {
        let store = StatusStore::new();
        store.init(&key());
        store
            .set_status(&key(), JobStatus::InProgress, "starting attempt 1")
            .unwrap();
        store.set_error(&key(), "timed out after 4 attempts").unwrap();

        // A success from the abandoned attempt arrives afterwards.
        let err = store
            .set_status(&key(), JobStatus::Completed, "diagram ready")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.get(&key()).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn increment_retry_rotates_token_and_resets() {
        let store = StatusStore::new();
        let before = store.init(&key());
        store
            .set_status(&key(), JobStatus::InProgress, "starting attempt 1")
            .unwrap();
        store.set_progress(&key(), 40);

        let (count, new_token) = store.increment_retry(&key()).unwrap();
        assert_eq!(count, 1);
        assert_ne!(new_token, before.active_token);

        let record = store.get(&key()).unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.progress, 0);
        assert_eq!(record.active_token, new_token);
    }

    #[test]
    fn set_error_records_message_and_end_time() {
        let store = StatusStore::new();
        store.init(&key());

        store.set_error(&key(), "no credits left").unwrap();
        let record = store.get(&key()).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("no credits left"));
        assert!(record.end_time.is_some());
    }

    #[test]
    fn append_log_never_fails() {
        let store = StatusStore::new();
        // Missing record: silently ignored.
        store.append_log(&key(), LogLevel::Error, "dispatch failed");

        store.init(&key());
        store.append_log(&key(), LogLevel::Error, "dispatch failed");
        let record = store.get(&key()).unwrap();
        assert_eq!(record.logs.last().unwrap().message, "dispatch failed");
    }

    #[test]
    fn log_timestamps_are_monotonic() {
        let store = StatusStore::new();
        store.init(&key());
        for i in 0..20 {
            store.append_log(&key(), LogLevel::Info, &format!("step {i}"));
        }

        let logs = store.get(&key()).unwrap().logs;
        assert!(logs.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn set_progress_clamps_and_respects_terminal() {
        let store = StatusStore::new();
        store.init(&key());

        store.set_progress(&key(), 250);
        assert_eq!(store.get(&key()).unwrap().progress, 100);

        store.set_error(&key(), "boom").unwrap();
        store.set_progress(&key(), 10);
        assert_eq!(store.get(&key()).unwrap().progress, 100);
    }
}
