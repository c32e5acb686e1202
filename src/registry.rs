use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// The coarse job-record states the surrounding application tracks. The
/// orchestration subsystem mirrors its own lifecycle into these on initiation
/// and on terminal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRecordState {
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for JobRecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobRecordState::Generating => write!(f, "generating"),
            JobRecordState::Completed => write!(f, "completed"),
            JobRecordState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job record not found: {0}")]
    NotFound(String),

    #[error("job registry unavailable: {0}")]
    Unavailable(String),
}

/// Answers whether an owner may act on a job. Backed by the application's
/// account/requirement store; this subsystem only consumes the verdict.
pub trait OwnershipCheck: Send + Sync + 'static {
    fn authorize(&self, owner_id: &str, job_id: &str) -> impl Future<Output = bool> + Send;
}

/// Write access to the surrounding application's job record.
pub trait JobRegistry: Send + Sync + 'static {
    fn set_job_status(
        &self,
        job_id: &str,
        state: JobRecordState,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;
}

impl<T: OwnershipCheck> OwnershipCheck for Arc<T> {
    fn authorize(&self, owner_id: &str, job_id: &str) -> impl Future<Output = bool> + Send {
        (**self).authorize(owner_id, job_id)
    }
}

impl<T: JobRegistry> JobRegistry for Arc<T> {
    fn set_job_status(
        &self,
        job_id: &str,
        state: JobRecordState,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send {
        (**self).set_job_status(job_id, state)
    }
}

/// In-process registry used by the CLI, the demo, and tests.
///
/// Holds the ownership map and the job-record states behind one lock; real
/// deployments replace this with clients for the application's own stores.
pub struct InMemoryRegistry {
    jobs: Mutex<HashMap<String, JobEntry>>,
    unavailable: AtomicBool,
}

struct JobEntry {
    owner_id: String,
    state: Option<JobRecordState>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate a registry outage: every subsequent write fails with
    /// [`RegistryError::Unavailable`] until cleared.
    #[allow(dead_code)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Register a job owned by `owner_id`.
    pub fn insert_job(&self, job_id: impl Into<String>, owner_id: impl Into<String>) {
        self.jobs.lock().expect("registry lock poisoned").insert(
            job_id.into(),
            JobEntry {
                owner_id: owner_id.into(),
                state: None,
            },
        );
    }

    /// The last state written for `job_id`, if any.
    #[allow(dead_code)]
    pub fn job_state(&self, job_id: &str) -> Option<JobRecordState> {
        self.jobs
            .lock()
            .expect("registry lock poisoned")
            .get(job_id)
            .and_then(|entry| entry.state)
    }
}

impl OwnershipCheck for InMemoryRegistry {
    async fn authorize(&self, owner_id: &str, job_id: &str) -> bool {
        self.jobs
            .lock()
            .expect("registry lock poisoned")
            .get(job_id)
            .is_some_and(|entry| entry.owner_id == owner_id)
    }
}

impl JobRegistry for InMemoryRegistry {
    async fn set_job_status(
        &self,
        job_id: &str,
        state: JobRecordState,
    ) -> Result<(), RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable(
                "registry marked unavailable".into(),
            ));
        }
        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| RegistryError::NotFound(job_id.to_string()))?;
        entry.state = Some(state);
        Ok(())
    }
}
