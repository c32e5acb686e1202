use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{DispatchError, InitiateError};
use crate::registry::{JobRecordState, JobRegistry, OwnershipCheck, RegistryError};
use crate::status::{JobKey, LogLevel, StatusStore};

/// One callback trigger: everything the handler needs to run an attempt.
#[derive(Debug, Clone)]
pub struct CallbackEnvelope {
    pub job_id: String,
    pub owner_id: String,
    pub token: String,
}

/// One-way sender into the callback queue.
///
/// Initiation and attempt execution stay decoupled: the initiating call drops
/// an envelope here and returns; the worker drains the queue on its own time.
#[derive(Clone)]
pub struct CallbackDispatcher {
    tx: mpsc::Sender<CallbackEnvelope>,
}

impl CallbackDispatcher {
    /// Create a dispatcher plus the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CallbackEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Fire-and-forget send. Never blocks: a full or closed queue surfaces as
    /// a [`DispatchError`] for the caller to log and move on.
    pub fn dispatch(&self, envelope: CallbackEnvelope) -> Result<(), DispatchError> {
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

/// What the initiating caller gets back, immediately.
#[derive(Debug, Clone, Serialize)]
pub struct InitiateReceipt {
    pub accepted: bool,
    pub job_id: String,
    pub status_id: String,
}

/// Starts generation jobs: checks ownership, flips the job record, creates the
/// status record, and fires the callback trigger — without ever waiting on the
/// generation task itself.
pub struct Orchestrator<O, R> {
    store: Arc<StatusStore>,
    ownership: O,
    registry: R,
    dispatcher: CallbackDispatcher,
}

impl<O: OwnershipCheck, R: JobRegistry> Orchestrator<O, R> {
    pub fn new(
        store: Arc<StatusStore>,
        ownership: O,
        registry: R,
        dispatcher: CallbackDispatcher,
    ) -> Self {
        Self {
            store,
            ownership,
            registry,
            dispatcher,
        }
    }

    /// Start a generation job for `job_id` on behalf of `owner_id`.
    ///
    /// Blocks only on the ownership check, the job-record write, and the
    /// status-store init. The job record is marked `generating` before the
    /// callback trigger is dispatched, so a concurrent poll can never observe
    /// a generating job with no status record behind it.
    ///
    /// A dispatch failure does not fail the call: it is logged on the record
    /// and the job stays `pending`, recoverable by an external health check or
    /// manual resubmission.
    pub async fn initiate(
        &self,
        job_id: &str,
        owner_id: &str,
    ) -> Result<InitiateReceipt, InitiateError> {
        if job_id.trim().is_empty() {
            return Err(InitiateError::Validation("job id must not be empty".into()));
        }
        if owner_id.trim().is_empty() {
            return Err(InitiateError::Validation(
                "owner id must not be empty".into(),
            ));
        }

        if !self.ownership.authorize(owner_id, job_id).await {
            return Err(InitiateError::Denied {
                owner_id: owner_id.to_string(),
                job_id: job_id.to_string(),
            });
        }

        self.registry
            .set_job_status(job_id, JobRecordState::Generating)
            .await
            .map_err(|e| match e {
                RegistryError::NotFound(id) => InitiateError::NotFound(id),
                RegistryError::Unavailable(msg) => InitiateError::Registry(msg),
            })?;

        let key = JobKey::new(job_id, owner_id);
        let record = self.store.init(&key);

        let envelope = CallbackEnvelope {
            job_id: job_id.to_string(),
            owner_id: owner_id.to_string(),
            token: record.active_token,
        };
        if let Err(e) = self.dispatcher.dispatch(envelope) {
            self.store.append_log(
                &key,
                LogLevel::Error,
                &format!("callback dispatch failed: {e}"),
            );
        }

        Ok(InitiateReceipt {
            accepted: true,
            job_id: job_id.to_string(),
            status_id: key.to_string(),
        })
    }
}
