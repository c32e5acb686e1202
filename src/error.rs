use thiserror::Error;

use crate::status::JobStatus;

/// Top-level error for the `traco` binary.
#[derive(Debug, Error)]
pub enum TracoError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Initiation failed: {0}")]
    Initiate(#[from] InitiateError),

    #[error("Callback failed: {0}")]
    Callback(#[from] CallbackError),

    #[error("Generator error: {0}")]
    Generator(#[from] crate::generator::GeneratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Status store failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No status record for {0}")]
    NotFound(String),

    /// The requested transition is not a forward edge of the lifecycle —
    /// most often a write arriving after the record went terminal.
    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Failures of the fire-and-forget callback dispatch. These are logged on the
/// job record and never fail the initiating call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Callback queue is full")]
    QueueFull,

    #[error("Callback queue is closed")]
    Closed,
}

/// Rejections of `initiate`. None of these mutate any state.
#[derive(Debug, Error)]
pub enum InitiateError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Owner {owner_id} may not act on job {job_id}")]
    Denied { owner_id: String, job_id: String },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job registry unavailable: {0}")]
    Registry(String),
}

/// Failures of one callback attempt.
///
/// A scheduled retry is not an error — it comes back as
/// [`CallbackReply::RetryScheduled`](crate::callback::CallbackReply).
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Missing identifiers or token; rejected before touching any state.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid, stale, or superseded token; rejected before touching any
    /// state. Replayed and forged completions land here.
    #[error("Auth error: {0}")]
    Auth(String),

    /// The generation task failed logically. Re-running it with identical
    /// input would fail the same way, so it is never retried.
    #[error("Generation task failed: {0}")]
    Task(String),

    /// Every attempt timed out and the retry budget is spent.
    #[error("Generation timed out after {attempts} attempts")]
    TimeoutExhausted { attempts: u32 },

    #[error("Status store error: {0}")]
    Store(#[from] StoreError),
}
