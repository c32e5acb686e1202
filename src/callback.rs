use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use crate::error::{CallbackError, StoreError};
use crate::generator::{DiagramGenerator, GenerateResponse};
use crate::orchestrator::{CallbackDispatcher, CallbackEnvelope};
use crate::registry::{JobRecordState, JobRegistry};
use crate::status::{JobKey, JobStatus, LogLevel, RetryPolicy, StatusStore};
use crate::token::TokenVerifier;

/// Successful outcomes of one callback attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackReply {
    /// The diagram was generated and the job is completed.
    Success,
    /// The attempt timed out; retry number `attempt` was booked and will be
    /// re-dispatched after the backoff delay.
    RetryScheduled { attempt: u32 },
}

/// Runs generation attempts delivered through the callback queue.
///
/// Each envelope is one attempt: verify the token, race the generation task
/// against the attempt timeout, and either settle the record or book a retry.
/// Retrying is a driven loop over the queue — the persisted retry count in the
/// status store decides exhaustion, so retries survive a process restart and
/// can be inspected mid-flight.
pub struct CallbackHandler<G, R> {
    store: Arc<StatusStore>,
    verifier: TokenVerifier,
    generator: G,
    registry: R,
    policy: RetryPolicy,
    dispatcher: CallbackDispatcher,
}

impl<G: DiagramGenerator, R: JobRegistry> CallbackHandler<G, R> {
    pub fn new(
        store: Arc<StatusStore>,
        verifier: TokenVerifier,
        generator: G,
        registry: R,
        policy: RetryPolicy,
        dispatcher: CallbackDispatcher,
    ) -> Self {
        Self {
            store,
            verifier,
            generator,
            registry,
            policy,
            dispatcher,
        }
    }

    /// Run one generation attempt.
    ///
    /// Rejections (missing fields, bad token) leave the record untouched, so a
    /// replayed or forged completion cannot move any state. The generation
    /// task itself is not cancelable: when the race times out, the task keeps
    /// running somewhere and its eventual result is fenced off by the token
    /// rotation and the store's terminal-state guard.
    pub async fn handle(&self, envelope: CallbackEnvelope) -> Result<CallbackReply, CallbackError> {
        if envelope.job_id.is_empty() || envelope.owner_id.is_empty() || envelope.token.is_empty()
        {
            return Err(CallbackError::Validation(
                "callback requires job id, owner id, and token".into(),
            ));
        }

        let key = JobKey::new(&envelope.job_id, &envelope.owner_id);
        if !self.verifier.verify(&key, &envelope.token) {
            return Err(CallbackError::Auth(format!(
                "token is not active for job {key}"
            )));
        }

        let attempt = self.store.get(&key)?.retry_count + 1;
        self.store.set_status(
            &key,
            JobStatus::InProgress,
            &format!("starting attempt {attempt}"),
        )?;
        self.store.set_progress(&key, 10);

        let raced = timeout(
            self.policy.attempt_timeout,
            self.generator.run(&envelope.job_id, &envelope.owner_id),
        )
        .await;

        match raced {
            Ok(Ok(response)) => self.complete(&key, &response).await,
            Ok(Err(e)) if e.is_timeout() => {
                self.after_timeout(&key, attempt, &e.to_string()).await
            }
            Ok(Err(e)) => {
                // A logical failure from the generator will not be fixed by
                // re-running with identical input. Terminal, no retry.
                self.fail(&key, &format!("generation task failed: {e}")).await;
                Err(CallbackError::Task(e.to_string()))
            }
            Err(_elapsed) => {
                let reason = format!(
                    "attempt {attempt} exceeded {}s",
                    self.policy.attempt_timeout.as_secs()
                );
                self.after_timeout(&key, attempt, &reason).await
            }
        }
    }

    async fn complete(
        &self,
        key: &JobKey,
        response: &GenerateResponse,
    ) -> Result<CallbackReply, CallbackError> {
        let message = format!(
            "diagram ready ({}, {} bytes)",
            response.format,
            response.diagram.len()
        );
        if let Err(e) = self.store.set_status(key, JobStatus::Completed, &message) {
            if matches!(e, StoreError::InvalidTransition { .. }) {
                // The record advanced past this attempt while the task was
                // running. Log the anomaly; the settled state stays as it is.
                self.store.append_log(
                    key,
                    LogLevel::Warn,
                    "stale success discarded, record already settled",
                );
            }
            return Err(e.into());
        }

        if let Err(e) = self
            .registry
            .set_job_status(&key.job_id, JobRecordState::Completed)
            .await
        {
            self.store
                .append_log(key, LogLevel::Error, &format!("job record update failed: {e}"));
        }
        Ok(CallbackReply::Success)
    }

    /// Decide between booking a retry and giving up, for timeout-class
    /// failures only.
    async fn after_timeout(
        &self,
        key: &JobKey,
        attempt: u32,
        reason: &str,
    ) -> Result<CallbackReply, CallbackError> {
        let record = self.store.get(key)?;
        if record.retry_count < self.policy.max_retries {
            self.store.append_log(key, LogLevel::Warn, reason);
            let (retry, token) = self.store.increment_retry(key)?;
            self.redispatch_after_backoff(key, token);
            Ok(CallbackReply::RetryScheduled { attempt: retry })
        } else {
            self.fail(
                key,
                &format!("generation timed out after {attempt} attempts"),
            )
            .await;
            Err(CallbackError::TimeoutExhausted { attempts: attempt })
        }
    }

    async fn fail(&self, key: &JobKey, message: &str) {
        if self.store.set_error(key, message).is_err() {
            // Already settled by a newer attempt; nothing to reopen.
            self.store
                .append_log(key, LogLevel::Warn, "stale failure discarded");
            return;
        }
        if let Err(e) = self
            .registry
            .set_job_status(&key.job_id, JobRecordState::Failed)
            .await
        {
            self.store
                .append_log(key, LogLevel::Error, &format!("job record update failed: {e}"));
        }
    }

    /// Sleep out the flat backoff, then drop a fresh envelope on the queue.
    /// Nobody waits on this — the spawned task owns the delay.
    fn redispatch_after_backoff(&self, key: &JobKey, token: String) {
        let dispatcher = self.dispatcher.clone();
        let store = Arc::clone(&self.store);
        let key = key.clone();
        let backoff = self.policy.retry_backoff;
        tokio::spawn(async move {
            sleep(backoff).await;
            let envelope = CallbackEnvelope {
                job_id: key.job_id.clone(),
                owner_id: key.owner_id.clone(),
                token,
            };
            if let Err(e) = dispatcher.dispatch(envelope) {
                store.append_log(&key, LogLevel::Error, &format!("retry dispatch failed: {e}"));
            }
        });
    }
}

/// Drain the callback queue, running each attempt on its own task.
///
/// Attempts for different jobs overlap freely; the status store serializes
/// the writes. The loop ends when every dispatcher clone has been dropped.
pub fn spawn_worker<G, R>(
    handler: Arc<CallbackHandler<G, R>>,
    mut rx: mpsc::Receiver<CallbackEnvelope>,
) -> tokio::task::JoinHandle<()>
where
    G: DiagramGenerator,
    R: JobRegistry,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let key = format!("{}:{}", envelope.job_id, envelope.owner_id);
                match handler.handle(envelope).await {
                    Ok(CallbackReply::Success) => log_attempt(&key, "completed"),
                    Ok(CallbackReply::RetryScheduled { attempt }) => {
                        log_attempt(&key, &format!("↻ retry {attempt} scheduled"));
                    }
                    Err(e) => log_attempt(&key, &e.to_string()),
                }
            });
        }
    })
}

fn log_attempt(key: &str, outcome: &str) {
    eprintln!("  callback [{key}]: {outcome}");
}
