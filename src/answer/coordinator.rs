//! Deadline-bounded answer coordinator.
//!
//! # Responsibilities
//! - Claim each inbound message id exactly once
//! - Race backend work against the local reply deadline
//! - Reply with the real answer, the cached answer, or the notice
//! - Keep detached continuations fault-contained: every outcome,
//!   including a crash, becomes a stored user-legible answer
//!
//! # State machine per message
//! ```text
//! NEW → CACHED_ANSWER            (id seen, answer ready)
//! NEW → CACHED_PENDING           (id seen, still working; no new work)
//! NEW → PROCESSING → ANSWERED_SYNC   (backend beat the timer)
//! NEW → PROCESSING → ANSWERED_ASYNC  (timer fired; work continues
//!                                     detached and lands in the store)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::answer::store::{AnswerStore, PutOutcome};
use crate::config::BridgeConfig;
use crate::observability::metrics;
use crate::ragflow::{extract_answer, RagflowClient, RagflowError, SessionRegistry};
use crate::resilience::{retry_with_backoff, RetryPolicy};
use crate::wechat::message::sanitize_answer;

/// Provisional reply sent when the answer misses the local deadline.
pub const PROCESSING_NOTICE: &str =
    "Your question is being processed. Send /status in a moment to check the result.";

/// Stored when the detached continuation itself crashes.
const INTERNAL_FAILURE: &str =
    "Sorry, something went wrong while processing your question. Please try again later.";

/// Stored when the end-to-end answer deadline elapses.
const TIMEOUT_FAILURE: &str = "Sorry, the answer timed out. Please try again later.";

/// Orchestrates one race per inbound message between backend completion
/// and the local reply timer.
#[derive(Clone)]
pub struct Coordinator {
    client: Arc<RagflowClient>,
    sessions: Arc<SessionRegistry>,
    store: Arc<AnswerStore>,
    retry: RetryPolicy,
    local_reply: Duration,
    answer_deadline: Duration,
}

impl Coordinator {
    pub fn new(
        client: Arc<RagflowClient>,
        sessions: Arc<SessionRegistry>,
        store: Arc<AnswerStore>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            client,
            sessions,
            store,
            retry: config.retry.policy(),
            local_reply: Duration::from_secs(config.timeouts.local_reply_secs),
            answer_deadline: Duration::from_secs(config.timeouts.answer_secs),
        }
    }

    /// Handle one question, returning the reply content to send now.
    ///
    /// This is the only suspension point in the core: the handler blocks
    /// until either the backend work signals completion or the local
    /// timer elapses, whichever is first.
    pub async fn handle_question(&self, message_id: &str, user_id: &str, question: &str) -> String {
        match self
            .store
            .put_new(message_id, user_id, question, PROCESSING_NOTICE)
        {
            PutOutcome::Existing(entry) => {
                if entry.ready {
                    tracing::info!(message_id, "redelivery answered from cache");
                    metrics::record_message("cached_answer");
                    entry.answer
                } else {
                    tracing::info!(message_id, "redelivery while still processing");
                    metrics::record_message("cached_pending");
                    entry.processing_notice
                }
            }
            PutOutcome::Created => {
                let completed = self.spawn_detached(
                    message_id.to_string(),
                    user_id.to_string(),
                    question.to_string(),
                );

                match tokio::time::timeout(self.local_reply, completed).await {
                    Ok(Ok(answer)) => {
                        tracing::info!(message_id, "answered within local deadline");
                        metrics::record_message("answered_sync");
                        answer
                    }
                    // Timer fired, or the continuation dropped its sender
                    // before signalling; either way the store has (or will
                    // get) the result and a redelivery or /status finds it.
                    Ok(Err(_)) | Err(_) => {
                        tracing::info!(message_id, "local deadline hit, continuing detached");
                        metrics::record_message("answered_async");
                        PROCESSING_NOTICE.to_string()
                    }
                }
            }
        }
    }

    /// Start backend work that outlives this request if it must.
    ///
    /// The returned receiver resolves once the result has been written to
    /// the store. Faults inside the pipeline are caught at the inner task
    /// boundary and converted into a stored failure answer.
    fn spawn_detached(
        &self,
        message_id: String,
        user_id: String,
        question: String,
    ) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        let this = self.clone();

        tokio::spawn(async move {
            let pipeline = {
                let this = this.clone();
                let user_id = user_id.clone();
                let question = question.clone();
                tokio::spawn(async move { this.compute_answer(&user_id, &question).await })
            };

            let answer = match pipeline.await {
                Ok(answer) => answer,
                Err(error) => {
                    tracing::error!(message_id, %error, "answer pipeline crashed");
                    INTERNAL_FAILURE.to_string()
                }
            };

            this.store.mark_ready(&message_id, &answer);
            if tx.send(answer).is_err() {
                tracing::debug!(message_id, "request already replied with processing notice");
            }
        });

        rx
    }

    /// Run the full answer pipeline, always producing a user-legible
    /// string, bounded end-to-end by the answer deadline.
    async fn compute_answer(&self, user_id: &str, question: &str) -> String {
        match tokio::time::timeout(self.answer_deadline, self.resolve_answer(user_id, question))
            .await
        {
            Ok(Ok(answer)) => sanitize_answer(&answer),
            Ok(Err(error)) => {
                tracing::warn!(user_id, %error, "failed to resolve answer");
                failure_answer(question, &error)
            }
            Err(_) => {
                tracing::warn!(user_id, "answer deadline elapsed");
                TIMEOUT_FAILURE.to_string()
            }
        }
    }

    async fn resolve_answer(&self, user_id: &str, question: &str) -> Result<String, RagflowError> {
        // Retrieval context is advisory; log it and move on.
        let chunks = self.client.retrieve(question).await;
        tracing::debug!(user_id, chunks = chunks.len(), "retrieval finished");

        let session_id = self.sessions.ensure_session(user_id).await?;

        // Top-level retry around the completion call, with its own
        // budget; the client retries transport failures underneath.
        let bytes = retry_with_backoff(self.retry, |_| {
            self.client.complete(question, &session_id)
        })
        .await?;

        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        extract_answer(&value).ok_or(RagflowError::NoAnswer)
    }
}

/// Map a failure to the deterministic apology shown to the user.
fn failure_answer(question: &str, error: &RagflowError) -> String {
    match error {
        RagflowError::NoAnswer | RagflowError::MalformedResponse(_) => format!(
            "Sorry, I could not find an answer to \"{question}\". Please try again later."
        ),
        other => format!("Sorry, fetching the answer failed: {other}. Please try again later."),
    }
}
