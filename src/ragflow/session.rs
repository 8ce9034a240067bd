//! Per-user session registry.
//!
//! Maps a WeChat user id to a RAGFlow session id so conversational
//! context persists across turns. Sessions are created lazily on a
//! user's first question and reused as-is afterwards; only an explicit
//! reset invalidates a binding.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::ragflow::client::{RagflowClient, RagflowError};
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Registry owning the user → session bindings.
pub struct SessionRegistry {
    client: Arc<RagflowClient>,
    retry: RetryPolicy,
    bindings: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new(client: Arc<RagflowClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Return the user's session id, creating one if none is cached.
    ///
    /// Creation runs under its own retry budget, separate from the
    /// per-question one. On exhaustion the last error is returned and
    /// nothing is cached.
    pub async fn ensure_session(&self, user_id: &str) -> Result<String, RagflowError> {
        if let Some(session_id) = self.cached(user_id) {
            tracing::debug!(user_id, session_id, "reusing cached session");
            return Ok(session_id);
        }

        let name = format!("wechat_{user_id}");
        tracing::info!(user_id, session_name = %name, "creating backend session");

        let session_id =
            retry_with_backoff(self.retry, |_| self.client.create_session(&name)).await?;

        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), session_id.clone());

        tracing::info!(user_id, session_id, "session cached");
        Ok(session_id)
    }

    /// Drop the user's binding; the next question creates a fresh session.
    pub fn clear_session(&self, user_id: &str) {
        let removed = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        if removed.is_some() {
            tracing::info!(user_id, "session binding cleared");
        }
    }

    fn cached(&self, user_id: &str) -> Option<String> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .filter(|id| !id.is_empty())
            .cloned()
    }
}
