//! HTTP client for the RAGFlow API.
//!
//! # Responsibilities
//! - Issue retrieval, completion and session-creation calls
//! - Bounded retry with linear backoff on transport failures
//! - Flip POST↔GET on 405 (endpoint versions disagree on the verb)
//! - Extract an answer from heterogeneous response shapes

use std::sync::Mutex;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::RagflowConfig;
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Error type for backend calls.
#[derive(Debug, Error)]
pub enum RagflowError {
    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend api error: {message} (code {code})")]
    Api { code: i64, message: String },

    #[error("malformed backend response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("no answer could be extracted from the backend response")]
    NoAnswer,

    #[error("session creation returned no session id")]
    NoSessionId,

    #[error("failed to construct http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// One retrieved knowledge chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub document_name: String,
}

#[derive(Debug, Deserialize)]
struct RetrievalResponse {
    #[serde(default)]
    data: Vec<Chunk>,
}

/// Outcome of a single HTTP attempt inside the retry loop.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("{0}")]
    Transport(reqwest::Error),

    #[error("method not allowed, flipping http verb")]
    MethodNotAllowed,
}

/// Client for the RAGFlow HTTP API.
pub struct RagflowClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_id: String,
    dataset_id: String,
    top_k: u32,
    retry: RetryPolicy,
}

impl RagflowClient {
    /// Build a client from config. `request_timeout` bounds each HTTP
    /// attempt and must exceed the coordinator's local reply deadline so
    /// a detached continuation realistically gets to finish.
    pub fn new(
        config: &RagflowConfig,
        retry: RetryPolicy,
        request_timeout: std::time::Duration,
    ) -> Result<Self, RagflowError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chat_id: config.chat_id.clone(),
            dataset_id: config.dataset_id.clone(),
            top_k: config.top_k,
            retry,
        })
    }

    /// Issue one logical call with bounded retry.
    ///
    /// Transport failures (connect, timeout, body read) consume a retry.
    /// A 405 flips the HTTP verb for the next attempt while retries
    /// remain. Any other non-success status is logged and its body is
    /// returned as usable input.
    pub async fn invoke(
        &self,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Result<Vec<u8>, RagflowError> {
        // Shared across attempts so a 405 flip sticks for the next one.
        let current_method = Mutex::new(method);

        let result = retry_with_backoff(self.retry, |attempt| {
            let method = lock_unpoisoned(&current_method).clone();
            let request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(&self.api_key)
                .json(body);
            let current_method = &current_method;

            async move {
                if attempt > 0 {
                    metrics::record_backend_retry();
                }
                tracing::debug!(%method, url, attempt, "sending backend request");

                let response = request.send().await.map_err(AttemptError::Transport)?;
                let status = response.status();
                let bytes = response.bytes().await.map_err(AttemptError::Transport)?;

                if status == StatusCode::METHOD_NOT_ALLOWED && attempt < self.retry.max_retries {
                    let mut m = lock_unpoisoned(current_method);
                    *m = if *m == Method::POST {
                        Method::GET
                    } else {
                        Method::POST
                    };
                    tracing::warn!(url, next_method = %*m, "405 from backend, flipping http method");
                    return Err(AttemptError::MethodNotAllowed);
                }

                if !status.is_success() {
                    // Keep the body anyway; RAGFlow returns meaningful
                    // payloads alongside non-200 statuses.
                    tracing::warn!(url, status = %status, "non-success status from backend");
                }

                Ok(bytes.to_vec())
            }
        })
        .await;

        result.map_err(|error| match error {
            AttemptError::Transport(source) => RagflowError::RetriesExhausted {
                attempts: self.retry.attempts(),
                source,
            },
            AttemptError::MethodNotAllowed => RagflowError::Api {
                code: StatusCode::METHOD_NOT_ALLOWED.as_u16() as i64,
                message: "method not allowed".to_string(),
            },
        })
    }

    /// Query the retrieval endpoint for knowledge chunks.
    ///
    /// Failures degrade to an empty list; retrieval context is advisory
    /// and must never abort the question.
    pub async fn retrieve(&self, question: &str) -> Vec<Chunk> {
        let url = format!("{}/api/v1/retrieval", self.base_url);
        let body = json!({
            "question": question,
            "dataset_ids": [self.dataset_id],
            "top_k": self.top_k,
        });

        metrics::record_backend_request("retrieval");
        match self.invoke(Method::POST, &url, &body).await {
            Ok(bytes) => match serde_json::from_slice::<RetrievalResponse>(&bytes) {
                Ok(parsed) => parsed.data,
                Err(error) => {
                    tracing::warn!(%error, "unparseable retrieval response, continuing without chunks");
                    Vec::new()
                }
            },
            Err(error) => {
                tracing::warn!(%error, "retrieval failed, continuing without chunks");
                Vec::new()
            }
        }
    }

    /// Ask the completion endpoint for an answer within a session.
    /// Returns raw bytes; the caller parses and extracts.
    pub async fn complete(
        &self,
        question: &str,
        session_id: &str,
    ) -> Result<Vec<u8>, RagflowError> {
        let url = format!(
            "{}/api/v1/chats/{}/completions",
            self.base_url, self.chat_id
        );
        let body = json!({
            "question": question,
            "session_id": session_id,
            "stream": false,
        });

        metrics::record_backend_request("completion");
        self.invoke(Method::POST, &url, &body).await
    }

    /// Create a named conversation session, returning its id.
    ///
    /// A missing or empty id is an error: callers cache the result, and a
    /// failed session must never be cached.
    pub async fn create_session(&self, name: &str) -> Result<String, RagflowError> {
        let url = format!("{}/api/v1/chats/{}/sessions", self.base_url, self.chat_id);
        let body = json!({ "name": name });

        metrics::record_backend_request("session");
        let bytes = self.invoke(Method::POST, &url, &body).await?;
        let value: Value = serde_json::from_slice(&bytes)?;

        let code = value.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(RagflowError::Api { code, message });
        }

        match value.pointer("/data/id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(RagflowError::NoSessionId),
        }
    }
}

fn lock_unpoisoned<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Extract an answer from the backend's heterogeneous response shapes.
///
/// Candidates are probed in a fixed precedence order and the first
/// non-empty string wins. The order matters: a future schema could
/// populate more than one field with different content.
pub fn extract_answer(value: &Value) -> Option<String> {
    let candidates = [
        value.pointer("/data/answer"),
        value.pointer("/choices/0/message/content"),
        value.pointer("/data/content"),
        value.pointer("/data/response"),
        value.get("answer"),
        value.get("content"),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
