//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::RetryPolicy;

/// WeChat requires a passive reply within five seconds of delivering a
/// webhook message; after that it retries the delivery.
pub const WECHAT_REPLY_DEADLINE_SECS: u64 = 5;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// WeChat Official Account settings.
    pub wechat: WeChatConfig,

    /// RAGFlow backend settings.
    pub ragflow: RagflowConfig,

    /// Retry policy applied to backend calls and session creation.
    pub retry: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Answer cache bounds.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// WeChat Official Account configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeChatConfig {
    /// Official Account app id.
    pub app_id: String,

    /// Official Account app secret.
    pub app_secret: String,

    /// Shared secret used to verify webhook signatures.
    pub token: String,
}

impl Default for WeChatConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            token: "wechat_rag_token".to_string(),
        }
    }
}

/// RAGFlow backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RagflowConfig {
    /// Base URL of the RAGFlow server.
    pub base_url: String,

    /// API key sent as a Bearer token on every call.
    pub api_key: String,

    /// Chat assistant id (path segment of completion/session endpoints).
    pub chat_id: String,

    /// Dataset id queried by the retrieval endpoint.
    pub dataset_id: String,

    /// Number of chunks requested from retrieval.
    pub top_k: u32,
}

impl Default for RagflowConfig {
    fn default() -> Self {
        Self {
            base_url: "http://ragflow-server".to_string(),
            api_key: String::new(),
            chat_id: String::new(),
            dataset_id: String::new(),
            top_k: 5,
        }
    }
}

/// Retry configuration shared by all backend retry loops.
///
/// Each loop (HTTP attempt, session creation, the coordinator's completion
/// call) owns a separate attempt budget built from the same policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Base interval for linear backoff; retry n sleeps n * interval.
    pub retry_interval_secs: u64,
}

impl RetryConfig {
    /// Build the retry policy value handed to the resilience utility.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_interval: Duration::from_secs(self.retry_interval_secs),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_interval_secs: 1,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Local reply deadline in seconds. Must stay under WeChat's 5s limit
    /// so the processing notice is delivered with margin to spare.
    pub local_reply_secs: u64,

    /// Per-attempt HTTP client timeout in seconds. Must exceed the local
    /// reply deadline so a detached continuation can still finish.
    pub request_secs: u64,

    /// End-to-end bound on answering a single question, in seconds.
    pub answer_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            local_reply_secs: 4,
            request_secs: 120,
            answer_secs: 140,
        }
    }
}

/// Answer cache bounds.
///
/// The original design kept entries forever; these bounds exist so a
/// long-running process cannot grow without limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of message-id entries retained.
    pub max_entries: usize,

    /// Entries older than this are swept on insert, in seconds.
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_age_secs: 86_400,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
