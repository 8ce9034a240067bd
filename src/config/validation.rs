//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce the deadline ordering the coordinator depends on:
//!   local reply < WeChat deadline, local reply ≤ request/answer timeouts
//! - Validate value ranges and required endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{BridgeConfig, WECHAT_REPLY_DEADLINE_SECS};

/// A single semantic problem found in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ragflow.base_url is not a valid URL: {0}")]
    InvalidBaseUrl(String),

    #[error("wechat.token must not be empty")]
    EmptyToken,

    #[error(
        "timeouts.local_reply_secs must be between 1 and {} (WeChat replies are due within {}s)",
        WECHAT_REPLY_DEADLINE_SECS - 1,
        WECHAT_REPLY_DEADLINE_SECS
    )]
    LocalReplyOutOfRange,

    #[error("timeouts.local_reply_secs must not exceed timeouts.request_secs")]
    LocalReplyExceedsRequest,

    #[error("timeouts.local_reply_secs must not exceed timeouts.answer_secs")]
    LocalReplyExceedsAnswer,

    #[error("ragflow.top_k must be at least 1")]
    ZeroTopK,

    #[error("cache.max_entries must be at least 1")]
    ZeroCacheCapacity,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if Url::parse(&config.ragflow.base_url).is_err() {
        errors.push(ValidationError::InvalidBaseUrl(
            config.ragflow.base_url.clone(),
        ));
    }

    if config.wechat.token.is_empty() {
        errors.push(ValidationError::EmptyToken);
    }

    let local = config.timeouts.local_reply_secs;
    if local == 0 || local >= WECHAT_REPLY_DEADLINE_SECS {
        errors.push(ValidationError::LocalReplyOutOfRange);
    }
    if local > config.timeouts.request_secs {
        errors.push(ValidationError::LocalReplyExceedsRequest);
    }
    if local > config.timeouts.answer_secs {
        errors.push(ValidationError::LocalReplyExceedsAnswer);
    }

    if config.ragflow.top_k == 0 {
        errors.push(ValidationError::ZeroTopK);
    }

    if config.cache.max_entries == 0 {
        errors.push(ValidationError::ZeroCacheCapacity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&BridgeConfig::default()).is_ok());
    }

    #[test]
    fn local_reply_must_stay_under_platform_deadline() {
        let mut config = BridgeConfig::default();
        config.timeouts.local_reply_secs = WECHAT_REPLY_DEADLINE_SECS;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::LocalReplyOutOfRange));
    }

    #[test]
    fn local_reply_must_not_exceed_backend_timeouts() {
        let mut config = BridgeConfig::default();
        config.timeouts.local_reply_secs = 4;
        config.timeouts.request_secs = 3;
        config.timeouts.answer_secs = 2;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::LocalReplyExceedsRequest));
        assert!(errors.contains(&ValidationError::LocalReplyExceedsAnswer));
    }

    #[test]
    fn reports_all_errors_at_once() {
        let mut config = BridgeConfig::default();
        config.ragflow.base_url = "not a url".to_string();
        config.wechat.token.clear();
        config.ragflow.top_k = 0;
        config.cache.max_entries = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
