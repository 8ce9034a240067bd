//! Observability subsystem.
//!
//! Logging goes through `tracing` (initialized in `main`); this module
//! owns metric definitions and the Prometheus exposition endpoint.
//!
//! # Metrics
//! - `bridge_messages_total{outcome}` (counter): webhook messages by
//!   outcome (answered_sync, answered_async, cached_answer,
//!   cached_pending, command, rejected, unparseable)
//! - `ragflow_requests_total{kind}` (counter): backend calls by kind
//!   (retrieval, completion, session)
//! - `ragflow_retries_total` (counter): backend attempts beyond the first
//! - `answer_cache_entries` (gauge): message-id entries held

pub mod metrics;
