//! WeChat ↔ RAGFlow bridge.
//!
//! Receives WeChat Official Account webhook messages, answers them from a
//! RAGFlow question-answering backend, and reconciles WeChat's 5-second
//! passive-reply deadline with backend calls that can take minutes.
//!
//! # Architecture Overview
//!
//! ```text
//!   WeChat webhook ──▶ http::server ──▶ wechat (signature, XML, commands)
//!                                          │
//!                                          ▼
//!                                   answer::Coordinator
//!                                    │ race: backend vs. local timer
//!                                    ├──▶ answer::AnswerStore (msg-id / user-id)
//!                                    └──▶ ragflow (SessionRegistry, RagflowClient)
//!                                              │ retry with linear backoff
//!                                              ▼
//!                                         RAGFlow HTTP API
//! ```
//!
//! Cross-cutting: `config` (TOML + validation), `resilience` (retry policy),
//! `observability` (metrics), `lifecycle` (graceful shutdown).

pub mod answer;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod ragflow;
pub mod resilience;
pub mod wechat;

pub use config::BridgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
