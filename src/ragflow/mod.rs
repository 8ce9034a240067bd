//! RAGFlow backend subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator question:
//!     → session.rs (ensure a per-user session id, creating one lazily)
//!     → client.rs (retrieval + completion HTTP calls, bounded retry,
//!       405 method-flip, tolerant answer extraction)
//!     → raw JSON bytes back to the coordinator
//! ```
//!
//! # Design Decisions
//! - Non-2xx responses other than 405 are logged but their bodies are
//!   still returned: the backend ships usable payloads alongside error
//!   statuses depending on endpoint version
//! - Session ids are never validated against the backend; a stale id is
//!   reused until the user issues an explicit reset (see DESIGN.md)

pub mod client;
pub mod session;

pub use client::{extract_answer, Chunk, RagflowClient, RagflowError};
pub use session::SessionRegistry;
