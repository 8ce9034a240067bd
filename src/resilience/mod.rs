//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to RAGFlow:
//!     → retry.rs (bounded attempts, linear backoff between them)
//!     → used by: client HTTP attempts, session creation,
//!       the coordinator's completion call (separate budgets each)
//! ```
//!
//! # Design Decisions
//! - One retry utility, parameterized by policy, used by every loop
//! - Linear backoff (interval × attempt number), deliberately not
//!   exponential: the backend either recovers in seconds or not at all
//! - Timeouts are enforced by the HTTP client and the coordinator,
//!   not here; the utility only bounds attempts

pub mod retry;

pub use retry::{retry_with_backoff, RetryPolicy};
