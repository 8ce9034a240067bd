//! Answer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound question (msg id, user id, text)
//!     → coordinator.rs (claim the message id, spawn backend work,
//!       race it against the local reply deadline)
//!     → store.rs (message-id keyspace for redelivery, user-id keyspace
//!       for /status; one lock over both)
//!     → reply string (real answer, or processing notice)
//! ```
//!
//! # Design Decisions
//! - The store is an injected component (`Arc<AnswerStore>`), not
//!   ambient state, so tests can construct isolated instances
//! - The detached continuation always writes a result: every failure
//!   class maps to a user-legible answer, never a stuck pending entry
//! - A redelivered message id can never start a second backend call;
//!   the claim is an atomic insert-if-absent

pub mod coordinator;
pub mod store;

pub use coordinator::{Coordinator, PROCESSING_NOTICE};
pub use store::{AnswerEntry, AnswerStore, PutOutcome};
