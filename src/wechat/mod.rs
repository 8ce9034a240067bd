//! WeChat wire-format subsystem.
//!
//! # Data Flow
//! ```text
//! Signed webhook request
//!     → signature.rs (shared-secret SHA-1 check; GET handshake echo)
//!     → message.rs (XML → IncomingMessage; reply rendering + sanitize)
//!     → commands.rs (synchronous /help, /clear, /reset, /status)
//!     → everything else goes to the coordinator
//! ```

pub mod commands;
pub mod message;
pub mod signature;

pub use message::{parse_message, render_reply, sanitize_answer, IncomingMessage};
