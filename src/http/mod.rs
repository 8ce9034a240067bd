//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! GET  /wechat → handshake (signature check, echostr echo)
//! POST /wechat → signature check
//!     → XML parse → command dispatch | coordinator
//!     → XML reply (always 200 for a parsed message)
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
