//! Lifecycle management subsystem.
//!
//! Startup order lives in `main`: config first, then subsystems, then
//! the listener. This module owns shutdown coordination.

pub mod shutdown;

pub use shutdown::{trigger_on_ctrl_c, Shutdown};
