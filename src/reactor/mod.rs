//! Readiness multiplexing for a single session.
//!
//! - [`event`]: the requested direction and the `pollfd` wrapper
//! - [`poller`]: the deadline-bounded wait used between coroutine steps

pub mod event;
pub mod poller;
