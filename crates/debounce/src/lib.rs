//! Delay-based invocation control for event-driven code
//!
//! This crate provides:
//! - [`Debouncer`]: collapse a burst of calls into at most one invocation
//!   per edge of the delay window (leading, trailing, or both)
//! - [`Throttler`]: invoke at most once per wait window, dropping calls
//!   made in between
//! - External cancellation via the `signal` crate's one-shot abort pair
//!
//! Both primitives wrap a caller-supplied action and never swallow its
//! errors: a panic inside the action propagates out of whichever
//! operation triggered the invocation.

pub mod debounce;
pub mod throttle;

// Re-exports
pub use debounce::{DebounceError, DebounceOptions, Debouncer, Edges, MAX_DELAY};
pub use throttle::Throttler;
