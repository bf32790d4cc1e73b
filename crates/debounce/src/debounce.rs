//! Delay-based invocation scheduling ("debounce")
//!
//! A [`Debouncer`] wraps an action and collapses bursts of calls into at
//! most one invocation per enabled edge of the delay window. Every call
//! resets the countdown (classic debounce, not throttle); the most recent
//! call's arguments win.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use signal::AbortSignal;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Upper bound accepted for the construction delay
///
/// The tokio timer wheel cannot represent sleeps much beyond this (about
/// 2.2 years); longer delays are rejected at construction instead of
/// misbehaving at arm time.
pub const MAX_DELAY: Duration = Duration::from_millis(68_719_476_734);

/// Construction-time validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DebounceError {
    /// Delay longer than the timer facility can represent
    #[error("delay {0:?} exceeds the supported maximum ({:?})", MAX_DELAY)]
    DelayTooLong(Duration),
}

/// Which edges of the delay window trigger invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edges {
    /// Invoke at the start of a burst (first call after an idle period)
    pub leading: bool,
    /// Invoke at the end of a burst (delay elapsed with no further calls)
    pub trailing: bool,
}

impl Edges {
    /// Fire at burst end only (the default)
    pub const TRAILING: Self = Self {
        leading: false,
        trailing: true,
    };

    /// Fire at burst start only
    pub const LEADING: Self = Self {
        leading: true,
        trailing: false,
    };

    /// Fire at both burst start and burst end
    pub const BOTH: Self = Self {
        leading: true,
        trailing: true,
    };

    /// Never auto-fire; only `flush` can invoke the action
    pub const NONE: Self = Self {
        leading: false,
        trailing: false,
    };
}

impl Default for Edges {
    fn default() -> Self {
        Self::TRAILING
    }
}

/// Construction options for [`Debouncer`]
#[derive(Debug, Clone, Default)]
pub struct DebounceOptions {
    /// Edge configuration (default: trailing only)
    pub edges: Edges,
    /// External one-shot cancellation; once the signal fires the
    /// debouncer is permanently cancelled
    pub signal: Option<AbortSignal>,
}

/// Per-instance scheduling state
struct State<T> {
    /// Arguments of the most recent call whose effect has not yet been
    /// invoked, consumed, or cancelled
    pending: Option<T>,
    /// The single outstanding timer task, if armed
    timer: Option<JoinHandle<()>>,
    /// Stamped into each armed timer; an expiry whose epoch no longer
    /// matches has been superseded and does nothing
    epoch: u64,
    /// Set once the abort signal fires; permanent for this instance
    aborted: bool,
}

impl<T> State<T> {
    /// Disarm the timer and discard pending arguments
    fn clear(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.epoch = self.epoch.wrapping_add(1);
        self.pending = None;
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
    action: Mutex<Box<dyn FnMut(T) + Send>>,
}

impl<T: Send + 'static> Inner<T> {
    fn invoke(&self, args: T) {
        (self.action.lock())(args);
    }

    /// Timer expiry: fire the trailing edge if arguments are still
    /// pending, then clear all state for the completed cycle.
    fn on_timer(&self, epoch: u64, trailing: bool) {
        let args = {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                // Superseded by a later arm, cancel, or abort
                return;
            }
            state.timer = None;
            state.pending.take()
        };

        if trailing {
            if let Some(args) = args {
                trace!(epoch, "trailing edge fired");
                self.invoke(args);
            }
        }
    }
}

/// Wraps an action with delay-based invocation control
///
/// Each instance owns its own state; at most one timer is outstanding at
/// any time. Cloning yields another handle to the same instance.
///
/// Timer-driven (trailing) invocation runs on a spawned tokio task, so
/// [`call`](Self::call) and [`schedule`](Self::schedule) must be made
/// from within a tokio runtime. The action must not call back into the
/// same instance; the internal lock is not reentrant.
pub struct Debouncer<T: Send + 'static> {
    inner: Arc<Inner<T>>,
    delay: Duration,
    edges: Edges,
}

impl<T: Send + 'static> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            delay: self.delay,
            edges: self.edges,
        }
    }
}

impl<T: Send + 'static> Debouncer<T> {
    /// Wrap `action` so calls are collapsed per the edge configuration
    ///
    /// Fails fast if `delay` exceeds [`MAX_DELAY`]. If `options.signal`
    /// has already fired, the instance is born permanently cancelled.
    pub fn new<F>(
        action: F,
        delay: Duration,
        options: DebounceOptions,
    ) -> Result<Self, DebounceError>
    where
        F: FnMut(T) + Send + 'static,
    {
        if delay > MAX_DELAY {
            return Err(DebounceError::DelayTooLong(delay));
        }

        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                pending: None,
                timer: None,
                epoch: 0,
                aborted: false,
            }),
            action: Mutex::new(Box::new(action)),
        });

        if let Some(signal) = options.signal {
            // Weak so a long-lived signal never extends this instance's
            // lifetime
            let weak: Weak<Inner<T>> = Arc::downgrade(&inner);
            signal.on_abort(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut state = inner.state.lock();
                    state.aborted = true;
                    state.clear();
                    debug!("debouncer permanently cancelled by abort signal");
                }
            });
        }

        Ok(Self {
            inner,
            delay,
            edges: options.edges,
        })
    }

    /// Record `args` as the pending invocation and (re)arm the timer
    ///
    /// Last call wins: arguments from earlier calls within the delay
    /// window are discarded. With leading enabled, the first call of an
    /// idle period invokes immediately, consuming the recorded
    /// arguments. No-op once the abort signal has fired.
    pub fn call(&self, args: T) {
        let leading_args = {
            let mut state = self.inner.state.lock();
            if state.aborted {
                return;
            }

            let first_call = state.timer.is_none();
            state.pending = Some(args);
            self.arm(&mut state);

            if self.edges.leading && first_call {
                state.pending.take()
            } else {
                None
            }
        };

        // Invoked outside the state lock; a panic here unwinds out of
        // `call`, not into the scheduler
        if let Some(args) = leading_args {
            trace!("leading edge fired");
            self.inner.invoke(args);
        }
    }

    /// Re-arm the delay timer from now without recording new arguments
    ///
    /// Whatever is currently pending (possibly nothing) rides the new
    /// countdown. No-op once the abort signal has fired.
    pub fn schedule(&self) {
        let mut state = self.inner.state.lock();
        if state.aborted {
            return;
        }
        self.arm(&mut state);
    }

    /// Disarm the timer and discard the pending invocation
    ///
    /// Idempotent: calling with nothing pending has no effect.
    pub fn cancel(&self) {
        self.inner.state.lock().clear();
    }

    /// Invoke immediately with the pending arguments, if any
    ///
    /// Consumes the pending state but leaves an armed timer untouched;
    /// when that timer later fires it finds nothing pending and invokes
    /// nothing. No-op when nothing is pending.
    pub fn flush(&self) {
        let args = self.inner.state.lock().pending.take();
        if let Some(args) = args {
            self.inner.invoke(args);
        }
    }

    /// Whether the abort signal has permanently cancelled this instance
    pub fn is_aborted(&self) -> bool {
        self.inner.state.lock().aborted
    }

    /// The delay this instance was constructed with
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any outstanding timer with a fresh one for `delay`
    fn arm(&self, state: &mut State<T>) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        state.epoch = state.epoch.wrapping_add(1);
        let epoch = state.epoch;
        let inner = Arc::clone(&self.inner);
        let delay = self.delay;
        let trailing = self.edges.trailing;

        trace!(?delay, epoch, "armed delay timer");
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.on_timer(epoch, trailing);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_beyond_timer_range_rejected() {
        let result = Debouncer::new(
            |_: ()| {},
            MAX_DELAY + Duration::from_millis(1),
            DebounceOptions::default(),
        );
        assert_eq!(
            result.err(),
            Some(DebounceError::DelayTooLong(
                MAX_DELAY + Duration::from_millis(1)
            ))
        );
    }

    #[test]
    fn test_max_delay_itself_accepted() {
        // Boundary is inclusive; construction spawns nothing, so no
        // runtime is needed here
        assert!(Debouncer::new(|_: ()| {}, MAX_DELAY, DebounceOptions::default()).is_ok());
    }

    #[test]
    fn test_default_edges_trailing_only() {
        let edges = Edges::default();
        assert!(!edges.leading);
        assert!(edges.trailing);
    }

    #[test]
    fn test_cancel_without_pending_is_noop() {
        let debouncer =
            Debouncer::new(|_: u32| {}, Duration::from_millis(10), DebounceOptions::default())
                .unwrap();

        // Nothing armed, nothing pending; must not panic or spawn
        debouncer.cancel();
        debouncer.cancel();
    }

    #[test]
    fn test_flush_without_pending_is_noop() {
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&fired);
        let debouncer = Debouncer::new(
            move |_: u32| flag.store(true, std::sync::atomic::Ordering::SeqCst),
            Duration::from_millis(10),
            DebounceOptions::default(),
        )
        .unwrap();

        debouncer.flush();
        assert!(!fired.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_born_cancelled_when_signal_already_fired() {
        let (handle, sig) = signal::pair();
        handle.abort();

        let debouncer = Debouncer::new(
            |_: u32| {},
            Duration::from_millis(10),
            DebounceOptions {
                signal: Some(sig),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(debouncer.is_aborted());
    }
}
