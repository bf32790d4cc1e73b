//! One-shot cancellation signalling
//!
//! A minimal abort primitive: an [`AbortHandle`] fires the signal, any
//! number of [`AbortSignal`] observers see it and can register one-shot
//! listeners. Once fired, the signal stays fired for the rest of its
//! lifetime; firing again is a no-op.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

type Listener = Box<dyn FnOnce() + Send>;

/// Shared state between a handle and its observers
struct Inner {
    /// Monotonic fired flag
    aborted: AtomicBool,
    /// Listeners registered before the signal fired; drained exactly once
    listeners: Mutex<Vec<Listener>>,
}

/// Create a connected handle/signal pair
pub fn pair() -> (AbortHandle, AbortSignal) {
    let inner = Arc::new(Inner {
        aborted: AtomicBool::new(false),
        listeners: Mutex::new(Vec::new()),
    });
    (
        AbortHandle {
            inner: Arc::clone(&inner),
        },
        AbortSignal { inner },
    )
}

/// Fires the abort signal
///
/// Held by whoever owns the right to cancel. Dropping the handle does
/// not fire the signal.
pub struct AbortHandle {
    inner: Arc<Inner>,
}

impl AbortHandle {
    /// Fire the signal
    ///
    /// The first call flips the flag and runs every registered listener
    /// synchronously on this thread, in registration order. Subsequent
    /// calls have no effect.
    pub fn abort(&self) {
        if self.inner.aborted.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!("abort signal fired");

        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        for listener in listeners {
            listener();
        }
    }

    /// Whether the signal has fired
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Mint another observer for this handle's signal
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Observes the abort signal
///
/// Cloning is cheap; all clones observe the same underlying signal.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

impl AbortSignal {
    /// Whether the signal has fired
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Register a one-shot listener for the signal firing
    ///
    /// If the signal has already fired, the listener runs immediately on
    /// the calling thread. Each listener runs at most once.
    pub fn on_abort<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut listeners = self.inner.listeners.lock();

        // Checked under the lock: a concurrent abort either sees this
        // listener in the list or the flag is already visible here.
        if self.inner.aborted.load(Ordering::SeqCst) {
            drop(listeners);
            listener();
            return;
        }

        listeners.push(Box::new(listener));
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
