//! Rate-limited invocation ("throttle")
//!
//! Companion to the debouncer: instead of collapsing a burst to its
//! edges, a [`Throttler`] invokes at most once per wait window and drops
//! calls made in between. No timer is armed and nothing fires late; a
//! dropped call is gone.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Invokes an action at most once per wait window
///
/// The first call always fires. A later call fires only if at least
/// `wait` has elapsed since the last invocation. Holds no shared state,
/// so callers mutate it directly.
pub struct Throttler<T> {
    action: Box<dyn FnMut(T) + Send>,
    wait: Duration,
    last_fire: Option<Instant>,
}

impl<T> Throttler<T> {
    /// Wrap `action` so it fires at most once per `wait`
    pub fn new<F>(action: F, wait: Duration) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self {
            action: Box::new(action),
            wait,
            last_fire: None,
        }
    }

    /// Invoke with `args` if the wait window has elapsed, else drop
    pub fn call(&mut self, args: T) {
        let now = Instant::now();
        let due = match self.last_fire {
            Some(last) => now.duration_since(last) >= self.wait,
            None => true,
        };

        if due {
            self.last_fire = Some(now);
            (self.action)(args);
        } else {
            trace!("throttled call dropped");
        }
    }

    /// The wait window this instance was constructed with
    pub fn wait(&self) -> Duration {
        self.wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_throttler(wait: Duration) -> (Throttler<u32>, Arc<Mutex<Vec<u32>>>) {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&hits);
        let throttler = Throttler::new(move |v| sink.lock().push(v), wait);
        (throttler, hits)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_fires_immediately() {
        let (mut throttler, hits) = recording_throttler(Duration::from_millis(100));

        throttler.call(1);
        assert_eq!(hits.lock().as_slice(), &[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_within_window_are_dropped() {
        let (mut throttler, hits) = recording_throttler(Duration::from_millis(100));

        throttler.call(1);
        tokio::time::advance(Duration::from_millis(30)).await;
        throttler.call(2);
        tokio::time::advance(Duration::from_millis(30)).await;
        throttler.call(3);

        // No trailing fire: 2 and 3 are simply gone
        assert_eq!(hits.lock().as_slice(), &[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_again_after_window_elapses() {
        let (mut throttler, hits) = recording_throttler(Duration::from_millis(100));

        throttler.call(1);
        tokio::time::advance(Duration::from_millis(100)).await;
        throttler.call(2);

        assert_eq!(hits.lock().as_slice(), &[1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_measured_from_last_fire_not_last_call() {
        let (mut throttler, hits) = recording_throttler(Duration::from_millis(100));

        throttler.call(1);
        tokio::time::advance(Duration::from_millis(80)).await;
        throttler.call(2); // dropped; must not push the window out
        tokio::time::advance(Duration::from_millis(20)).await;
        throttler.call(3); // 100ms since the fire of 1

        assert_eq!(hits.lock().as_slice(), &[1, 3]);
    }
}
