//! Cancelable one-shot timers
//!
//! Timers run as spawned tokio tasks that report back through a callback,
//! usually by posting an event onto the assistant loop. Each arm is tagged
//! with a process-wide unique generation; the owner only honours a firing
//! whose generation matches the current arm. Aborting the task covers the
//! common case, and the generation check covers a firing that was already
//! queued when the timer was canceled or re-armed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Generations are unique across every timer in the process
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A one-shot timer that is always canceled before being re-armed
#[derive(Debug, Default)]
pub struct OneShotTimer {
    current: Option<ArmedTimer>,
}

#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl OneShotTimer {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Arm the timer, canceling any previous arm.
    ///
    /// `fire` receives the generation of this arm once `delay` has elapsed.
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        // Deadline is taken now, not when the task is first polled
        let sleep = tokio::time::sleep(delay);
        let handle = tokio::spawn(async move {
            sleep.await;
            fire(generation);
        });

        self.current = Some(ArmedTimer { generation, handle });
        generation
    }

    /// Cancel the pending arm. Returns whether anything was armed.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether an arm is outstanding (not yet accepted or canceled)
    pub fn is_armed(&self) -> bool {
        self.current.is_some()
    }

    /// Consume a firing.
    ///
    /// Returns `true` exactly once for the current arm; stale generations
    /// from canceled or superseded arms return `false`.
    pub fn accept(&mut self, generation: u64) -> bool {
        match self.current {
            Some(ref armed) if armed.generation == generation => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = OneShotTimer::new();
        let generation = timer.arm(Duration::from_secs(10), move |g| {
            let _ = tx.send(g);
        });

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, generation);
        assert!(timer.accept(fired));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut timer = OneShotTimer::new();
        timer.arm(Duration::from_secs(1), move |g| {
            let _ = tx.send(g);
        });

        assert!(timer.cancel());
        assert!(!timer.cancel());

        tokio::time::advance(Duration::from_secs(5)).await;
        // The sender lives in the aborted task, so the channel closes empty
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_rejects_previous_generation() {
        let mut timer = OneShotTimer::new();
        let first = timer.arm(Duration::from_secs(1), |_| {});
        let second = timer.arm(Duration::from_secs(1), |_| {});

        assert_ne!(first, second);
        assert!(!timer.accept(first));
        assert!(timer.accept(second));
        assert!(!timer.accept(second));
    }
}
