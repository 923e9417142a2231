//! Recurrent polling task.
//!
//! One step function driven at a bounded rate on the tokio worker pool. Send
//! loops, receive loops and accept loops all use this single concurrency
//! unit: each iteration awaits the full completion of one step, sleeps a
//! fixed tick, and repeats until the task is cancelled or the step asks to
//! stop.
//!
//! The tick rate bounds how often the step runs; it is a tunable, not a
//! guarantee. Steps that suspend indefinitely (an accept waiting for a peer)
//! should race their await against the owner's shutdown signal, since
//! cancellation never aborts a step already in flight.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Default inter-step delay of all polling loops: 10 ms (100 Hz).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// What the loop should do after a step completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepControl {
    /// Sleep one tick, then run the step again.
    Continue,
    /// End the loop.
    Stop,
}

/// A repeating asynchronous step with a fixed inter-step delay.
///
/// Spawned on the shared tokio worker pool; runs independently of the
/// creating thread. [`cancel`](Self::cancel) (or dropping the task) prevents
/// any further iteration from starting and wakes the inter-step sleep; an
/// iteration already running finishes naturally.
///
/// The task provides no fault isolation: the step returns [`StepControl`]
/// rather than an error, so owners classify their own faults before they
/// reach the loop.
pub struct RecurrentTask {
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl RecurrentTask {
    /// Spawn a loop that runs `step` to completion, sleeps `interval`, and
    /// repeats.
    pub fn spawn<F, Fut>(interval: Duration, mut step: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = StepControl> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let loop_cancelled = cancelled.clone();
        let loop_wake = wake.clone();

        tokio::spawn(async move {
            loop {
                if loop_cancelled.load(Ordering::SeqCst) {
                    break;
                }

                if step().await == StepControl::Stop {
                    break;
                }

                if loop_cancelled.load(Ordering::SeqCst) {
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = loop_wake.notified() => {}
                }
            }
        });

        Self { cancelled, wake }
    }

    /// Prevent any further iteration from starting.
    ///
    /// Idempotent. A step already running finishes naturally; the loop exits
    /// before the next step.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a sleep that starts after this call
        // still wakes immediately.
        self.wake.notify_one();
    }

    /// Whether the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for RecurrentTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RecurrentTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurrentTask")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn step_runs_repeatedly() {
        let count = Arc::new(AtomicUsize::new(0));
        let step_count = count.clone();

        let task = RecurrentTask::spawn(Duration::from_millis(1), move || {
            let step_count = step_count.clone();
            async move {
                step_count.fetch_add(1, Ordering::SeqCst);
                StepControl::Continue
            }
        });

        for _ in 0..100 {
            if count.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(count.load(Ordering::SeqCst) >= 3);
        task.cancel();
    }

    #[tokio::test]
    async fn cancel_stops_iterations() {
        let count = Arc::new(AtomicUsize::new(0));
        let step_count = count.clone();

        let task = RecurrentTask::spawn(Duration::from_millis(1), move || {
            let step_count = step_count.clone();
            async move {
                step_count.fetch_add(1, Ordering::SeqCst);
                StepControl::Continue
            }
        });

        for _ in 0..100 {
            if count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        task.cancel();
        assert!(task.is_cancelled());

        // No new iterations start after the cancellation settles.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let settled = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn step_can_stop_the_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let step_count = count.clone();

        let _task = RecurrentTask::spawn(Duration::from_millis(1), move || {
            let step_count = step_count.clone();
            async move {
                step_count.fetch_add(1, Ordering::SeqCst);
                StepControl::Stop
            }
        });

        for _ in 0..100 {
            if count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
