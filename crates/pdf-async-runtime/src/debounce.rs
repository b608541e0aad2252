//! Quiet-period timer.
//!
//! Every [`Debouncer::schedule`] pushes the deadline out to a full window from
//! now; [`Debouncer::wait_ready`] resolves once a deadline passes with no newer
//! schedule. Time comes from `tokio::time`, so a paused test clock drives it.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Takes effect from the next [`schedule`](Self::schedule).
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Restart the window. Any earlier pending deadline is replaced.
    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Drop the pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Wait for the pending deadline and clear it.
    ///
    /// Returns `false` straight away when nothing is scheduled. Cancel safe:
    /// dropping the future before it resolves leaves the deadline in place.
    pub async fn wait_ready(&mut self) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        tokio::time::sleep_until(deadline).await;
        self.deadline = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(800);

    #[tokio::test(start_paused = true)]
    async fn fires_one_window_after_the_last_schedule() {
        let mut debouncer = Debouncer::new(WINDOW);
        let start = Instant::now();
        for _ in 0..5 {
            debouncer.schedule();
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        assert!(debouncer.wait_ready().await);
        // last schedule happened at 400ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1210), "{elapsed:?}");
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_schedule_never_fires() {
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.schedule();
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        assert!(!debouncer.wait_ready().await);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_wait_keeps_the_deadline() {
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.schedule();
        let deadline = debouncer.deadline();

        let early = tokio::time::timeout(Duration::from_millis(100), debouncer.wait_ready()).await;
        assert!(early.is_err());
        assert_eq!(debouncer.deadline(), deadline);

        assert!(debouncer.wait_ready().await);
    }

    #[tokio::test(start_paused = true)]
    async fn new_window_applies_to_next_schedule() {
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.set_window(Duration::from_millis(50));
        let start = Instant::now();
        debouncer.schedule();
        debouncer.wait_ready().await;
        assert!(start.elapsed() < Duration::from_millis(60));
    }
}
