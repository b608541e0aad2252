use std::future::Future;
use tokio::task::JoinHandle;

/// Runs at most one task for a target, superseding older ones.
///
/// Spawning aborts whatever was still in flight, so a stale render or compile
/// can never finish after the request that replaced it. Work already moved to
/// the blocking pool runs to the end but its result is dropped with the task.
#[derive(Debug)]
pub struct LatestOnly<T> {
    generation: u64,
    task: Option<(u64, JoinHandle<T>)>,
}

impl<T> Default for LatestOnly<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            task: None,
        }
    }
}

impl<T: Send + 'static> LatestOnly<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` as the current task and return its generation.
    pub fn spawn<F>(&mut self, future: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        if let Some((generation, handle)) = self.task.take() {
            log::debug!("Aborting superseded task (generation {})", generation);
            handle.abort();
        }
        self.generation += 1;
        self.task = Some((self.generation, tokio::spawn(future)));
        self.generation
    }

    /// Generation of the most recent spawn
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Abort the current task, if any.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Wait for the current task.
    ///
    /// Returns `None` when nothing is running or the task did not complete.
    /// Cancel safe: the task keeps running if this future is dropped.
    pub async fn wait(&mut self) -> Option<T> {
        let (generation, handle) = self.task.as_mut()?;
        let generation = *generation;
        let result = handle.await;
        self.task = None;
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                if !e.is_cancelled() {
                    log::warn!("Task generation {} failed: {}", generation, e);
                }
                None
            }
        }
    }
}

impl<T> Drop for LatestOnly<T> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.task.take() {
            handle.abort();
        }
    }
}
