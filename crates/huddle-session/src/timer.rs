//! Abort-on-drop handle for scheduled retry and probe tasks.
//!
//! Every scheduled task is stored next to the bookkeeping record that created
//! it (invite record, probe record).  Tying cancellation to ownership means
//! purging a record – on dedup, loss, connect, or reset – can never leak a
//! live timer.

use tokio::task::JoinHandle;

/// Owning handle for a scheduled one-shot task.  Dropping it aborts the task.
#[derive(Debug)]
pub(crate) struct TimerHandle(Option<JoinHandle<()>>);

impl TimerHandle {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self(Some(handle))
    }

    /// Consumes the handle without aborting the task.
    ///
    /// Used by a timer task that removes its own record while it is running:
    /// aborting itself there would cancel the work it still has to do.
    pub(crate) fn detach(mut self) {
        self.0 = None;
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_aborts_task() {
        // Arrange
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        let handle = TimerHandle::new(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            fired_clone.store(true, Ordering::SeqCst);
        }));

        // Act – drop before the timer elapses, then let time pass.
        drop(handle);
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Assert
        assert!(!fired.load(Ordering::SeqCst), "aborted task must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_handle_lets_task_finish() {
        // Arrange
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        let handle = TimerHandle::new(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            fired_clone.store(true, Ordering::SeqCst);
        }));

        // Act
        handle.detach();
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Assert
        assert!(fired.load(Ordering::SeqCst), "detached task must still fire");
    }
}
