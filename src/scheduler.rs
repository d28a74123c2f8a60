use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

/// Holds at most one detached task. Replacing or dropping the slot aborts
/// whatever was running in it.
#[derive(Debug, Default)]
pub struct BackgroundTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    pub fn replace(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn abort(&self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }

    /// Aborts the task and waits until it has been dropped.
    pub async fn cancel(&self) {
        let handle = self.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}

/// Runs the expiry sweep on a fixed interval until `tick` returns false.
#[derive(Debug, Default)]
pub struct SweepScheduler {
    task: BackgroundTask,
}

impl SweepScheduler {
    pub fn start<F>(&self, every: Duration, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !tick() {
                    tracing::debug!("expiry sweeper stopped");
                    break;
                }
            }
        });
        self.task.replace(handle);
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}
