use crate::gateway::ChangeFeed;
use crate::models::ChangeEvent;
use crate::scheduler::BackgroundTask;
use std::sync::atomic::{AtomicU64, Ordering};

/// The change-feed subscription for the signed-in owner. At most one
/// stream is open at a time; attaching a new one first tears down the old.
#[derive(Debug, Default)]
pub struct FeedSession {
    task: BackgroundTask,
    generation: AtomicU64,
}

impl FeedSession {
    pub async fn unsubscribe(&self) {
        self.task.cancel().await;
    }

    /// Pumps `feed` into `on_event` in delivery order. `on_event` returning
    /// false ends the pump; `on_close` runs only if the remote side closes.
    pub fn attach<E, C>(&self, mut feed: ChangeFeed, mut on_event: E, on_close: C) -> u64
    where
        E: FnMut(ChangeEvent) -> bool + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = tokio::spawn(async move {
            while let Some(event) = feed.next().await {
                if !on_event(event) {
                    return;
                }
            }
            tracing::warn!(generation, "change feed closed by remote");
            on_close();
        });
        self.task.replace(handle);
        generation
    }

    pub fn is_subscribed(&self) -> bool {
        self.task.is_running()
    }
}
