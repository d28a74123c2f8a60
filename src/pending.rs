//! Per-note "local write in flight" markers. A timer only removes the
//! marker generation it armed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PendingWrites {
    entries: Arc<Mutex<HashMap<String, u64>>>,
    generation: Arc<AtomicU64>,
    window: Duration,
}

impl PendingWrites {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            window,
        }
    }

    pub fn mark(&self, id: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(id.to_string(), generation);

        let entries = Arc::clone(&self.entries);
        let window = self.window;
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.get(&id) == Some(&generation) {
                entries.remove(&id);
                tracing::trace!(note_id = %id, "pending marker expired");
            }
        });
    }

    /// Restarts the window for `id`, e.g. once its write has completed.
    pub fn rearm(&self, id: &str) {
        self.mark(id);
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn clear(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::PendingWrites;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn marker_expires_after_window() {
        let pending = PendingWrites::new(Duration::from_millis(1_500));
        pending.mark("n1");
        assert!(pending.is_pending("n1"));

        tokio::time::sleep(Duration::from_millis(1_499)).await;
        assert!(pending.is_pending("n1"));

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert!(!pending.is_pending("n1"));
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_extends_the_window() {
        let pending = PendingWrites::new(Duration::from_millis(1_000));
        pending.mark("n1");
        tokio::time::sleep(Duration::from_millis(800)).await;
        pending.rearm("n1");

        tokio::time::sleep(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert!(pending.is_pending("n1"), "first timer must not clear the re-armed marker");

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
        assert!(!pending.is_pending("n1"));
    }

    #[tokio::test]
    async fn clear_releases_immediately() {
        let pending = PendingWrites::new(Duration::from_secs(60));
        pending.mark("n1");
        pending.mark("n2");
        pending.clear("n1");
        assert!(!pending.is_pending("n1"));
        assert_eq!(pending.len(), 1);
        pending.clear_all();
        assert!(pending.is_empty());
    }
}
