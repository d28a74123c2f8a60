pub mod memory;

use crate::models::{ChangeEvent, Folder, FolderChanges, NotePatch, NoteRecord};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Durable note store plus its push change feed.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn load(&self, owner: &str) -> GatewayResult<Vec<NoteRecord>>;
    async fn insert(&self, record: NoteRecord) -> GatewayResult<NoteRecord>;
    async fn update(&self, id: &str, patch: NotePatch) -> GatewayResult<()>;
    async fn delete(&self, id: &str) -> GatewayResult<()>;
    async fn delete_many(&self, ids: &[String]) -> GatewayResult<()>;
    /// Opens a change stream limited to `owner`'s rows. Dropping the
    /// returned feed unsubscribes.
    async fn subscribe(&self, owner: &str) -> GatewayResult<ChangeFeed>;

    async fn load_folders(&self, owner: &str) -> GatewayResult<Vec<Folder>>;
    async fn insert_folder(&self, folder: Folder) -> GatewayResult<Folder>;
    async fn update_folder(&self, id: &str, changes: FolderChanges) -> GatewayResult<()>;
    async fn delete_folder(&self, id: &str) -> GatewayResult<()>;
}

/// Receiving end of a change subscription. Ends when the remote side drops it.
#[derive(Debug)]
pub struct ChangeFeed {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(receiver: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self { receiver }
    }

    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }
}

/// Fan-out of change events to per-owner subscribers.
#[derive(Debug, Default)]
pub struct FeedHub {
    subscribers: Mutex<Vec<(String, mpsc::UnboundedSender<ChangeEvent>)>>,
}

impl FeedHub {
    pub fn subscribe(&self, owner: &str) -> ChangeFeed {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().push((owner.to_string(), sender));
        ChangeFeed::new(receiver)
    }

    pub fn publish(&self, owner: &str, event: &ChangeEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|(_, sender)| !sender.is_closed());
        for (subscriber, sender) in subscribers.iter() {
            if subscriber == owner {
                let _ = sender.send(event.clone());
            }
        }
    }

    /// Drops every open stream, as a lost connection would.
    pub fn close_all(&self) {
        self.lock().clear();
    }

    pub fn subscriber_count(&self, owner: &str) -> usize {
        self.lock()
            .iter()
            .filter(|(subscriber, sender)| subscriber == owner && !sender.is_closed())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, mpsc::UnboundedSender<ChangeEvent>)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
