//! In-process gateway with latency and failure injection.

use super::{ChangeFeed, FeedHub, GatewayError, GatewayResult, RemoteGateway};
use crate::models::{ChangeEvent, Folder, FolderChanges, NotePatch, NoteRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Load(String),
    Insert(String),
    Update(String),
    Delete(String),
    DeleteMany(Vec<String>),
    Subscribe(String),
    LoadFolders(String),
    InsertFolder(String),
    UpdateFolder(String),
    DeleteFolder(String),
}

#[derive(Debug)]
pub struct MemoryGateway {
    notes: Mutex<Vec<NoteRecord>>,
    folders: Mutex<Vec<Folder>>,
    calls: Mutex<Vec<GatewayCall>>,
    feed: FeedHub,
    fail_writes: AtomicBool,
    fail_loads: AtomicBool,
    echo_writes: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            notes: Mutex::new(Vec::new()),
            folders: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            feed: FeedHub::default(),
            fail_writes: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
            echo_writes: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record without emitting a change event.
    pub fn seed(&self, record: NoteRecord) {
        locked(&self.notes).push(record);
    }

    pub fn seed_folder(&self, folder: Folder) {
        locked(&self.folders).push(folder);
    }

    /// Delivers an event as if another session had written it.
    pub fn push(&self, owner: &str, event: ChangeEvent) {
        self.feed.publish(owner, &event);
    }

    pub fn disconnect(&self) {
        self.feed.close_all();
    }

    pub fn subscriber_count(&self, owner: &str) -> usize {
        self.feed.subscriber_count(owner)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Whether successful writes are echoed back on the feed (default on).
    pub fn set_echo_writes(&self, echo: bool) {
        self.echo_writes.store(echo, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        locked(&self.calls).clone()
    }

    pub fn record(&self, id: &str) -> Option<NoteRecord> {
        locked(&self.notes).iter().find(|record| record.id == id).cloned()
    }

    pub fn records(&self) -> Vec<NoteRecord> {
        locked(&self.notes).clone()
    }

    pub fn folders(&self) -> Vec<Folder> {
        locked(&self.folders).clone()
    }

    async fn round_trip(&self, call: GatewayCall, write: bool) -> GatewayResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        locked(&self.calls).push(call);
        let failing = if write {
            self.fail_writes.load(Ordering::SeqCst)
        } else {
            self.fail_loads.load(Ordering::SeqCst)
        };
        if failing {
            return Err(GatewayError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn echo(&self, owner: &str, event: ChangeEvent) {
        if self.echo_writes.load(Ordering::SeqCst) {
            self.feed.publish(owner, &event);
        }
    }

    fn remove(&self, id: &str) -> Option<NoteRecord> {
        let mut notes = locked(&self.notes);
        let index = notes.iter().position(|record| record.id == id)?;
        Some(notes.remove(index))
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn load(&self, owner: &str) -> GatewayResult<Vec<NoteRecord>> {
        self.round_trip(GatewayCall::Load(owner.to_string()), false).await?;
        Ok(locked(&self.notes)
            .iter()
            .filter(|record| record.owner == owner)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: NoteRecord) -> GatewayResult<NoteRecord> {
        self.round_trip(GatewayCall::Insert(record.id.clone()), true).await?;
        {
            let mut notes = locked(&self.notes);
            if notes.iter().any(|existing| existing.id == record.id) {
                return Err(GatewayError::Rejected(format!("duplicate id {}", record.id)));
            }
            notes.insert(0, record.clone());
        }
        self.echo(&record.owner, ChangeEvent::insert(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &str, patch: NotePatch) -> GatewayResult<()> {
        self.round_trip(GatewayCall::Update(id.to_string()), true).await?;
        let updated = {
            let mut notes = locked(&self.notes);
            let record = notes
                .iter_mut()
                .find(|record| record.id == id)
                .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
            record.apply_patch(&patch);
            record.clone()
        };
        let owner = updated.owner.clone();
        self.echo(&owner, ChangeEvent::update(updated));
        Ok(())
    }

    async fn delete(&self, id: &str) -> GatewayResult<()> {
        self.round_trip(GatewayCall::Delete(id.to_string()), true).await?;
        if let Some(removed) = self.remove(id) {
            self.echo(&removed.owner, ChangeEvent::delete(id));
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> GatewayResult<()> {
        self.round_trip(GatewayCall::DeleteMany(ids.to_vec()), true).await?;
        for id in ids {
            if let Some(removed) = self.remove(id) {
                self.echo(&removed.owner, ChangeEvent::delete(id.clone()));
            }
        }
        Ok(())
    }

    async fn subscribe(&self, owner: &str) -> GatewayResult<ChangeFeed> {
        self.round_trip(GatewayCall::Subscribe(owner.to_string()), false).await?;
        Ok(self.feed.subscribe(owner))
    }

    async fn load_folders(&self, owner: &str) -> GatewayResult<Vec<Folder>> {
        self.round_trip(GatewayCall::LoadFolders(owner.to_string()), false).await?;
        Ok(locked(&self.folders)
            .iter()
            .filter(|folder| folder.owner == owner)
            .cloned()
            .collect())
    }

    async fn insert_folder(&self, folder: Folder) -> GatewayResult<Folder> {
        self.round_trip(GatewayCall::InsertFolder(folder.id.clone()), true).await?;
        locked(&self.folders).push(folder.clone());
        Ok(folder)
    }

    async fn update_folder(&self, id: &str, changes: FolderChanges) -> GatewayResult<()> {
        self.round_trip(GatewayCall::UpdateFolder(id.to_string()), true).await?;
        let mut folders = locked(&self.folders);
        let folder = folders
            .iter_mut()
            .find(|folder| folder.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        if let Some(name) = changes.name {
            folder.name = name;
        }
        if let Some(color) = changes.color {
            folder.color = color;
        }
        Ok(())
    }

    async fn delete_folder(&self, id: &str) -> GatewayResult<()> {
        self.round_trip(GatewayCall::DeleteFolder(id.to_string()), true).await?;
        locked(&self.folders).retain(|folder| folder.id != id);
        for record in locked(&self.notes).iter_mut() {
            if record.folder_id.as_deref() == Some(id) {
                record.folder_id = None;
            }
        }
        Ok(())
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
