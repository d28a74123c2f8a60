use crate::cache::{Mutation, NoteCache};
use crate::errors::{EngineError, EngineResult};
use crate::gateway::{GatewayError, GatewayResult, RemoteGateway};
use crate::models::{
    ChangeEvent, EngineEvent, EngineSettings, Folder, FolderChanges, NewNote, Note, NoteBody, NoteChanges,
    NotePatch,
};
use crate::pending::PendingWrites;
use crate::policy::{LifecyclePolicy, Partitions};
use crate::projection::{project, sort_notes, NoteFilter, NoteViews};
use crate::reconcile::{reconcile, ChangeOutcome};
use crate::scheduler::SweepScheduler;
use crate::seal;
use crate::session::FeedSession;
use crate::vault::KeyProvider;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

#[derive(Debug, Default)]
struct EngineStats {
    writes_issued: AtomicU64,
    writes_failed: AtomicU64,
    echoes_suppressed: AtomicU64,
    decrypt_failures: AtomicU64,
    sweeps_issued: AtomicU64,
    sweeps_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub writes_issued: u64,
    pub writes_failed: u64,
    pub echoes_suppressed: u64,
    pub decrypt_failures: u64,
    pub sweeps_issued: u64,
    pub sweeps_failed: u64,
}

struct EngineState {
    owner: Option<String>,
    cache: NoteCache,
    loads: usize,
    held: HashSet<String>,
}

impl EngineState {
    fn owner(&self) -> EngineResult<String> {
        self.owner.clone().ok_or(EngineError::AuthenticationRequired)
    }

    // Ids touched while a load is in flight keep their local state, absence
    // included, when that load lands.
    fn hold<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) {
        if self.loads > 0 {
            self.held.extend(ids.into_iter().cloned());
        }
    }
}

struct EngineInner {
    state: Mutex<EngineState>,
    pending: PendingWrites,
    gateway: Arc<dyn RemoteGateway>,
    keys: Arc<dyn KeyProvider>,
    settings: EngineSettings,
    policy: LifecyclePolicy,
    events: broadcast::Sender<EngineEvent>,
    stats: EngineStats,
    inflight: watch::Sender<usize>,
    feed: FeedSession,
    sweeper: SweepScheduler,
}

/// Note working set for one signed-in owner. Mutators spawn their remote
/// writes onto the ambient tokio runtime.
#[derive(Clone)]
pub struct NoteEngine {
    inner: Arc<EngineInner>,
}

impl NoteEngine {
    pub fn new(
        owner: impl Into<String>,
        gateway: Arc<dyn RemoteGateway>,
        keys: Arc<dyn KeyProvider>,
        settings: EngineSettings,
    ) -> EngineResult<Self> {
        let owner = owner.into();
        if owner.trim().is_empty() {
            return Err(EngineError::AuthenticationRequired);
        }
        settings.validate()?;

        let (events, _) = broadcast::channel(settings.event_capacity);
        let (inflight, _) = watch::channel(0usize);
        Ok(Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    owner: Some(owner),
                    cache: NoteCache::new(),
                    loads: 0,
                    held: HashSet::new(),
                }),
                pending: PendingWrites::new(settings.suppression_window()),
                gateway,
                keys,
                policy: LifecyclePolicy::from_settings(&settings),
                settings,
                events,
                stats: EngineStats::default(),
                inflight,
                feed: FeedSession::default(),
                sweeper: SweepScheduler::default(),
            }),
        })
    }

    pub fn owner(&self) -> EngineResult<String> {
        self.lock_state().owner()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.pending.is_pending(id)
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.feed.is_subscribed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        let stats = &self.inner.stats;
        StatsSnapshot {
            writes_issued: stats.writes_issued.load(Ordering::Relaxed),
            writes_failed: stats.writes_failed.load(Ordering::Relaxed),
            echoes_suppressed: stats.echoes_suppressed.load(Ordering::Relaxed),
            decrypt_failures: stats.decrypt_failures.load(Ordering::Relaxed),
            sweeps_issued: stats.sweeps_issued.load(Ordering::Relaxed),
            sweeps_failed: stats.sweeps_failed.load(Ordering::Relaxed),
        }
    }

    pub async fn start(&self) -> EngineResult<usize> {
        self.subscribe_feed().await?;
        let count = self.load().await?;
        self.start_sweeper();
        Ok(count)
    }

    pub async fn reconnect(&self) -> EngineResult<usize> {
        self.subscribe_feed().await?;
        self.resync().await
    }

    pub async fn on_foreground(&self) -> EngineResult<usize> {
        self.resync().await
    }

    /// Sign-out. Every later call fails with `AUTH_REQUIRED`.
    pub async fn shutdown(&self) {
        self.inner.feed.unsubscribe().await;
        self.inner.sweeper.stop();
        {
            let mut state = self.lock_state();
            state.owner = None;
            state.cache.clear();
            state.held.clear();
        }
        self.inner.pending.clear_all();
        tracing::info!("note engine shut down");
    }

    pub async fn settled(&self) {
        let mut inflight = self.inner.inflight.subscribe();
        let _ = inflight.wait_for(|count| *count == 0).await;
    }

    async fn subscribe_feed(&self) -> EngineResult<()> {
        let owner = self.owner()?;
        self.inner.feed.unsubscribe().await;
        let feed = self.inner.gateway.subscribe(&owner).await.map_err(|error| {
            tracing::warn!(error = %error, "change feed subscription failed");
            EngineError::from(error)
        })?;

        let on_event = Arc::downgrade(&self.inner);
        let on_close = Arc::downgrade(&self.inner);
        let generation = self.inner.feed.attach(
            feed,
            move |event| match Weak::upgrade(&on_event) {
                Some(inner) => {
                    NoteEngine { inner }.apply_change(event);
                    true
                }
                None => false,
            },
            move || {
                if let Some(inner) = Weak::upgrade(&on_close) {
                    let _ = inner.events.send(EngineEvent::FeedClosed);
                }
            },
        );
        tracing::info!(generation, "change feed subscribed");
        Ok(())
    }

    fn start_sweeper(&self) {
        let interval = self.inner.settings.sweep_interval_secs;
        if interval == 0 {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .sweeper
            .start(std::time::Duration::from_secs(interval), move || {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                NoteEngine { inner }.evaluate().is_ok()
            });
    }

    pub async fn load(&self) -> EngineResult<usize> {
        let owner = {
            let mut state = self.lock_state();
            let owner = state.owner()?;
            state.loads += 1;
            owner
        };
        let fetched = self.fetch(&owner).await;

        let count = {
            let mut state = self.lock_state();
            state.loads = state.loads.saturating_sub(1);
            let held = if state.loads == 0 {
                std::mem::take(&mut state.held)
            } else {
                state.held.clone()
            };
            let (notes, folders) = fetched?;
            if state.owner.as_deref() != Some(owner.as_str()) {
                return Err(EngineError::AuthenticationRequired);
            }
            let pending = &self.inner.pending;
            state
                .cache
                .replace_all(notes, folders, |id| held.contains(id) || pending.is_pending(id));
            state.cache.len()
        };

        tracing::info!(count, "note cache loaded");
        self.emit(EngineEvent::Reloaded { count });
        Ok(count)
    }

    async fn fetch(&self, owner: &str) -> EngineResult<(Vec<Note>, Vec<Folder>)> {
        let records = self.inner.gateway.load(owner).await.map_err(|error| {
            tracing::warn!(error = %error, "note load failed");
            EngineError::from(error)
        })?;
        let folders = self.inner.gateway.load_folders(owner).await?;

        let key = self.inner.keys.active_key();
        let mut failures = 0u64;
        let notes: Vec<Note> = records
            .into_iter()
            .filter(|record| record.owner == owner)
            .map(|record| {
                let opened = seal::open_record(record, key.as_ref());
                if opened.failure.is_some() {
                    failures += 1;
                }
                opened.note
            })
            .collect();
        let folders = folders.into_iter().filter(|folder| folder.owner == owner).collect();

        if failures > 0 {
            self.inner.stats.decrypt_failures.fetch_add(failures, Ordering::Relaxed);
            tracing::warn!(count = failures, "note bodies could not be decrypted");
        }
        Ok((notes, folders))
    }

    pub async fn resync(&self) -> EngineResult<usize> {
        tracing::debug!("silent resync");
        self.load().await
    }

    pub fn get(&self, id: &str) -> EngineResult<Option<Note>> {
        let state = self.lock_state();
        state.owner()?;
        Ok(state.cache.get(id).cloned())
    }

    pub fn notes(&self) -> EngineResult<Vec<Note>> {
        let state = self.lock_state();
        state.owner()?;
        Ok(state.cache.notes().to_vec())
    }

    pub fn folders(&self) -> EngineResult<Vec<Folder>> {
        let state = self.lock_state();
        state.owner()?;
        Ok(state.cache.folders().to_vec())
    }

    pub fn evaluate(&self) -> EngineResult<Partitions> {
        self.evaluate_at(Utc::now())
    }

    /// Expired notes leave the cache here, so each is reported and swept once.
    pub fn evaluate_at(&self, now: DateTime<Utc>) -> EngineResult<Partitions> {
        let (mut partitions, mut expired) = {
            let mut state = self.lock_state();
            state.owner()?;
            let expired = state.cache.take_expired(&self.inner.policy, now);
            state.hold(expired.iter().map(|note| &note.id));
            (self.inner.policy.partition(state.cache.notes(), now), expired)
        };

        if !expired.is_empty() {
            let ids: Vec<String> = expired.iter().map(|note| note.id.clone()).collect();
            self.spawn_sweep(ids);
            sort_notes(&mut expired);
        }
        partitions.expired = expired;
        Ok(partitions)
    }

    pub fn views(&self) -> EngineResult<NoteViews> {
        self.views_at(Utc::now())
    }

    pub fn views_at(&self, now: DateTime<Utc>) -> EngineResult<NoteViews> {
        Ok(project(&self.evaluate_at(now)?.active))
    }

    pub fn filtered(&self, filter: &NoteFilter) -> EngineResult<Vec<Note>> {
        Ok(filter.apply(&self.evaluate()?.active))
    }

    pub fn apply_change(&self, event: ChangeEvent) -> ChangeOutcome {
        let id = event.id.clone();
        let kind = event.kind;
        let key = self.inner.keys.active_key();
        let reconciled = {
            let mut state = self.lock_state();
            let Some(owner) = state.owner.clone() else {
                return ChangeOutcome::Ignored;
            };
            let reconciled = reconcile(
                &mut state.cache,
                &self.inner.pending,
                &owner,
                event,
                key.as_ref(),
                Utc::now(),
            );
            if matches!(
                reconciled.outcome,
                ChangeOutcome::Inserted | ChangeOutcome::Merged | ChangeOutcome::Removed
            ) {
                state.hold([&id]);
            }
            reconciled
        };

        if reconciled.outcome == ChangeOutcome::Suppressed {
            self.inner.stats.echoes_suppressed.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(failure) = &reconciled.failure {
            self.inner.stats.decrypt_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(note_id = %id, error = %failure, "remote note body could not be decrypted");
        }
        tracing::debug!(note_id = %id, kind = ?kind, outcome = ?reconciled.outcome, "change event");
        reconciled.outcome
    }

    pub fn create(&self, new_note: NewNote) -> EngineResult<Note> {
        let key = self.inner.keys.active_key();
        let now = Utc::now();
        let (note, record) = {
            let mut state = self.lock_state();
            let owner = state.owner()?;
            if let Some(folder_id) = &new_note.folder_id {
                if state.cache.folder(folder_id).is_none() {
                    return Err(EngineError::NotFound(format!("folder {folder_id}")));
                }
            }
            let note = Note {
                id: Uuid::new_v4().to_string(),
                owner,
                title: new_note.title,
                body: NoteBody::Plain(new_note.body),
                kind: new_note.kind,
                color: new_note.color,
                folder_id: new_note.folder_id,
                pinned: new_note.pinned,
                position: 0,
                archived: false,
                deleted_at: None,
                expires_at: new_note.expires_at,
                updated_at: now,
                created_at: now,
                encrypted: key.is_some(),
            };
            let record = seal::seal_note(&note, key.as_ref())?;
            state.cache.apply(&Mutation::Insert(note.clone()), now);
            state.hold([&note.id]);
            (note, record)
        };

        tracing::debug!(note_id = %note.id, "note created");
        self.spawn_write("create", vec![note.id.clone()], move |gateway| async move {
            gateway.insert(record).await.map(|_| ())
        });
        Ok(note)
    }

    pub fn update(&self, id: &str, changes: NoteChanges) -> EngineResult<Note> {
        let patch = NotePatch::from(changes);
        if patch.is_empty() {
            return self
                .get(id)?
                .ok_or_else(|| EngineError::NotFound(format!("note {id}")));
        }
        self.patch_one("update", id, patch)
    }

    pub fn set_color(&self, id: &str, color: impl Into<String>) -> EngineResult<Note> {
        self.patch_one(
            "set_color",
            id,
            NotePatch {
                color: Some(color.into()),
                ..NotePatch::default()
            },
        )
    }

    pub fn pin(&self, id: &str) -> EngineResult<Note> {
        self.set_pinned(id, true)
    }

    pub fn unpin(&self, id: &str) -> EngineResult<Note> {
        self.set_pinned(id, false)
    }

    fn set_pinned(&self, id: &str, pinned: bool) -> EngineResult<Note> {
        self.patch_one(
            if pinned { "pin" } else { "unpin" },
            id,
            NotePatch {
                pinned: Some(pinned),
                ..NotePatch::default()
            },
        )
    }

    pub fn archive(&self, id: &str) -> EngineResult<Note> {
        self.patch_one("archive", id, archived_patch(true))
    }

    pub fn unarchive(&self, id: &str) -> EngineResult<Note> {
        self.patch_one("unarchive", id, archived_patch(false))
    }

    pub fn archive_many(&self, ids: &[String]) -> EngineResult<usize> {
        Ok(self.patch_many("archive_many", ids, archived_patch(true))?.len())
    }

    pub fn soft_delete(&self, id: &str) -> EngineResult<Note> {
        self.patch_one("soft_delete", id, deleted_patch(Some(Utc::now())))
    }

    pub fn soft_delete_many(&self, ids: &[String]) -> EngineResult<usize> {
        Ok(self
            .patch_many("soft_delete_many", ids, deleted_patch(Some(Utc::now())))?
            .len())
    }

    pub fn restore(&self, id: &str) -> EngineResult<Note> {
        self.patch_one("restore", id, deleted_patch(None))
    }

    pub fn move_to_folder(&self, id: &str, folder_id: Option<String>) -> EngineResult<Note> {
        self.ensure_folder(folder_id.as_deref())?;
        self.patch_one("move_to_folder", id, folder_patch(folder_id))
    }

    pub fn move_many(&self, ids: &[String], folder_id: Option<String>) -> EngineResult<usize> {
        self.ensure_folder(folder_id.as_deref())?;
        Ok(self.patch_many("move_many", ids, folder_patch(folder_id))?.len())
    }

    pub fn set_positions(&self, batch: Vec<(String, u32)>) -> EngineResult<usize> {
        let now = Utc::now();
        let applied: Vec<(String, u32)> = {
            let mut state = self.lock_state();
            state.owner()?;
            let batch: Vec<(String, u32)> = batch
                .into_iter()
                .filter(|(id, _)| state.cache.contains(id))
                .collect();
            state.cache.apply(&Mutation::Positions(batch.clone()), now);
            state.hold(batch.iter().map(|(id, _)| id));
            batch
        };
        if applied.is_empty() {
            return Ok(0);
        }

        let ids = applied.iter().map(|(id, _)| id.clone()).collect();
        let count = applied.len();
        self.spawn_write("set_positions", ids, move |gateway| async move {
            for (id, position) in applied {
                let patch = NotePatch {
                    position: Some(position),
                    updated_at: Some(now),
                    ..NotePatch::default()
                };
                gateway.update(&id, patch).await?;
            }
            Ok::<(), GatewayError>(())
        });
        Ok(count)
    }

    pub fn permanent_delete(&self, id: &str) -> EngineResult<()> {
        let removed = self.remove_notes(&[id.to_string()])?;
        if removed.is_empty() {
            return Err(EngineError::NotFound(format!("note {id}")));
        }
        let id = id.to_string();
        self.spawn_write("permanent_delete", removed, move |gateway| async move {
            gateway.delete(&id).await
        });
        Ok(())
    }

    pub fn permanent_delete_many(&self, ids: &[String]) -> EngineResult<usize> {
        let removed = self.remove_notes(ids)?;
        Ok(self.spawn_delete_many("permanent_delete_many", removed))
    }

    pub fn permanent_delete_all(&self) -> EngineResult<usize> {
        let removed = {
            let mut state = self.lock_state();
            state.owner()?;
            let trashed: Vec<String> = state
                .cache
                .notes()
                .iter()
                .filter(|note| note.deleted_at.is_some())
                .map(|note| note.id.clone())
                .collect();
            let removed = state.cache.apply(&Mutation::Remove(trashed), Utc::now());
            state.hold(&removed);
            removed
        };
        Ok(self.spawn_delete_many("permanent_delete_all", removed))
    }

    pub fn create_folder(&self, name: &str, color: impl Into<String>) -> EngineResult<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Invalid("folder name cannot be empty".to_string()));
        }
        let folder = {
            let mut state = self.lock_state();
            let folder = Folder {
                id: Uuid::new_v4().to_string(),
                owner: state.owner()?,
                name: name.to_string(),
                color: color.into(),
                created_at: Utc::now(),
            };
            state.cache.insert_folder(folder.clone());
            folder
        };

        let record = folder.clone();
        self.spawn_write("create_folder", Vec::new(), move |gateway| async move {
            gateway.insert_folder(record).await.map(|_| ())
        });
        Ok(folder)
    }

    pub fn update_folder(&self, id: &str, changes: FolderChanges) -> EngineResult<Folder> {
        if changes.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(EngineError::Invalid("folder name cannot be empty".to_string()));
        }
        let folder = {
            let mut state = self.lock_state();
            state.owner()?;
            state
                .cache
                .update_folder(id, &changes)
                .ok_or_else(|| EngineError::NotFound(format!("folder {id}")))?
        };

        let id = id.to_string();
        self.spawn_write("update_folder", Vec::new(), move |gateway| async move {
            gateway.update_folder(&id, changes).await
        });
        Ok(folder)
    }

    /// Returns how many notes were unfiled.
    pub fn delete_folder(&self, id: &str) -> EngineResult<usize> {
        let now = Utc::now();
        let unfiled = {
            let mut state = self.lock_state();
            state.owner()?;
            state
                .cache
                .remove_folder(id)
                .ok_or_else(|| EngineError::NotFound(format!("folder {id}")))?;
            let members: Vec<String> = state
                .cache
                .notes()
                .iter()
                .filter(|note| note.folder_id.as_deref() == Some(id))
                .map(|note| note.id.clone())
                .collect();
            let unfiled = state.cache.apply(
                &Mutation::Patch {
                    ids: members,
                    patch: folder_patch(None),
                },
                now,
            );
            state.hold(&unfiled);
            unfiled
        };

        let count = unfiled.len();
        let folder_id = id.to_string();
        let notes = unfiled.clone();
        self.spawn_write("delete_folder", unfiled, move |gateway| async move {
            for note_id in notes {
                let patch = NotePatch {
                    updated_at: Some(now),
                    ..folder_patch(None)
                };
                gateway.update(&note_id, patch).await?;
            }
            gateway.delete_folder(&folder_id).await
        });
        Ok(count)
    }

    pub fn on_vault_locked(&self) -> EngineResult<usize> {
        let purged = {
            let mut state = self.lock_state();
            state.owner()?;
            let mut purged = 0usize;
            for note in state.cache.notes_mut() {
                if note.encrypted && matches!(note.body, NoteBody::Plain(_)) {
                    note.body = NoteBody::Withheld;
                    purged += 1;
                }
            }
            purged
        };
        tracing::info!(count = purged, "vault locked; resident plaintext purged");
        self.emit(EngineEvent::VaultLocked);

        self.begin_task();
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(error) = engine.resync().await {
                tracing::warn!(error = %error, "resync after vault lock failed");
            }
            engine.end_task();
        });
        Ok(purged)
    }

    pub async fn on_vault_unlocked(&self) -> EngineResult<usize> {
        self.resync().await
    }

    // Content and ordering are unchanged, so `updated_at` is left alone.
    pub fn migrate_plaintext(&self) -> EngineResult<usize> {
        let key = self
            .inner
            .keys
            .active_key()
            .ok_or_else(|| EngineError::VaultLocked("a key is required to encrypt notes".to_string()))?;

        let sealed: Vec<(String, String)> = {
            let mut state = self.lock_state();
            state.owner()?;
            let mut sealed = Vec::new();
            for note in state.cache.notes() {
                if note.encrypted {
                    continue;
                }
                if let NoteBody::Plain(text) = &note.body {
                    sealed.push((note.id.clone(), seal::seal_body(text, Some(&key))?));
                }
            }
            for (id, _) in &sealed {
                if let Some(note) = state.cache.get_mut(id) {
                    note.encrypted = true;
                }
            }
            state.hold(sealed.iter().map(|(id, _)| id));
            sealed
        };
        if sealed.is_empty() {
            return Ok(0);
        }

        let count = sealed.len();
        let ids = sealed.iter().map(|(id, _)| id.clone()).collect();
        self.spawn_write("migrate_plaintext", ids, move |gateway| async move {
            for (id, body) in sealed {
                let patch = NotePatch {
                    body: Some(body),
                    ..NotePatch::default()
                };
                gateway.update(&id, patch).await?;
            }
            Ok::<(), GatewayError>(())
        });
        tracing::info!(count, "legacy plaintext notes queued for encryption");
        Ok(count)
    }

    fn patch_one(&self, operation: &'static str, id: &str, patch: NotePatch) -> EngineResult<Note> {
        let ids = [id.to_string()];
        let mut notes = self.patch_many(operation, &ids, patch)?;
        notes
            .pop()
            .ok_or_else(|| EngineError::NotFound(format!("note {id}")))
    }

    // Unknown ids are skipped; NOT_FOUND only when none is resident.
    fn patch_many(&self, operation: &'static str, ids: &[String], patch: NotePatch) -> EngineResult<Vec<Note>> {
        let key = self.inner.keys.active_key();
        let now = Utc::now();
        let (touched, notes, wire) = {
            let mut state = self.lock_state();
            state.owner()?;
            let present: Vec<String> = ids
                .iter()
                .filter(|id| state.cache.contains(id))
                .cloned()
                .collect();
            if present.is_empty() {
                return Err(EngineError::NotFound(format!("note {}", ids.join(", "))));
            }
            if patch.body.is_some() && key.is_none() {
                let downgrade = present
                    .iter()
                    .filter_map(|id| state.cache.get(id))
                    .any(|note| note.encrypted);
                if downgrade {
                    return Err(EngineError::VaultLocked(
                        "cannot write the body of an encrypted note while the vault is locked".to_string(),
                    ));
                }
            }

            let mut wire = seal::seal_patch(&patch, key.as_ref())?;
            wire.updated_at = Some(now);
            let touched = state.cache.apply(
                &Mutation::Patch {
                    ids: present,
                    patch,
                },
                now,
            );
            state.hold(&touched);
            let body_written = wire.body.is_some() && key.is_some();
            let mut notes = Vec::with_capacity(touched.len());
            for id in &touched {
                if let Some(note) = state.cache.get_mut(id) {
                    if body_written {
                        note.encrypted = true;
                    }
                    notes.push(note.clone());
                }
            }
            (touched, notes, wire)
        };

        let targets = touched.clone();
        self.spawn_write(operation, touched, move |gateway| async move {
            for id in targets {
                gateway.update(&id, wire.clone()).await?;
            }
            Ok::<(), GatewayError>(())
        });
        Ok(notes)
    }

    fn remove_notes(&self, ids: &[String]) -> EngineResult<Vec<String>> {
        let mut state = self.lock_state();
        state.owner()?;
        let removed = state.cache.apply(&Mutation::Remove(ids.to_vec()), Utc::now());
        state.hold(&removed);
        Ok(removed)
    }

    fn spawn_delete_many(&self, operation: &'static str, removed: Vec<String>) -> usize {
        if removed.is_empty() {
            return 0;
        }
        let count = removed.len();
        let targets = removed.clone();
        self.spawn_write(operation, removed, move |gateway| async move {
            gateway.delete_many(&targets).await
        });
        count
    }

    fn ensure_folder(&self, folder_id: Option<&str>) -> EngineResult<()> {
        let Some(folder_id) = folder_id else {
            return Ok(());
        };
        let state = self.lock_state();
        state.owner()?;
        if state.cache.folder(folder_id).is_none() {
            return Err(EngineError::NotFound(format!("folder {folder_id}")));
        }
        Ok(())
    }

    /// Marks `ids` pending and runs `write` detached. A failure releases
    /// the markers and reloads instead of retrying.
    fn spawn_write<F, Fut>(&self, operation: &'static str, ids: Vec<String>, write: F)
    where
        F: FnOnce(Arc<dyn RemoteGateway>) -> Fut + Send + 'static,
        Fut: Future<Output = GatewayResult<()>> + Send + 'static,
    {
        for id in &ids {
            self.inner.pending.mark(id);
        }
        self.inner.stats.writes_issued.fetch_add(1, Ordering::Relaxed);
        self.begin_task();

        let engine = self.clone();
        let gateway = Arc::clone(&self.inner.gateway);
        tokio::spawn(async move {
            match write(gateway).await {
                Ok(()) => {
                    if engine.owner().is_ok() {
                        for id in &ids {
                            engine.inner.pending.rearm(id);
                        }
                    }
                }
                Err(error) => {
                    engine.inner.stats.writes_failed.fetch_add(1, Ordering::Relaxed);
                    for id in &ids {
                        engine.inner.pending.clear(id);
                    }
                    engine.release(&ids);
                    tracing::warn!(operation, count = ids.len(), error = %error, "remote write failed; reloading");
                    engine.emit(EngineEvent::WriteFailed {
                        ids,
                        operation: operation.to_string(),
                        error: EngineError::from(error).to_string(),
                    });
                    if let Err(reload_error) = engine.load().await {
                        tracing::warn!(operation, error = %reload_error, "reload after failed write also failed");
                    }
                }
            }
            engine.end_task();
        });
    }

    // Best-effort: failures are counted, never retried.
    fn spawn_sweep(&self, ids: Vec<String>) {
        for id in &ids {
            self.inner.pending.mark(id);
        }
        self.inner
            .stats
            .sweeps_issued
            .fetch_add(ids.len() as u64, Ordering::Relaxed);
        tracing::info!(count = ids.len(), "sweeping expired notes");
        self.emit(EngineEvent::Swept { ids: ids.clone() });
        self.begin_task();

        let engine = self.clone();
        tokio::spawn(async move {
            for id in ids {
                if let Err(error) = engine.inner.gateway.delete(&id).await {
                    engine.inner.pending.clear(&id);
                    engine.inner.stats.sweeps_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(note_id = %id, error = %EngineError::Sweep(error.to_string()), "expiry sweep failed");
                } else if engine.owner().is_ok() {
                    engine.inner.pending.rearm(&id);
                }
            }
            engine.end_task();
        });
    }

    // A failed write's reload must see the remote state for its ids.
    fn release(&self, ids: &[String]) {
        let mut state = self.lock_state();
        for id in ids {
            state.held.remove(id);
        }
    }

    fn begin_task(&self) {
        self.inner.inflight.send_modify(|count| *count += 1);
    }

    fn end_task(&self) {
        self.inner
            .inflight
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.inner.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn archived_patch(archived: bool) -> NotePatch {
    NotePatch {
        archived: Some(archived),
        ..NotePatch::default()
    }
}

fn deleted_patch(deleted_at: Option<DateTime<Utc>>) -> NotePatch {
    NotePatch {
        deleted_at: Some(deleted_at),
        ..NotePatch::default()
    }
}

fn folder_patch(folder_id: Option<String>) -> NotePatch {
    NotePatch {
        folder_id: Some(folder_id),
        ..NotePatch::default()
    }
}
