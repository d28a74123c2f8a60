//! Merging remote change events into the cache.
//!
//! - insert: idempotent, ignored when the id is already resident.
//! - update: dropped outright while the id has a pending local write.
//! - delete: always applied, pending or not.

use crate::cache::NoteCache;
use crate::crypto::{DecryptionError, NoteKey};
use crate::models::{ChangeEvent, ChangeKind};
use crate::pending::PendingWrites;
use crate::seal::open_record;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeOutcome {
    Inserted,
    Merged,
    Removed,
    Suppressed,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub outcome: ChangeOutcome,
    pub failure: Option<DecryptionError>,
}

impl Reconciled {
    fn outcome(outcome: ChangeOutcome) -> Self {
        Self { outcome, failure: None }
    }
}

pub fn reconcile(
    cache: &mut NoteCache,
    pending: &PendingWrites,
    owner: &str,
    event: ChangeEvent,
    key: Option<&NoteKey>,
    now: DateTime<Utc>,
) -> Reconciled {
    match event.kind {
        ChangeKind::Delete => {
            pending.clear(&event.id);
            match cache.remove(&event.id) {
                Some(_) => Reconciled::outcome(ChangeOutcome::Removed),
                None => Reconciled::outcome(ChangeOutcome::Ignored),
            }
        }
        ChangeKind::Insert => {
            let Some(record) = event.record.filter(|record| record.owner == owner) else {
                return Reconciled::outcome(ChangeOutcome::Ignored);
            };
            if cache.contains(&record.id) {
                return Reconciled::outcome(ChangeOutcome::Ignored);
            }
            let opened = open_record(record, key);
            cache.insert_remote(opened.note);
            Reconciled {
                outcome: ChangeOutcome::Inserted,
                failure: opened.failure,
            }
        }
        ChangeKind::Update => {
            if pending.is_pending(&event.id) {
                return Reconciled::outcome(ChangeOutcome::Suppressed);
            }
            let Some(record) = event.record.filter(|record| record.owner == owner) else {
                return Reconciled::outcome(ChangeOutcome::Ignored);
            };
            if !cache.contains(&record.id) {
                return Reconciled::outcome(ChangeOutcome::Ignored);
            }
            let opened = open_record(record, key);
            cache.merge_remote(opened.note, now);
            Reconciled {
                outcome: ChangeOutcome::Merged,
                failure: opened.failure,
            }
        }
    }
}
