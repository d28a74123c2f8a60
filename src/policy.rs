use crate::models::{EngineSettings, Note};
use crate::projection::sort_notes;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Active,
    Archived,
    /// Soft-deleted and still inside the retention window.
    Deleted,
    /// Soft-deleted past the retention window: hidden everywhere, not purged.
    Lapsed,
    Expired,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partitions {
    pub active: Vec<Note>,
    pub archived: Vec<Note>,
    pub deleted: Vec<Note>,
    pub expired: Vec<Note>,
}

#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    retention: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl LifecyclePolicy {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.retention())
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn is_expired(&self, note: &Note, now: DateTime<Utc>) -> bool {
        note.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn state(&self, note: &Note, now: DateTime<Utc>) -> LifecycleState {
        if self.is_expired(note, now) {
            return LifecycleState::Expired;
        }
        match note.deleted_at {
            Some(deleted_at) if now < deleted_at + self.retention => LifecycleState::Deleted,
            Some(_) => LifecycleState::Lapsed,
            None if note.archived => LifecycleState::Archived,
            None => LifecycleState::Active,
        }
    }

    /// Splits notes into views, each ordered by the global sort law.
    pub fn partition<'a>(&self, notes: impl IntoIterator<Item = &'a Note>, now: DateTime<Utc>) -> Partitions {
        let mut partitions = Partitions::default();
        for note in notes {
            let bucket = match self.state(note, now) {
                LifecycleState::Active => &mut partitions.active,
                LifecycleState::Archived => &mut partitions.archived,
                LifecycleState::Deleted => &mut partitions.deleted,
                LifecycleState::Expired => &mut partitions.expired,
                LifecycleState::Lapsed => continue,
            };
            bucket.push(note.clone());
        }
        sort_notes(&mut partitions.active);
        sort_notes(&mut partitions.archived);
        sort_notes(&mut partitions.deleted);
        sort_notes(&mut partitions.expired);
        partitions
    }
}
