use crate::errors::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shown in place of a body that cannot be decrypted right now.
pub const OPAQUE_BODY_MARKER: &str = "[encrypted]";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteKind {
    #[default]
    Text,
    Checklist,
    Board,
    #[serde(other)]
    Unknown,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Checklist => "checklist",
            Self::Board => "board",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "text" => Self::Text,
            "checklist" => Self::Checklist,
            "board" => Self::Board,
            _ => Self::Unknown,
        }
    }
}

/// Body of a resident note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "kebab-case")]
pub enum NoteBody {
    Plain(String),
    /// Ciphertext that could not be opened (vault locked or wrong key).
    /// Kept verbatim so it can be written back untouched.
    Sealed(String),
    /// Plaintext purged after the vault locked; refetched on the next resync.
    Withheld,
}

impl NoteBody {
    pub fn plaintext(&self) -> Option<&str> {
        match self {
            Self::Plain(text) => Some(text),
            Self::Sealed(_) | Self::Withheld => None,
        }
    }

    pub fn display(&self) -> &str {
        self.plaintext().unwrap_or(OPAQUE_BODY_MARKER)
    }

    pub fn is_opaque(&self) -> bool {
        self.plaintext().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub body: NoteBody,
    pub kind: NoteKind,
    pub color: String,
    pub folder_id: Option<String>,
    pub pinned: bool,
    pub position: u32,
    pub archived: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Whether the stored copy of the body is ciphertext.
    pub encrypted: bool,
}

impl Note {
    /// Applies a patch whose body, if any, is plaintext.
    pub fn apply_patch(&mut self, patch: &NotePatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(body) = &patch.body {
            self.body = NoteBody::Plain(body.clone());
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(folder_id) = &patch.folder_id {
            self.folder_id = folder_id.clone();
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
        }
        if let Some(deleted_at) = patch.deleted_at {
            self.deleted_at = deleted_at;
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = expires_at;
        }
    }

    /// Moves `updated_at` forward, never backward.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// A note as stored remotely. `body` may be ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub body: String,
    pub kind: NoteKind,
    pub color: String,
    pub folder_id: Option<String>,
    pub pinned: bool,
    pub position: u32,
    pub archived: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NoteRecord {
    /// Applies a patch whose body, if any, is already wire-encoded.
    pub fn apply_patch(&mut self, patch: &NotePatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(body) = &patch.body {
            self.body = body.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(folder_id) = &patch.folder_id {
            self.folder_id = folder_id.clone();
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
        }
        if let Some(deleted_at) = patch.deleted_at {
            self.deleted_at = deleted_at;
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = expires_at;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

/// Partial note update. Outer `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub kind: Option<NoteKind>,
    pub color: Option<String>,
    pub folder_id: Option<Option<String>>,
    pub pinned: Option<bool>,
    pub position: Option<u32>,
    pub archived: Option<bool>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub kind: NoteKind,
    #[serde(default = "default_color")]
    pub color: String,
    pub folder_id: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Fields a consumer can edit through `update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub kind: Option<NoteKind>,
    pub color: Option<String>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl From<NoteChanges> for NotePatch {
    fn from(value: NoteChanges) -> Self {
        Self {
            title: value.title,
            body: value.body,
            kind: value.kind,
            color: value.color,
            expires_at: value.expires_at,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderChanges {
    pub name: Option<String>,
    pub color: Option<String>,
}

pub fn default_color() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change pushed by the remote change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: String,
    pub record: Option<NoteRecord>,
}

impl ChangeEvent {
    pub fn insert(record: NoteRecord) -> Self {
        Self {
            kind: ChangeKind::Insert,
            id: record.id.clone(),
            record: Some(record),
        }
    }

    pub fn update(record: NoteRecord) -> Self {
        Self {
            kind: ChangeKind::Update,
            id: record.id.clone(),
            record: Some(record),
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            id: id.into(),
            record: None,
        }
    }
}

/// Notifications for consumers about work that finished after a call returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    WriteFailed {
        ids: Vec<String>,
        operation: String,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    Reloaded { count: usize },
    #[serde(rename_all = "camelCase")]
    Swept { ids: Vec<String> },
    FeedClosed,
    VaultLocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    pub suppression_window_ms: u64,
    pub retention_days: u32,
    pub kdf_iterations: u32,
    pub sweep_interval_secs: u64,
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            suppression_window_ms: 1_500,
            retention_days: 30,
            kdf_iterations: crate::crypto::MIN_KDF_ITERATIONS,
            sweep_interval_secs: 60,
            event_capacity: 256,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> EngineResult<()> {
        if self.kdf_iterations < crate::crypto::MIN_KDF_ITERATIONS {
            return Err(EngineError::Invalid(format!(
                "kdfIterations must be at least {}",
                crate::crypto::MIN_KDF_ITERATIONS
            )));
        }
        if self.retention_days == 0 {
            return Err(EngineError::Invalid("retentionDays must be positive".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::Invalid("eventCapacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn suppression_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.suppression_window_ms)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Merges a partial JSON document over these settings.
    pub fn merged(&self, update: serde_json::Value) -> EngineResult<Self> {
        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, update);
        let settings: Self = serde_json::from_value(merged)?;
        settings.validate()?;
        Ok(settings)
    }
}

pub(crate) fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target), serde_json::Value::Object(update)) => {
            for (key, value) in update {
                merge_json(target.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => *target = update,
    }
}
