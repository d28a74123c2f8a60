pub mod cache;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod pending;
pub mod policy;
pub mod projection;
pub mod reconcile;
mod scheduler;
pub mod seal;
mod session;
pub mod vault;

pub use crate::crypto::{decrypt, derive_key, encrypt, is_encrypted, NoteKey};
pub use crate::db::Database;
pub use crate::engine::{NoteEngine, StatsSnapshot};
pub use crate::errors::{EngineError, EngineResult};
pub use crate::gateway::memory::MemoryGateway;
pub use crate::gateway::{ChangeFeed, GatewayError, RemoteGateway};
pub use crate::models::{
    ChangeEvent, ChangeKind, EngineEvent, EngineSettings, Folder, FolderChanges, NewNote, Note, NoteBody,
    NoteChanges, NoteKind, NotePatch, NoteRecord,
};
pub use crate::policy::{LifecyclePolicy, LifecycleState, Partitions};
pub use crate::projection::{FolderFilter, NoteFilter, NoteViews};
pub use crate::reconcile::ChangeOutcome;
pub use crate::vault::{KeyProvider, Vault};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs the global JSON subscriber, writing to a daily rolling file
/// under `data_dir/logs`. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "notesync.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
