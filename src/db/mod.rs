use crate::errors::{EngineError, EngineResult};
use crate::gateway::{ChangeFeed, FeedHub, GatewayError, GatewayResult, RemoteGateway};
use crate::models::{
    merge_json, ChangeEvent, EngineSettings, Folder, FolderChanges, NoteKind, NotePatch, NoteRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const NOTE_COLUMNS: &str = "id, owner, title, body, kind, color, folder_id, pinned, position, archived, deleted_at, expires_at, updated_at, created_at";

/// SQLite-backed note store. Writes are published to subscribers of the
/// owning account after the row is committed.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    feed: FeedHub,
}

impl Database {
    pub fn new(path: &Path) -> EngineResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| EngineError::Internal(err.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
            feed: FeedHub::default(),
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_settings(&self) -> EngineResult<EngineSettings> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'engine'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<EngineSettings>(&raw).unwrap_or_default()),
            None => Ok(EngineSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> EngineResult<EngineSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: EngineSettings = serde_json::from_value(merged)?;
        settings.validate()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('engine', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> EngineResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value_json, updated_at) VALUES ('engine', ?1, ?2)",
            params![
                serde_json::to_string(&EngineSettings::default())?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, EngineError> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Internal("database mutex poisoned".to_string()))
    }

    fn gateway_conn(&self) -> GatewayResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GatewayError::Storage("database mutex poisoned".to_string()))
    }

    fn fetch_note(conn: &Connection, id: &str) -> GatewayResult<Option<NoteRecord>> {
        Ok(conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                [id],
                parse_note_row,
            )
            .optional()?)
    }

    fn write_note(conn: &Connection, record: &NoteRecord) -> GatewayResult<()> {
        conn.execute(
            "UPDATE notes SET title = ?2, body = ?3, kind = ?4, color = ?5, folder_id = ?6, pinned = ?7,
               position = ?8, archived = ?9, deleted_at = ?10, expires_at = ?11, updated_at = ?12
             WHERE id = ?1",
            params![
                record.id,
                record.title,
                record.body,
                record.kind.as_str(),
                record.color,
                record.folder_id,
                record.pinned,
                record.position,
                record.archived,
                record.deleted_at.map(|value| value.to_rfc3339()),
                record.expires_at.map(|value| value.to_rfc3339()),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Deletes one row and returns its owner, if it existed.
    fn delete_row(conn: &Connection, id: &str) -> GatewayResult<Option<String>> {
        let owner = conn
            .query_row("SELECT owner FROM notes WHERE id = ?1", [id], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        if owner.is_some() {
            conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
        }
        Ok(owner)
    }
}

#[async_trait]
impl RemoteGateway for Database {
    async fn load(&self, owner: &str) -> GatewayResult<Vec<NoteRecord>> {
        let conn = self.gateway_conn()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE owner = ?1 ORDER BY seq DESC"
        ))?;
        let records = statement
            .query_map([owner], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn insert(&self, record: NoteRecord) -> GatewayResult<NoteRecord> {
        {
            let conn = self.gateway_conn()?;
            if Self::fetch_note(&conn, &record.id)?.is_some() {
                return Err(GatewayError::Rejected(format!("duplicate id {}", record.id)));
            }
            conn.execute(
                "INSERT INTO notes (
                   id, owner, title, body, kind, color, folder_id, pinned, position, archived,
                   deleted_at, expires_at, updated_at, created_at, seq
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                   (SELECT COALESCE(MAX(seq), 0) + 1 FROM notes))",
                params![
                    record.id,
                    record.owner,
                    record.title,
                    record.body,
                    record.kind.as_str(),
                    record.color,
                    record.folder_id,
                    record.pinned,
                    record.position,
                    record.archived,
                    record.deleted_at.map(|value| value.to_rfc3339()),
                    record.expires_at.map(|value| value.to_rfc3339()),
                    record.updated_at.to_rfc3339(),
                    record.created_at.to_rfc3339(),
                ],
            )?;
        }
        self.feed.publish(&record.owner, &ChangeEvent::insert(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &str, patch: NotePatch) -> GatewayResult<()> {
        let updated = {
            let conn = self.gateway_conn()?;
            let mut record =
                Self::fetch_note(&conn, id)?.ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
            record.apply_patch(&patch);
            Self::write_note(&conn, &record)?;
            record
        };
        let owner = updated.owner.clone();
        self.feed.publish(&owner, &ChangeEvent::update(updated));
        Ok(())
    }

    async fn delete(&self, id: &str) -> GatewayResult<()> {
        let owner = {
            let conn = self.gateway_conn()?;
            Self::delete_row(&conn, id)?
        };
        if let Some(owner) = owner {
            self.feed.publish(&owner, &ChangeEvent::delete(id));
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> GatewayResult<()> {
        let removed = {
            let mut conn = self.gateway_conn()?;
            let tx = conn.transaction()?;
            let mut removed = Vec::new();
            for id in ids {
                if let Some(owner) = Self::delete_row(&tx, id)? {
                    removed.push((owner, id.clone()));
                }
            }
            tx.commit()?;
            removed
        };
        for (owner, id) in removed {
            self.feed.publish(&owner, &ChangeEvent::delete(id));
        }
        Ok(())
    }

    async fn subscribe(&self, owner: &str) -> GatewayResult<ChangeFeed> {
        Ok(self.feed.subscribe(owner))
    }

    async fn load_folders(&self, owner: &str) -> GatewayResult<Vec<Folder>> {
        let conn = self.gateway_conn()?;
        let mut statement = conn.prepare(
            "SELECT id, owner, name, color, created_at FROM folders WHERE owner = ?1 ORDER BY created_at ASC",
        )?;
        let folders = statement
            .query_map([owner], |row| {
                Ok(Folder {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    name: row.get(2)?,
                    color: row.get(3)?,
                    created_at: parse_time(&row.get::<_, String>(4)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(folders)
    }

    async fn insert_folder(&self, folder: Folder) -> GatewayResult<Folder> {
        let conn = self.gateway_conn()?;
        conn.execute(
            "INSERT INTO folders (id, owner, name, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                folder.id,
                folder.owner,
                folder.name,
                folder.color,
                folder.created_at.to_rfc3339()
            ],
        )?;
        Ok(folder)
    }

    async fn update_folder(&self, id: &str, changes: FolderChanges) -> GatewayResult<()> {
        let conn = self.gateway_conn()?;
        let changed = conn.execute(
            "UPDATE folders SET name = COALESCE(?2, name), color = COALESCE(?3, color) WHERE id = ?1",
            params![id, changes.name, changes.color],
        )?;
        if changed == 0 {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_folder(&self, id: &str) -> GatewayResult<()> {
        let mut conn = self.gateway_conn()?;
        let tx = conn.transaction()?;
        tx.execute("UPDATE notes SET folder_id = NULL WHERE folder_id = ?1", [id])?;
        tx.execute("DELETE FROM folders WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(())
    }
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<NoteRecord> {
    Ok(NoteRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        kind: NoteKind::parse(&row.get::<_, String>(4)?),
        color: row.get(5)?,
        folder_id: row.get(6)?,
        pinned: row.get(7)?,
        position: row.get(8)?,
        archived: row.get(9)?,
        deleted_at: parse_optional_time(row.get(10)?)?,
        expires_at: parse_optional_time(row.get(11)?)?,
        updated_at: parse_time(&row.get::<_, String>(12)?)?,
        created_at: parse_time(&row.get::<_, String>(13)?)?,
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn parse_optional_time(raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_time).transpose()
}
