//! Crossing the encryption boundary between cached notes and wire records.

use crate::crypto::{self, CryptoError, DecryptionError, NoteKey, Payload};
use crate::errors::{EngineError, EngineResult};
use crate::models::{Note, NoteBody, NotePatch, NoteRecord};

#[derive(Debug, Clone)]
pub struct Opened {
    pub note: Note,
    pub failure: Option<DecryptionError>,
}

/// Turns a wire record into a resident note. Ciphertext that cannot be
/// opened is kept as an opaque `Sealed` body, never dropped or garbled.
pub fn open_record(record: NoteRecord, key: Option<&NoteKey>) -> Opened {
    let (body, encrypted, failure) = match Payload::parse(&record.body) {
        Ok(Payload::Plaintext(text)) => (NoteBody::Plain(text.to_string()), false, None),
        Ok(Payload::Ciphertext { .. }) => match key {
            None => (NoteBody::Sealed(record.body.clone()), true, None),
            Some(key) => match crypto::decrypt(&record.body, key) {
                Ok(text) => (NoteBody::Plain(text), true, None),
                Err(error) => (NoteBody::Sealed(record.body.clone()), true, Some(error)),
            },
        },
        Err(error) => (NoteBody::Sealed(record.body.clone()), true, Some(error)),
    };

    Opened {
        note: Note {
            id: record.id,
            owner: record.owner,
            title: record.title,
            body,
            kind: record.kind,
            color: record.color,
            folder_id: record.folder_id,
            pinned: record.pinned,
            position: record.position,
            archived: record.archived,
            deleted_at: record.deleted_at,
            expires_at: record.expires_at,
            updated_at: record.updated_at,
            created_at: record.created_at,
            encrypted,
        },
        failure,
    }
}

/// Encodes a plaintext body for the wire: ciphertext when a key is
/// available, legacy plaintext otherwise.
pub fn seal_body(body: &str, key: Option<&NoteKey>) -> Result<String, CryptoError> {
    match key {
        Some(key) => crypto::encrypt(body, key),
        None => Ok(body.to_string()),
    }
}

pub fn seal_patch(patch: &NotePatch, key: Option<&NoteKey>) -> EngineResult<NotePatch> {
    let mut sealed = patch.clone();
    if let Some(body) = &patch.body {
        sealed.body = Some(seal_body(body, key)?);
    }
    Ok(sealed)
}

pub fn seal_note(note: &Note, key: Option<&NoteKey>) -> EngineResult<NoteRecord> {
    let body = match &note.body {
        NoteBody::Plain(text) => seal_body(text, key)?,
        NoteBody::Sealed(ciphertext) => ciphertext.clone(),
        NoteBody::Withheld => {
            return Err(EngineError::VaultLocked(format!(
                "body of note {} is not resident",
                note.id
            )))
        }
    };
    Ok(NoteRecord {
        id: note.id.clone(),
        owner: note.owner.clone(),
        title: note.title.clone(),
        body,
        kind: note.kind,
        color: note.color.clone(),
        folder_id: note.folder_id.clone(),
        pinned: note.pinned,
        position: note.position,
        archived: note.archived,
        deleted_at: note.deleted_at,
        expires_at: note.expires_at,
        updated_at: note.updated_at,
        created_at: note.created_at,
    })
}
