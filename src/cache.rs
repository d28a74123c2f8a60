
use crate::models::{Folder, FolderChanges, Note, NotePatch};
use crate::policy::LifecyclePolicy;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert(Note),
    Patch { ids: Vec<String>, patch: NotePatch },
    Positions(Vec<(String, u32)>),
    Remove(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct NoteCache {
    notes: Vec<Note>,
    folders: Vec<Folder>,
}

impl NoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| note.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn notes_mut(&mut self) -> impl Iterator<Item = &mut Note> {
        self.notes.iter_mut()
    }

    /// Returns the ids that were actually affected.
    pub fn apply(&mut self, mutation: &Mutation, now: DateTime<Utc>) -> Vec<String> {
        match mutation {
            Mutation::Insert(note) => {
                if self.contains(&note.id) {
                    return Vec::new();
                }
                self.notes.insert(0, note.clone());
                vec![note.id.clone()]
            }
            Mutation::Patch { ids, patch } => {
                let mut touched = Vec::new();
                for id in ids {
                    if let Some(note) = self.get_mut(id) {
                        note.apply_patch(patch);
                        note.stamp(now);
                        touched.push(id.clone());
                    }
                }
                touched
            }
            Mutation::Positions(batch) => {
                let mut touched = Vec::new();
                for (id, position) in batch {
                    if let Some(note) = self.get_mut(id) {
                        note.position = *position;
                        note.stamp(now);
                        touched.push(id.clone());
                    }
                }
                touched
            }
            Mutation::Remove(ids) => {
                let mut removed = Vec::new();
                self.notes.retain(|note| {
                    let remove = ids.contains(&note.id);
                    if remove {
                        removed.push(note.id.clone());
                    }
                    !remove
                });
                removed
            }
        }
    }

    pub fn insert_remote(&mut self, note: Note) -> bool {
        if self.contains(&note.id) {
            return false;
        }
        self.notes.insert(0, note);
        true
    }

    pub fn merge_remote(&mut self, incoming: Note, now: DateTime<Utc>) -> bool {
        let Some(existing) = self.get_mut(&incoming.id) else {
            return false;
        };
        let created_at = existing.created_at;
        let floor = existing.updated_at;
        *existing = incoming;
        existing.created_at = created_at;
        existing.updated_at = floor;
        existing.stamp(now);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.id == id)?;
        Some(self.notes.remove(index))
    }

    /// Replaces the working set with a fresh load. For ids where `keep`
    /// holds, the resident state wins over the snapshot, including absence.
    pub fn replace_all(&mut self, notes: Vec<Note>, folders: Vec<Folder>, keep: impl Fn(&str) -> bool) {
        let mut retained: Vec<Note> = self
            .notes
            .iter()
            .filter(|note| keep(&note.id))
            .cloned()
            .collect();

        let mut next = Vec::with_capacity(notes.len() + retained.len());
        for note in notes {
            if !keep(&note.id) {
                next.push(note);
            } else if let Some(index) = retained.iter().position(|local| local.id == note.id) {
                next.push(retained.remove(index));
            }
        }
        retained.extend(next);
        self.notes = retained;
        self.folders = folders;
    }

    pub fn take_expired(&mut self, policy: &LifecyclePolicy, now: DateTime<Utc>) -> Vec<Note> {
        let mut expired = Vec::new();
        self.notes.retain(|note| {
            if policy.is_expired(note, now) {
                expired.push(note.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.id == id)
    }

    pub fn insert_folder(&mut self, folder: Folder) {
        self.folders.retain(|existing| existing.id != folder.id);
        self.folders.push(folder);
    }

    pub fn update_folder(&mut self, id: &str, changes: &FolderChanges) -> Option<Folder> {
        let folder = self.folders.iter_mut().find(|folder| folder.id == id)?;
        if let Some(name) = &changes.name {
            folder.name = name.clone();
        }
        if let Some(color) = &changes.color {
            folder.color = color.clone();
        }
        Some(folder.clone())
    }

    pub fn remove_folder(&mut self, id: &str) -> Option<Folder> {
        let index = self.folders.iter().position(|folder| folder.id == id)?;
        Some(self.folders.remove(index))
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.folders.clear();
    }
}
