//! Every list here is ordered by [`compare_notes`]: pinned, then position,
//! then most recently updated, then id.

use crate::models::{Note, NoteKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

static QUERY_TERMS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

pub fn compare_notes(left: &Note, right: &Note) -> Ordering {
    right
        .pinned
        .cmp(&left.pinned)
        .then_with(|| match (left.position, right.position) {
            (0, 0) => Ordering::Equal,
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            (a, b) => a.cmp(&b),
        })
        .then_with(|| right.updated_at.cmp(&left.updated_at))
        .then_with(|| left.id.cmp(&right.id))
}

pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(compare_notes);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteViews {
    pub by_kind: BTreeMap<NoteKind, Vec<Note>>,
    pub by_folder: BTreeMap<String, Vec<Note>>,
    pub board: Vec<Note>,
}

pub fn project(active: &[Note]) -> NoteViews {
    let mut views = NoteViews::default();
    for note in active {
        match &note.folder_id {
            Some(folder_id) => views
                .by_folder
                .entry(folder_id.clone())
                .or_default()
                .push(note.clone()),
            None => views.by_kind.entry(note.kind).or_default().push(note.clone()),
        }
        views.board.push(note.clone());
    }
    views.by_kind.values_mut().for_each(|bucket| sort_notes(bucket));
    views.by_folder.values_mut().for_each(|group| sort_notes(group));
    sort_notes(&mut views.board);
    views
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "kebab-case")]
pub enum FolderFilter {
    Unfiled,
    Folder(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteFilter {
    pub kind: Option<NoteKind>,
    pub folder: Option<FolderFilter>,
    #[serde(default)]
    pub pinned_only: bool,
    pub query: Option<String>,
}

impl NoteFilter {
    /// Keeps matching notes, preserving their order. Query terms must all
    /// appear (case-insensitively) in the title or plaintext body.
    pub fn apply(&self, notes: &[Note]) -> Vec<Note> {
        let terms = self.query_terms();
        notes
            .iter()
            .filter(|note| self.kind.map_or(true, |kind| note.kind == kind))
            .filter(|note| match &self.folder {
                None => true,
                Some(FolderFilter::Unfiled) => note.folder_id.is_none(),
                Some(FolderFilter::Folder(id)) => note.folder_id.as_deref() == Some(id.as_str()),
            })
            .filter(|note| !self.pinned_only || note.pinned)
            .filter(|note| {
                terms.iter().all(|term| {
                    term.is_match(&note.title)
                        || note.body.plaintext().is_some_and(|body| term.is_match(body))
                })
            })
            .cloned()
            .collect()
    }

    fn query_terms(&self) -> Vec<Regex> {
        let Some(query) = self.query.as_deref() else {
            return Vec::new();
        };
        QUERY_TERMS
            .split(query.trim())
            .filter(|term| !term.is_empty())
            .filter_map(|term| Regex::new(&format!("(?i){}", regex::escape(term))).ok())
            .collect()
    }
}
