//! Session-scoped working memory for the note tools.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A saved note. Notes never change once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Note {
    id: u64,
    topic: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl Note {
    /// Returns the id, starting from `1`.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the topic the note was saved under.
    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the content.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when the note was saved.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// An append-only, topic-indexed list of notes.
///
/// Ids are dense: the n-th saved note gets id `n`.
#[derive(Clone, Debug, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
}

impl NoteStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a note and returns it. Empty topics and contents are fine.
    pub fn save<T: Into<String>, C: Into<String>>(
        &mut self,
        topic: T,
        content: C,
    ) -> Note {
        let note = Note {
            id: self.notes.len() as u64 + 1,
            topic: topic.into(),
            content: content.into(),
            created_at: Utc::now(),
        };
        debug!("saved note #{} under {:?}", note.id, note.topic);
        self.notes.push(note.clone());
        note
    }

    /// Returns the notes whose topic contains `filter`, ignoring case, in
    /// the order they were saved. An empty filter matches every note.
    pub fn list(&self, filter: &str) -> Vec<Note> {
        if filter.is_empty() {
            return self.notes.clone();
        }
        let filter = filter.to_lowercase();
        self.notes
            .iter()
            .filter(|note| note.topic.to_lowercase().contains(&filter))
            .cloned()
            .collect()
    }

    /// Returns the number of notes.
    #[inline]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Returns `true` if nothing was saved yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// A shared handle to one [`NoteStore`].
///
/// Clones refer to the same store, and all writes go through its lock, so
/// runs sharing a notebook still get gap-free ids.
#[derive(Clone, Debug, Default)]
pub struct Notebook {
    store: Arc<Mutex<NoteStore>>,
}

impl Notebook {
    /// Creates a notebook around an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`NoteStore::save`].
    #[inline]
    pub fn save<T: Into<String>, C: Into<String>>(
        &self,
        topic: T,
        content: C,
    ) -> Note {
        self.lock().save(topic, content)
    }

    /// See [`NoteStore::list`].
    #[inline]
    pub fn list(&self, filter: &str) -> Vec<Note> {
        self.lock().list(filter)
    }

    /// Returns the number of notes.
    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing was saved yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Notes are only ever appended whole, so a poisoned store is still
    // consistent.
    fn lock(&self) -> MutexGuard<'_, NoteStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
