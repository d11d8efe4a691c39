//! Correction Notes Timeline
//!
//! Append-only, ascending by `created_at`. Notes are never edited. The most
//! recent note is the last element, so `latest` is O(1).

use chrono::{DateTime, Utc};
use pf_schemas::CorrectionNote;
use uuid::Uuid;

use crate::error::ValidationError;

/// Trimmed message, or `EmptyNote` if nothing is left.
pub fn normalize_message(message: &str) -> Result<String, ValidationError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyNote);
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesTimeline {
    session_id: Uuid,
    notes: Vec<CorrectionNote>,
}

impl NotesTimeline {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            notes: Vec::new(),
        }
    }

    /// Build from rows in any order.
    pub fn from_notes(session_id: Uuid, notes: Vec<CorrectionNote>) -> Self {
        let mut t = Self::new(session_id);
        t.merge_remote(notes);
        t
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Build a new note. Callers persist it before calling [`Self::push`].
    pub fn compose(
        &self,
        author: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<CorrectionNote, ValidationError> {
        Ok(CorrectionNote {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            author: author.to_string(),
            message: normalize_message(message)?,
            created_at: now,
        })
    }

    pub fn append(
        &mut self,
        author: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<CorrectionNote, ValidationError> {
        let note = self.compose(author, message, now)?;
        self.push(note.clone());
        Ok(note)
    }

    /// Insert an already-persisted note at its place in time.
    pub fn push(&mut self, note: CorrectionNote) {
        self.merge_remote(std::iter::once(note));
    }

    /// Fold notes pushed by other clients. Known ids are ignored; order
    /// among notes with equal timestamps is arrival order.
    pub fn merge_remote(&mut self, incoming: impl IntoIterator<Item = CorrectionNote>) {
        for note in incoming {
            if note.session_id != self.session_id || self.notes.iter().any(|n| n.id == note.id) {
                continue;
            }
            let at = self.notes.partition_point(|n| n.created_at <= note.created_at);
            self.notes.insert(at, note);
        }
    }

    pub fn latest(&self) -> Option<&CorrectionNote> {
        self.notes.last()
    }

    pub fn notes(&self) -> &[CorrectionNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
