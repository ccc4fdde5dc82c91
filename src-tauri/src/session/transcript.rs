//! Conversation transcript
//!
//! Entries are kept in arrival order. The room re-sends a segment as it is
//! refined (interim, then final) under the same id; those updates replace
//! the existing entry in place so list identities stay stable for the UI.

use super::connection::TranscriptionSegment;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// This device's microphone, or text typed on it
    Local,
    /// The other party
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Stable identity for list diffing
    pub id: String,
    pub origin: Origin,
    pub text: String,
    pub is_final: bool,
    pub received_at: DateTime<Utc>,
    /// Room identity of the speaker. `None` for text typed on this device.
    #[serde(skip)]
    pub participant: Option<String>,
}

/// Whether an upsert added or replaced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
    /// Same text and finality as before
    Unchanged,
}

#[derive(Debug, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
    index: HashMap<String, usize>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment or update the entry that shares its id
    pub fn upsert(&mut self, segment: TranscriptionSegment, local_identity: &str) -> Upsert {
        let origin = origin_of(&segment.participant_identity, local_identity);

        if let Some(&position) = self.index.get(&segment.id) {
            let entry = &mut self.entries[position];
            if entry.text == segment.text
                && entry.is_final == segment.is_final
                && entry.origin == origin
            {
                return Upsert::Unchanged;
            }
            entry.text = segment.text;
            entry.is_final = segment.is_final;
            entry.origin = origin;
            entry.participant = Some(segment.participant_identity);
            return Upsert::Updated;
        }

        self.push(TranscriptEntry {
            id: segment.id,
            origin,
            text: segment.text,
            is_final: segment.is_final,
            received_at: Utc::now(),
            participant: Some(segment.participant_identity),
        });
        Upsert::Added
    }

    /// Re-derive every origin once this device's room identity is known.
    /// Returns the number of entries whose origin changed.
    pub fn retag(&mut self, local_identity: &str) -> usize {
        let mut changed = 0;
        for entry in &mut self.entries {
            let Some(participant) = &entry.participant else {
                continue;
            };
            let origin = origin_of(participant, local_identity);
            if entry.origin != origin {
                entry.origin = origin;
                changed += 1;
            }
        }
        changed
    }

    /// Record a message typed on this device
    pub fn push_local_message(&mut self, text: &str) -> &TranscriptEntry {
        self.push(TranscriptEntry {
            id: Uuid::new_v4().to_string(),
            origin: Origin::Local,
            text: text.to_string(),
            is_final: true,
            received_at: Utc::now(),
            participant: None,
        })
    }

    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: TranscriptEntry) -> &TranscriptEntry {
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }
}

fn origin_of(participant: &str, local_identity: &str) -> Origin {
    if !local_identity.is_empty() && participant == local_identity {
        Origin::Local
    } else {
        Origin::Remote
    }
}
