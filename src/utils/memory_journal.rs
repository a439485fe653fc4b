//! In-memory import journal

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// One message in the import journal
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub profile_id: String,
    pub message: String,
    pub logged_at: NaiveDateTime,
}

/// Import journal kept in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages posted for one profile, oldest first
    pub fn messages(&self, profile_id: &str) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.profile_id == profile_id)
                    .map(|entry| entry.message.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every entry, oldest first
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImportJournal for MemoryJournal {
    async fn post_log(&mut self, profile_id: &str, message: &str) -> ImportResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ImportError::Storage("import journal lock poisoned".to_string()))?;
        entries.push(JournalEntry {
            profile_id: profile_id.to_string(),
            message: message.to_string(),
            logged_at: chrono::Utc::now().naive_utc(),
        });
        Ok(())
    }
}
