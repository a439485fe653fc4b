//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development
///
/// Clones share the same data, so a caller can hand one clone to an
/// importer and inspect the results through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    profiles: Arc<RwLock<HashMap<String, Profile>>>,
    statements: Arc<RwLock<HashMap<String, Statement>>>,
    lines: Arc<RwLock<Vec<StatementLine>>>,
    attachments: Arc<RwLock<Vec<Attachment>>>,
    default_accounts: Arc<RwLock<DefaultAccounts>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that hands out the given default accounts
    pub fn with_default_accounts(accounts: DefaultAccounts) -> Self {
        Self {
            default_accounts: Arc::new(RwLock::new(accounts)),
            ..Self::default()
        }
    }

    /// Number of stored lines across all statements
    pub fn line_count(&self) -> ImportResult<usize> {
        Ok(read(&self.lines)?.len())
    }

    /// Number of stored attachments across all statements
    pub fn attachment_count(&self) -> ImportResult<usize> {
        Ok(read(&self.attachments)?.len())
    }
}

fn read<T>(lock: &RwLock<T>) -> ImportResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| ImportError::Storage("memory storage lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> ImportResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| ImportError::Storage("memory storage lock poisoned".to_string()))
}

#[async_trait]
impl StatementStorage for MemoryStorage {
    async fn save_profile(&mut self, profile: &Profile) -> ImportResult<()> {
        write(&self.profiles)?.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn get_profile(&self, profile_id: &str) -> ImportResult<Option<Profile>> {
        Ok(read(&self.profiles)?.get(profile_id).cloned())
    }

    async fn save_statement(&mut self, statement: &Statement) -> ImportResult<()> {
        write(&self.statements)?.insert(statement.id.clone(), statement.clone());
        Ok(())
    }

    async fn get_statement(&self, statement_id: &str) -> ImportResult<Option<Statement>> {
        Ok(read(&self.statements)?.get(statement_id).cloned())
    }

    async fn list_statements(&self, profile_id: Option<&str>) -> ImportResult<Vec<Statement>> {
        let statements = read(&self.statements)?;
        let mut filtered: Vec<Statement> = statements
            .values()
            .filter(|statement| profile_id.is_none_or(|id| statement.profile_id == id))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(filtered)
    }

    async fn delete_statement(&mut self, statement_id: &str) -> ImportResult<()> {
        if write(&self.statements)?.remove(statement_id).is_none() {
            return Err(ImportError::not_found("Statement", statement_id));
        }
        write(&self.lines)?.retain(|line| line.statement_id != statement_id);
        write(&self.attachments)?.retain(|attachment| attachment.statement_id != statement_id);
        Ok(())
    }

    async fn save_line(&mut self, line: &StatementLine) -> ImportResult<()> {
        if !read(&self.statements)?.contains_key(&line.statement_id) {
            return Err(ImportError::not_found("Statement", &line.statement_id));
        }
        write(&self.lines)?.push(line.clone());
        Ok(())
    }

    async fn update_line(&mut self, line: &StatementLine) -> ImportResult<()> {
        let mut lines = write(&self.lines)?;
        match lines.iter_mut().find(|existing| existing.id == line.id) {
            Some(existing) => {
                *existing = line.clone();
                Ok(())
            }
            None => Err(ImportError::not_found("Statement line", &line.id)),
        }
    }

    async fn get_statement_lines(&self, statement_id: &str) -> ImportResult<Vec<StatementLine>> {
        Ok(read(&self.lines)?
            .iter()
            .filter(|line| line.statement_id == statement_id)
            .cloned()
            .collect())
    }

    async fn save_attachment(&mut self, attachment: &Attachment) -> ImportResult<()> {
        if !read(&self.statements)?.contains_key(&attachment.statement_id) {
            return Err(ImportError::not_found("Statement", &attachment.statement_id));
        }
        write(&self.attachments)?.push(attachment.clone());
        Ok(())
    }

    async fn get_attachments(&self, statement_id: &str) -> ImportResult<Vec<Attachment>> {
        Ok(read(&self.attachments)?
            .iter()
            .filter(|attachment| attachment.statement_id == statement_id)
            .cloned()
            .collect())
    }

    async fn default_accounts(&self) -> ImportResult<DefaultAccounts> {
        Ok(read(&self.default_accounts)?.clone())
    }
}
