//! Traits for storage abstraction and the pluggable parts of an import

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::types::*;

/// Storage abstraction for statements and their profiles
///
/// The importer works with any backend (an ERP's ORM, SQL, in-memory, etc.)
/// through these methods. Transactions are the backend's business; the
/// importer only relies on `delete_statement` to undo a failed import.
#[async_trait]
pub trait StatementStorage: Send + Sync {
    /// Save a profile to storage
    async fn save_profile(&mut self, profile: &Profile) -> ImportResult<()>;

    /// Get a profile by ID
    async fn get_profile(&self, profile_id: &str) -> ImportResult<Option<Profile>>;

    /// Save a new statement
    async fn save_statement(&mut self, statement: &Statement) -> ImportResult<()>;

    /// Get a statement by ID
    async fn get_statement(&self, statement_id: &str) -> ImportResult<Option<Statement>>;

    /// List statements, optionally only those imported with one profile
    async fn list_statements(&self, profile_id: Option<&str>) -> ImportResult<Vec<Statement>>;

    /// Delete a statement together with its lines and attachments
    async fn delete_statement(&mut self, statement_id: &str) -> ImportResult<()>;

    /// Save a new statement line
    async fn save_line(&mut self, line: &StatementLine) -> ImportResult<()>;

    /// Update an existing statement line
    async fn update_line(&mut self, line: &StatementLine) -> ImportResult<()>;

    /// Lines of a statement in creation order
    async fn get_statement_lines(&self, statement_id: &str) -> ImportResult<Vec<StatementLine>>;

    /// Save a new attachment
    async fn save_attachment(&mut self, attachment: &Attachment) -> ImportResult<()>;

    /// Attachments linked to a statement
    async fn get_attachments(&self, statement_id: &str) -> ImportResult<Vec<Attachment>>;

    /// Default receivable and payable accounts for imported lines
    async fn default_accounts(&self) -> ImportResult<DefaultAccounts>;

    /// Pick the account a line posts against from the sign of its amount
    ///
    /// Money in (including zero) goes to the receivable account, money out
    /// to the payable account. Backends with their own accounting rules can
    /// override this.
    fn counterpart_account(
        &self,
        amount: &BigDecimal,
        accounts: &DefaultAccounts,
    ) -> Option<String> {
        if *amount >= BigDecimal::from(0) {
            accounts.receivable.clone()
        } else {
            accounts.payable.clone()
        }
    }
}

/// Format-specific reader for bank statement files
pub trait StatementParser: Send + Sync {
    /// Parse the whole file into ordered raw rows
    fn parse(&mut self, data: &[u8]) -> ImportResult<Vec<RawRow>>;

    /// Field values for the statement line built from one raw row
    fn line_values(&self, row: &RawRow) -> ImportResult<LineValues>;

    /// Aggregate commission of the parsed file, if any
    ///
    /// Only meaningful after [`StatementParser::parse`].
    fn commission(&self) -> Option<BigDecimal>;
}

/// Post-import completion engine (partner and account matching)
#[async_trait]
pub trait StatementCompleter: Send + Sync {
    /// Complete the lines of a freshly imported statement
    async fn complete_statement(&mut self, statement_id: &str) -> ImportResult<()>;
}

/// Audit log of imports, kept per profile
#[async_trait]
pub trait ImportJournal: Send + Sync {
    /// Append a message to a profile's log
    async fn post_log(&mut self, profile_id: &str, message: &str) -> ImportResult<()>;
}
