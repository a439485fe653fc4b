//! Core types and data structures for statement import

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Raw row as produced by a parser: column name to cell text
pub type RawRow = BTreeMap<String, String>;

/// Field values for one statement line, keyed by field name
pub type LineValues = BTreeMap<String, FieldValue>;

/// Import configuration chosen by an administrator
///
/// A profile selects the parser used for its files and routes the aggregate
/// commission line. Imports read it but never modify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique identifier for the profile
    pub id: String,
    /// Human-readable profile name
    pub name: String,
    /// Parser registry key, e.g. `generic_csvxls_so`
    pub import_type: String,
    /// Run the completion engine on every statement imported with this profile
    #[serde(default)]
    pub launch_import_completion: bool,
    /// Partner set on the commission line
    #[serde(default)]
    pub partner_id: Option<String>,
    /// Account set on the commission line
    #[serde(default)]
    pub commission_account_id: Option<String>,
    /// Analytic account set on the commission line
    #[serde(default)]
    pub commission_analytic_id: Option<String>,
    #[serde(default)]
    pub last_import_date: Option<NaiveDateTime>,
}

impl Profile {
    /// Create a new profile for the given import type
    pub fn new(id: String, name: String, import_type: String) -> Self {
        Self {
            id,
            name,
            import_type,
            launch_import_completion: false,
            partner_id: None,
            commission_account_id: None,
            commission_analytic_id: None,
            last_import_date: None,
        }
    }
}

/// One imported bank statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: String,
    pub profile_id: String,
    pub created_at: NaiveDateTime,
}

impl Statement {
    /// Create an empty statement bound to a profile
    pub fn new(profile_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            profile_id,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Kind of statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    #[default]
    General,
    Customer,
    Supplier,
}

impl FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(LineType::General),
            "customer" => Ok(LineType::Customer),
            "supplier" => Ok(LineType::Supplier),
            other => Err(format!("unknown line type '{}'", other)),
        }
    }
}

/// One money movement within a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    /// Unique identifier for the line
    pub id: String,
    /// Statement the line belongs to
    pub statement_id: String,
    /// Line label
    pub name: String,
    pub date: NaiveDate,
    /// Signed amount; positive is money in
    pub amount: BigDecimal,
    /// Free-text reference
    pub reference: Option<String>,
    pub label: Option<String>,
    pub note: Option<String>,
    pub partner_id: Option<String>,
    /// Counterpart account the line posts against
    pub account_id: Option<String>,
    pub analytic_account_id: Option<String>,
    pub line_type: LineType,
    /// Per-line commission reported by the bank, when the file carries one
    pub commission_amount: Option<BigDecimal>,
    /// Completed lines are skipped by the completion engine
    pub already_completed: bool,
}

impl StatementLine {
    /// Create a new line with only the required values set
    pub fn new(statement_id: String, name: String, date: NaiveDate, amount: BigDecimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            statement_id,
            name,
            date,
            amount,
            reference: None,
            label: None,
            note: None,
            partner_id: None,
            account_id: None,
            analytic_account_id: None,
            line_type: LineType::General,
            commission_amount: None,
            already_completed: false,
        }
    }
}

/// The original imported file, kept next to its statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub statement_id: String,
    /// Display name
    pub name: String,
    /// Stored file name, `<date>.<extension>`
    pub file_name: String,
    pub data: Vec<u8>,
    pub created_at: NaiveDateTime,
}

impl Attachment {
    /// Create the attachment holding an imported statement file
    pub fn statement_file(
        statement_id: String,
        data: Vec<u8>,
        date: NaiveDate,
        file_type: FileType,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            statement_id,
            name: "statement file".to_string(),
            file_name: format!("{}.{}", date.format("%Y-%m-%d"), file_type.extension()),
            data,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Format of an imported file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Xls,
    Xlsx,
}

impl FileType {
    /// File extension used when storing the attachment
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Xls => "xls",
            FileType::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileType {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            "xls" => Ok(FileType::Xls),
            "xlsx" => Ok(FileType::Xlsx),
            other => Err(ImportError::Configuration(format!(
                "unsupported file type '{}'",
                other
            ))),
        }
    }
}

/// Typed value of a single statement line field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Amount(BigDecimal),
    Date(NaiveDate),
    Flag(bool),
}

impl FieldValue {
    /// Name of the value kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Amount(_) => "amount",
            FieldValue::Date(_) => "date",
            FieldValue::Flag(_) => "flag",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Amount(amount) => write!(f, "{}", amount),
            FieldValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            FieldValue::Flag(flag) => write!(f, "{}", flag),
        }
    }
}

/// Default counterpart accounts used when mapping lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAccounts {
    pub receivable: Option<String>,
    pub payable: Option<String>,
}

/// What happened to the post-import completion step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionOutcome {
    /// The profile does not ask for completion
    NotRequested,
    Completed,
    /// Completion failed; the statement is kept as imported
    Failed(String),
}

/// Result of a successful import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub statement_id: String,
    /// Number of parsed rows, not counting the commission line
    pub line_count: usize,
    pub commission_line_id: Option<String>,
    pub attachment_id: String,
    pub completion: CompletionOutcome,
    /// Message appended to the profile's import journal
    pub log_message: String,
}

/// Schema problems detected before a statement is created
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Column {0} you try to import is not present in the bank statement line")]
    UnknownColumn(String),
    #[error("The file contains no statement lines")]
    NoRows,
}

/// Errors that can occur while importing a statement
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("The statement cannot be created: {kind}: {message}")]
    StatementCreation {
        /// Kind of the underlying failure
        kind: &'static str,
        message: String,
        #[source]
        source: Box<ImportError>,
    },
    #[error(
        "Parse error{}: {message}",
        line.map(|l| format!(" at line {}", l)).unwrap_or_default()
    )]
    Parse { line: Option<u64>, message: String },
    #[error("Invalid value '{value}' for field {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Storage error: {0}")]
    Storage(String),
    /// Failure reported by a host's [`crate::StatementCompleter`]
    #[error("Completion error: {0}")]
    Completion(String),
}

impl ImportError {
    /// Name of the error variant, reported as the cause kind when an import is rolled back
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Configuration(_) => "Configuration",
            ImportError::Schema(_) => "Schema",
            ImportError::StatementCreation { .. } => "StatementCreation",
            ImportError::Parse { .. } => "Parse",
            ImportError::InvalidValue { .. } => "InvalidValue",
            ImportError::NotFound { .. } => "NotFound",
            ImportError::Storage(_) => "Storage",
            ImportError::Completion(_) => "Completion",
        }
    }

    /// Wrap a failure that happened while the statement was being built
    pub fn statement_creation(cause: ImportError) -> Self {
        ImportError::StatementCreation {
            kind: cause.kind(),
            message: cause.to_string(),
            source: Box::new(cause),
        }
    }

    pub fn invalid_value(field: &str, value: impl fmt::Display, reason: &str) -> Self {
        ImportError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        ImportError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        ImportError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

/// Render an error and its sources, one per line, at most `limit` entries
pub fn error_chain(error: &(dyn std::error::Error + 'static), limit: usize) -> String {
    let mut lines = Vec::new();
    let mut current = Some(error);
    while let Some(err) = current {
        if lines.len() == limit {
            lines.push("...".to_string());
            break;
        }
        lines.push(err.to_string());
        current = err.source();
    }
    lines.join("\n  caused by: ")
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
