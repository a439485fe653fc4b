//! Statement line field set and column validation

use std::fmt;
use std::str::FromStr;

use crate::types::*;

/// Fields a parser may set on a statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineField {
    Name,
    Date,
    Amount,
    Reference,
    Label,
    Note,
    PartnerId,
    AccountId,
    AnalyticAccountId,
    LineType,
    StatementId,
    CommissionAmount,
    AlreadyCompleted,
}

impl LineField {
    pub const ALL: [LineField; 13] = [
        LineField::Name,
        LineField::Date,
        LineField::Amount,
        LineField::Reference,
        LineField::Label,
        LineField::Note,
        LineField::PartnerId,
        LineField::AccountId,
        LineField::AnalyticAccountId,
        LineField::LineType,
        LineField::StatementId,
        LineField::CommissionAmount,
        LineField::AlreadyCompleted,
    ];

    /// Column name used in parser output
    pub fn as_str(&self) -> &'static str {
        match self {
            LineField::Name => "name",
            LineField::Date => "date",
            LineField::Amount => "amount",
            LineField::Reference => "ref",
            LineField::Label => "label",
            LineField::Note => "note",
            LineField::PartnerId => "partner_id",
            LineField::AccountId => "account_id",
            LineField::AnalyticAccountId => "analytic_account_id",
            LineField::LineType => "type",
            LineField::StatementId => "statement_id",
            LineField::CommissionAmount => "commission_amount",
            LineField::AlreadyCompleted => "already_completed",
        }
    }
}

impl fmt::Display for LineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineField {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LineField::ALL
            .iter()
            .find(|field| field.as_str() == s)
            .copied()
            .ok_or_else(|| SchemaError::UnknownColumn(s.to_string()))
    }
}

/// Check that every column name is a known statement line field
pub fn validate_columns<'a, I>(columns: I) -> Result<(), SchemaError>
where
    I: IntoIterator<Item = &'a str>,
{
    for column in columns {
        column.parse::<LineField>()?;
    }
    Ok(())
}

/// Check the field names of every row before anything is created
///
/// An empty file is rejected here rather than producing an empty statement.
pub fn validate_rows(rows: &[LineValues]) -> Result<(), SchemaError> {
    if rows.is_empty() {
        return Err(SchemaError::NoRows);
    }

    for values in rows {
        validate_columns(values.keys().map(String::as_str))?;
    }

    Ok(())
}
