//! Row mapping: parser values to statement lines

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::importer::schema::LineField;
use crate::traits::*;
use crate::types::*;
use crate::utils::conversion;

/// Label used when a row has none
pub const DEFAULT_LINE_NAME: &str = "/";

/// Build the statement line for one parsed row
///
/// `statement_id` and the counterpart account are always set here, whatever
/// the parser produced. The account comes from
/// [`StatementStorage::counterpart_account`] using the sign of the amount.
pub fn map_row<S>(
    values: &LineValues,
    accounts: &DefaultAccounts,
    statement_id: &str,
    storage: &S,
) -> ImportResult<StatementLine>
where
    S: StatementStorage + ?Sized,
{
    let amount = match values.get(LineField::Amount.as_str()) {
        Some(value) => amount_value(LineField::Amount, value)?,
        None => return Err(missing(LineField::Amount)),
    };
    let date = match values.get(LineField::Date.as_str()) {
        Some(value) => date_value(LineField::Date, value)?,
        None => return Err(missing(LineField::Date)),
    };
    let name = match values.get(LineField::Name.as_str()) {
        Some(value) => text_value(LineField::Name, value)?,
        None => None,
    }
    .unwrap_or_else(|| DEFAULT_LINE_NAME.to_string());

    let mut line = StatementLine::new(statement_id.to_string(), name, date, amount);

    for (column, value) in values {
        let field: LineField = column.parse()?;
        match field {
            // Set above, or owned by the importer
            LineField::Name
            | LineField::Date
            | LineField::Amount
            | LineField::StatementId
            | LineField::AccountId => {}
            LineField::Reference => line.reference = text_value(field, value)?,
            LineField::Label => line.label = text_value(field, value)?,
            LineField::Note => line.note = text_value(field, value)?,
            LineField::PartnerId => line.partner_id = text_value(field, value)?,
            LineField::AnalyticAccountId => line.analytic_account_id = text_value(field, value)?,
            LineField::LineType => {
                if let Some(text) = text_value(field, value)? {
                    line.line_type = text.parse().map_err(|reason: String| {
                        ImportError::invalid_value(field.as_str(), &text, &reason)
                    })?;
                }
            }
            LineField::CommissionAmount => {
                line.commission_amount = Some(amount_value(field, value)?)
            }
            LineField::AlreadyCompleted => line.already_completed = flag_value(field, value)?,
        }
    }

    line.account_id = storage.counterpart_account(&line.amount, accounts);

    Ok(line)
}

fn missing(field: LineField) -> ImportError {
    ImportError::invalid_value(field.as_str(), "", "missing required field")
}

fn text_value(field: LineField, value: &FieldValue) -> ImportResult<Option<String>> {
    match value {
        FieldValue::Text(text) if text.trim().is_empty() => Ok(None),
        FieldValue::Text(text) => Ok(Some(text.trim().to_string())),
        other => Err(ImportError::invalid_value(
            field.as_str(),
            other,
            &format!("expected text, got {}", other.kind()),
        )),
    }
}

fn amount_value(field: LineField, value: &FieldValue) -> ImportResult<BigDecimal> {
    match value {
        FieldValue::Amount(amount) => Ok(amount.clone()),
        FieldValue::Text(text) => conversion::parse_amount(text)
            .ok_or_else(|| ImportError::invalid_value(field.as_str(), text, "not an amount")),
        other => Err(ImportError::invalid_value(
            field.as_str(),
            other,
            &format!("expected amount, got {}", other.kind()),
        )),
    }
}

fn date_value(field: LineField, value: &FieldValue) -> ImportResult<NaiveDate> {
    match value {
        FieldValue::Date(date) => Ok(*date),
        FieldValue::Text(text) => conversion::parse_date(text)
            .ok_or_else(|| ImportError::invalid_value(field.as_str(), text, "not a date")),
        other => Err(ImportError::invalid_value(
            field.as_str(),
            other,
            &format!("expected date, got {}", other.kind()),
        )),
    }
}

fn flag_value(field: LineField, value: &FieldValue) -> ImportResult<bool> {
    match value {
        FieldValue::Flag(flag) => Ok(*flag),
        FieldValue::Text(text) => conversion::parse_flag(text)
            .ok_or_else(|| ImportError::invalid_value(field.as_str(), text, "not a boolean")),
        other => Err(ImportError::invalid_value(
            field.as_str(),
            other,
            &format!("expected boolean, got {}", other.kind()),
        )),
    }
}
