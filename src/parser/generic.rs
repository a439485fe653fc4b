//! Generic statement file parser
//!
//! Reads a CSV file (or, with the `xls` feature, the first sheet of an
//! XLS/XLSX workbook) whose header row names statement line fields directly:
//! `ref`, `label`, `date`, `amount`, `commission_amount` and so on. Header
//! names are trimmed and lower-cased. Columns are passed through unchanged,
//! so a column that is not a line field is caught by schema validation.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::importer::mapper::DEFAULT_LINE_NAME;
use crate::traits::*;
use crate::types::*;
use crate::utils::conversion;

const DATE_COLUMN: &str = "date";
const AMOUNT_COLUMNS: [&str; 2] = ["amount", "commission_amount"];

/// Parser for files laid out with one column per line field
#[derive(Debug, Clone)]
pub struct GenericFileParser {
    file_type: FileType,
    commission: Option<BigDecimal>,
    today: NaiveDate,
}

impl GenericFileParser {
    /// Create a parser for the given file type
    pub fn new(file_type: FileType) -> ImportResult<Self> {
        if matches!(file_type, FileType::Xls | FileType::Xlsx) && !cfg!(feature = "xls") {
            return Err(ImportError::Configuration(format!(
                "{} files need the `xls` feature",
                file_type
            )));
        }

        Ok(Self {
            file_type,
            commission: None,
            today: chrono::Utc::now().date_naive(),
        })
    }

    /// Date used for rows without one
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn read_rows(&self, data: &[u8]) -> ImportResult<Vec<RawRow>> {
        match self.file_type {
            FileType::Csv => read_csv(data),
            #[cfg(feature = "xls")]
            FileType::Xls | FileType::Xlsx => read_workbook(data),
            #[cfg(not(feature = "xls"))]
            FileType::Xls | FileType::Xlsx => Err(ImportError::Configuration(format!(
                "{} files need the `xls` feature",
                self.file_type
            ))),
        }
    }
}

impl StatementParser for GenericFileParser {
    fn parse(&mut self, data: &[u8]) -> ImportResult<Vec<RawRow>> {
        let rows = self.read_rows(data)?;

        let mut commission = BigDecimal::from(0);
        for (index, row) in rows.iter().enumerate() {
            let line = index as u64 + 1;
            if let Some(raw) = non_empty(row, DATE_COLUMN) {
                conversion::parse_date(raw).ok_or_else(|| ImportError::Parse {
                    line: Some(line),
                    message: format!("invalid date '{}'", raw),
                })?;
            }
            for column in AMOUNT_COLUMNS {
                if let Some(raw) = non_empty(row, column) {
                    let amount =
                        conversion::parse_amount(raw).ok_or_else(|| ImportError::Parse {
                            line: Some(line),
                            message: format!("invalid {} '{}'", column, raw),
                        })?;
                    if column == "commission_amount" {
                        commission += amount;
                    }
                }
            }
        }

        self.commission = Some(commission);
        tracing::debug!(rows = rows.len(), file_type = %self.file_type, "Parsed statement file");

        Ok(rows)
    }

    fn line_values(&self, row: &RawRow) -> ImportResult<LineValues> {
        let mut values = LineValues::new();

        for (column, raw) in row {
            let converted = column == DATE_COLUMN || AMOUNT_COLUMNS.contains(&column.as_str());
            if converted && raw.trim().is_empty() {
                continue;
            }
            let value = if column == DATE_COLUMN {
                FieldValue::Date(conversion::parse_date(raw).ok_or_else(|| ImportError::Parse {
                    line: None,
                    message: format!("invalid date '{}'", raw),
                })?)
            } else if AMOUNT_COLUMNS.contains(&column.as_str()) {
                FieldValue::Amount(conversion::parse_amount(raw).ok_or_else(|| {
                    ImportError::Parse {
                        line: None,
                        message: format!("invalid {} '{}'", column, raw),
                    }
                })?)
            } else {
                FieldValue::Text(raw.clone())
            };
            values.insert(column.clone(), value);
        }

        let name = non_empty(row, "name")
            .or_else(|| non_empty(row, "label"))
            .or_else(|| non_empty(row, "ref"))
            .unwrap_or(DEFAULT_LINE_NAME)
            .to_string();
        values.insert("name".to_string(), FieldValue::Text(name));
        if non_empty(row, "ref").is_none() {
            values.insert("ref".to_string(), FieldValue::Text(DEFAULT_LINE_NAME.to_string()));
        }
        values
            .entry(DATE_COLUMN.to_string())
            .or_insert(FieldValue::Date(self.today));
        values
            .entry("amount".to_string())
            .or_insert(FieldValue::Amount(BigDecimal::from(0)));

        Ok(values)
    }

    fn commission(&self) -> Option<BigDecimal> {
        self.commission
            .clone()
            .filter(|amount| *amount != BigDecimal::from(0))
    }
}

fn non_empty<'a>(row: &'a RawRow, column: &str) -> Option<&'a str> {
    row.get(column)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn header_name(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

fn read_csv(data: &[u8]) -> ImportResult<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    let headers: Vec<String> = rdr.headers()?.iter().map(header_name).collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let row: RawRow = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(feature = "xls")]
fn read_workbook(data: &[u8]) -> ImportResult<Vec<RawRow>> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto_from_rs(std::io::Cursor::new(data.to_vec()))
        .map_err(|e| ImportError::Parse {
            line: None,
            message: format!("failed to open workbook: {e}"),
        })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Parse {
            line: None,
            message: "workbook has no sheet".to_string(),
        })?
        .map_err(|e| ImportError::Parse {
            line: None,
            message: format!("failed to read sheet: {e}"),
        })?;

    let mut sheet_rows = range.rows();
    let Some(header) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header.iter().map(|cell| header_name(&cell.to_string())).collect();

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let row: RawRow = headers
            .iter()
            .zip(cells.iter())
            .map(|(column, cell)| (column.clone(), cell_text(column, cell)))
            .collect();
        if row.values().all(|value| value.trim().is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(feature = "xls")]
fn cell_text(column: &str, cell: &calamine::Data) -> String {
    use calamine::Data;

    let serial_date = |serial: f64| {
        conversion::excel_serial_to_date(serial)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(value) => serial_date(value.as_f64()),
        Data::Float(value) if column == DATE_COLUMN => serial_date(*value),
        Data::Int(value) if column == DATE_COLUMN => serial_date(*value as f64),
        other => other.to_string(),
    }
}
