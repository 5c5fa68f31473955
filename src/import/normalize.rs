//! Turns loosely-typed spreadsheet rows into strictly-typed records.
//!
//! Coercion is forgiving: a number that cannot be read becomes 0 and a missing string becomes
//! empty, so that every row produces a record the user can review before submitting. Only dates
//! can fail a row, and only when the fallback policy is `Reject`.

use crate::error::ImportError;
use crate::model::date::parse_date_text;
use crate::model::number::{decimal_from_f64, integer_from_f64, parse_decimal, parse_integer};
use crate::model::{CellValue, Field, RawRow, Record};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to do with a date cell that is missing or cannot be parsed.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DateFallback {
    /// Use the current time. The row is accepted and the user can correct the date later.
    #[default]
    Now,
    /// Fail the upload with `ImportError::InvalidDate`.
    Reject,
}

serde_plain::derive_display_from_serialize!(DateFallback);
serde_plain::derive_fromstr_from_deserialize!(DateFallback);

/// Applies the coercion rules for each field type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    fallback: DateFallback,
}

impl Normalizer {
    pub fn new(fallback: DateFallback) -> Self {
        Self { fallback }
    }

    /// Reads an integer. Fractions are truncated; anything unreadable is 0. Negative values are
    /// kept for the server to judge.
    pub fn integer(&self, row: &RawRow, field: &Field) -> i64 {
        let value = match row.first_present(field.aliases) {
            None => None,
            Some((_, cell)) => match cell {
                CellValue::Int(i) => Some(*i),
                CellValue::Number(f) => integer_from_f64(*f),
                CellValue::Text(s) => parse_integer(s),
                CellValue::Empty | CellValue::Bool(_) | CellValue::Date(_) => None,
            },
        };
        value.unwrap_or_else(|| {
            debug!("Line {}: no integer in {}, using 0", row.line(), field.name);
            0
        })
    }

    /// Reads a decimal. Anything unreadable is 0.
    pub fn decimal(&self, row: &RawRow, field: &Field) -> Decimal {
        let value = match row.first_present(field.aliases) {
            None => None,
            Some((_, cell)) => match cell {
                CellValue::Int(i) => Some(Decimal::from(*i)),
                CellValue::Number(f) => decimal_from_f64(*f),
                CellValue::Text(s) => parse_decimal(s),
                CellValue::Empty | CellValue::Bool(_) | CellValue::Date(_) => None,
            },
        };
        value.unwrap_or_else(|| {
            debug!("Line {}: no number in {}, using 0", row.line(), field.name);
            Decimal::ZERO
        })
    }

    /// Reads any cell as text. Missing cells are an empty string.
    pub fn text(&self, row: &RawRow, field: &Field) -> String {
        row.first_present(field.aliases)
            .map(|(_, cell)| cell.to_string())
            .unwrap_or_default()
    }

    /// Reads a date. Calendar dates are taken as midnight UTC.
    pub fn date(&self, row: &RawRow, field: &Field) -> Result<DateTime<Utc>, ImportError> {
        let found = row.first_present(field.aliases);
        let parsed = match found {
            None => None,
            Some((_, CellValue::Date(d))) => Some(d.and_utc()),
            Some((_, CellValue::Text(s))) => parse_date_text(s),
            Some(_) => None,
        };
        if let Some(date) = parsed {
            return Ok(date);
        }

        let (column, value) = match found {
            Some((alias, cell)) => (alias, cell.to_string()),
            None => (field.aliases.first().copied().unwrap_or(field.name), String::new()),
        };
        match self.fallback {
            DateFallback::Now => {
                let now = Utc::now();
                debug!(
                    "Line {}: unable to read '{value}' as a date in column '{column}', using {now}",
                    row.line()
                );
                Ok(now)
            }
            DateFallback::Reject => Err(ImportError::InvalidDate {
                row: row.line(),
                column: column.to_string(),
                value,
            }),
        }
    }
}

/// Normalizes every row into a record of kind `R`, preserving order. Zero rows is an `EmptyFile`
/// error.
pub fn normalize_rows<R: Record>(
    rows: &[RawRow],
    normalizer: &Normalizer,
) -> Result<Vec<R>, ImportError> {
    if rows.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    rows.iter().map(|row| R::from_row(row, normalizer)).collect()
}
