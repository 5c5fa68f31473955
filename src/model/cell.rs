//! Loosely-typed spreadsheet rows as they come out of a workbook or CSV file.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The value of a single spreadsheet cell before any coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Int(i64),
    Number(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDateTime),
}

impl CellValue {
    /// Empty cells and cells holding only whitespace count as absent.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Int(i) => write!(f, "{i}"),
            // `Display` for f64 drops a trailing `.0`, so 20100070970.0 prints as 20100070970
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Date(d) => {
                if d.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", d.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S"))
                }
            }
        }
    }
}

/// One data row of the first sheet, keyed by header. Header lookups ignore case, accents,
/// spaces, underscores and punctuation so that `Producto ID`, `productoId` and `producto_id` all
/// address the same column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// The 1-based row number in the sheet, where the header row is row 1.
    line: usize,
    cells: BTreeMap<String, CellValue>,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            cells: BTreeMap::new(),
        }
    }

    /// Adds a cell under `header`. If two headers normalize to the same key, the first one wins.
    pub fn insert(&mut self, header: &str, value: CellValue) {
        let key = header_key(header);
        if key.is_empty() {
            return;
        }
        self.cells.entry(key).or_insert(value);
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.get(&header_key(header))
    }

    /// Returns the first alias whose cell is present and non-empty, along with the cell.
    pub fn first_present<'a>(
        &self,
        aliases: &'a [&'a str],
    ) -> Option<(&'a str, &CellValue)> {
        aliases.iter().find_map(|alias| {
            self.get(alias)
                .filter(|cell| !cell.is_empty())
                .map(|cell| (*alias, cell))
        })
    }

    /// True when every cell in the row is empty.
    pub fn is_blank(&self) -> bool {
        self.cells.values().all(CellValue::is_empty)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Reduces a header to lowercase ascii alphanumerics, folding the accented vowels and `ñ` used in
/// Spanish headers.
pub(crate) fn header_key(header: impl AsRef<str>) -> String {
    header
        .as_ref()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .filter(char::is_ascii_alphanumeric)
        .collect()
}
