//! Reads an uploaded spreadsheet into `RawRow`s.
//!
//! Only the first sheet is read and its first row supplies the headers. The format is chosen from
//! the file extension alone.

use crate::error::ImportError;
use crate::model::{CellValue, RawRow};
use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, trace};

/// The accepted spreadsheet formats.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    /// Chooses the format from the extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(SourceFormat::Workbook),
            _ => Err(ImportError::UnsupportedFormat(format!(".{ext}"))),
        }
    }
}

/// Reads the first sheet of the file at `path`. A sheet without data rows yields an empty `Vec`,
/// which callers report as `ImportError::EmptyFile`.
pub fn parse_file(path: &Path) -> Result<Vec<RawRow>, ImportError> {
    let format = SourceFormat::from_path(path)?;
    debug!("Reading {} as {format:?}", path.display());
    let grid = match format {
        SourceFormat::Csv => read_csv(path),
        SourceFormat::Workbook => read_workbook(path),
    }
    .map_err(|source| ImportError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = rows_from_grid(grid);
    debug!("Read {} data rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Turns a grid of cells into rows keyed by the first row's headers. Blank rows are dropped;
/// cells under an empty header are ignored.
pub(crate) fn rows_from_grid(grid: Vec<Vec<CellValue>>) -> Vec<RawRow> {
    let mut lines = grid.into_iter();
    let headers: Vec<String> = match lines.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string()).collect(),
        None => return Vec::new(),
    };

    let mut rows = Vec::new();
    for (ix, cells) in lines.enumerate() {
        // The header is line 1, so the first data row is line 2.
        let mut row = RawRow::new(ix + 2);
        for (header, cell) in headers.iter().zip(cells) {
            row.insert(header, cell);
        }
        if row.is_blank() {
            trace!("Skipping blank line {}", ix + 2);
            continue;
        }
        rows.push(row);
    }
    rows
}

fn read_csv(path: &Path) -> anyhow::Result<Vec<Vec<CellValue>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Unable to open {}", path.display()))?;

    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result.context("Malformed CSV record")?;
        grid.push(record.iter().map(CellValue::from).collect());
    }
    Ok(grid)
}

fn read_workbook(path: &Path) -> anyhow::Result<Vec<Vec<CellValue>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Unable to open workbook {}", path.display()))?;
    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("The workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&first_sheet)
        .with_context(|| format!("Unable to read sheet '{first_sheet}'"))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect())
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::from(s.as_str()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => CellValue::Date(d),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => CellValue::from(s.as_str()),
        Data::DurationIso(s) => CellValue::from(s.as_str()),
        Data::Error(_) => CellValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::write_withdrawals_workbook;
    use calamine::CellErrorType;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            SourceFormat::from_path(&PathBuf::from("a/b.XLSX")).unwrap(),
            SourceFormat::Workbook
        );
        assert_eq!(
            SourceFormat::from_path(&PathBuf::from("b.csv")).unwrap(),
            SourceFormat::Csv
        );
        let err = SourceFormat::from_path(&PathBuf::from("b.pdf")).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(ext) if ext == ".pdf"));
    }

    #[test]
    fn test_rows_from_grid() {
        let grid = vec![
            vec![text("titulo"), text(""), text("um")],
            vec![text("Cemento"), text("ignored"), text("BOL")],
            vec![text(""), CellValue::Empty, text("")],
            vec![text("Arena")],
        ];
        let rows = rows_from_grid(grid);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line(), 2);
        assert_eq!(rows[0].get("titulo"), Some(&text("Cemento")));
        assert_eq!(rows[0].get("um"), Some(&text("BOL")));
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].line(), 4);
        assert_eq!(rows[1].get("um"), None);
    }

    #[test]
    fn test_empty_grid() {
        assert!(rows_from_grid(Vec::new()).is_empty());
        assert!(rows_from_grid(vec![vec![text("titulo")]]).is_empty());
    }

    #[test]
    fn test_parse_csv_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entradas.csv");
        std::fs::write(
            &path,
            "productoId,cantidad,precio,ruc,fecha\n7,3,12.50,20100070970,05/03/2024\n,,,,\n",
        )
        .unwrap();
        let rows = parse_file(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("precio"), Some(&text("12.50")));
    }

    #[test]
    fn test_parse_workbook_reads_first_sheet_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("salidas.xlsx");
        write_withdrawals_workbook(&path);

        let rows = parse_file(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.get("titulo") != Some(&text("Yeso"))));

        let march_5 = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(rows[0].line(), 2);
        assert_eq!(rows[0].get("fecha"), Some(&CellValue::Date(march_5)));
        assert_eq!(rows[0].get("productoId"), Some(&CellValue::Number(7.0)));
        assert_eq!(rows[1].get("cantidad"), Some(&CellValue::Number(1.5)));
        assert_eq!(rows[1].get("fecha"), Some(&text("06/03/2024")));
        assert_eq!(rows[2].get("fecha"), Some(&text("mañana")));
    }

    #[test]
    fn test_cell_value() {
        assert_eq!(cell_value(&Data::Int(7)), CellValue::Int(7));
        assert_eq!(cell_value(&Data::Float(2.5)), CellValue::Number(2.5));
        assert_eq!(cell_value(&Data::Bool(true)), CellValue::Bool(true));
        assert_eq!(cell_value(&Data::String("BOL".to_string())), text("BOL"));
        assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
        assert_eq!(
            cell_value(&Data::Error(CellErrorType::Div0)),
            CellValue::Empty
        );
    }

    #[test]
    fn test_unreadable_workbook() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        let err = parse_file(&path).unwrap_err();
        assert!(matches!(err, ImportError::UnreadableFile { .. }));
    }
}
