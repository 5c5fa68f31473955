//! The bulk-import workflow: read a spreadsheet, normalize its rows into records, stage them,
//! submit them in one batch and reconcile the staging store with the results. Records can also be
//! submitted one at a time with `submit_one`.

mod normalize;
mod reconcile;
mod single;
mod source;
mod staging;

pub use normalize::{normalize_rows, DateFallback, Normalizer};
pub use reconcile::{Banner, BatchStatus, BulkImport, Pass, RowError, Session, SubmitReport};
pub use single::{submit_one, FormErrors, SingleOutcome};
pub use source::{parse_file, SourceFormat};
pub use staging::{Staged, StagingStore};

use crate::error::ImportError;
use crate::model::Record;
use std::path::Path;
use tracing::debug;

/// Reads the spreadsheet at `path` and normalizes every data row into a record of kind `R`.
pub fn load_file<R: Record>(path: &Path, normalizer: &Normalizer) -> Result<Vec<R>, ImportError> {
    let rows = parse_file(path)?;
    let records = normalize_rows(&rows, normalizer)?;
    debug!(
        "Loaded {} {} from {}",
        records.len(),
        R::KIND.collection(),
        path.display()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::date::midnight_utc;
    use crate::model::{EntryRecord, WithdrawalRecord};
    use crate::test::write_withdrawals_workbook;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn test_load_workbook_with_unreadable_date() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("salidas.xlsx");
        write_withdrawals_workbook(&path);

        let before = Utc::now();
        let records = load_file::<WithdrawalRecord>(&path, &Normalizer::default()).unwrap();
        let after = Utc::now();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].product_id, 7);
        assert_eq!(records[0].title, "Cemento");
        assert_eq!(
            records[0].end_time,
            midnight_utc(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );
        assert_eq!(records[1].quantity, Decimal::from_str("1.5").unwrap());
        assert_eq!(
            records[1].end_time,
            midnight_utc(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
        );
        assert_eq!(records[2].product_id, 8);
        assert!(records[2].end_time >= before && records[2].end_time <= after);
    }

    #[test]
    fn test_load_file_empty_sheet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entradas.csv");
        std::fs::write(&path, "productoId,cantidad,precio,ruc,fecha\n").unwrap();
        let err = load_file::<EntryRecord>(&path, &Normalizer::default()).unwrap_err();
        assert!(matches!(err, ImportError::EmptyFile));
        assert_eq!(err.to_string(), "El archivo no contiene datos válidos");
    }

    #[test]
    fn test_load_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entradas.txt");
        std::fs::write(&path, "hola").unwrap();
        let err = load_file::<EntryRecord>(&path, &Normalizer::default()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}
