//! Command handlers for the warehouse CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod catalog;
mod init;
mod insert;
mod lock;
mod stage;
mod submit;

use crate::import::{BatchStatus, BulkImport, RowError, Session};
use crate::model::{Kind, Record};
use crate::{utils, Config, Result};
use serde::Serialize;
use std::fmt::{Debug, Write};
use tracing::{debug, info};

pub use catalog::{catalog, ProductSummary};
pub use init::init;
pub use insert::{insert_entry, insert_product, insert_withdrawal};
pub use lock::unlock;
pub use stage::{clear, stage, staged, unstage};
pub use submit::{submit, SubmitSummary};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// The staged rows of one kind as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct StagedView {
    pub kind: Kind,
    pub columns: Vec<&'static str>,
    pub rows: Vec<StagedRow>,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StagedRow {
    pub index: usize,
    pub cells: Vec<String>,
    pub errors: Vec<RowError>,
}

impl StagedView {
    fn new<R: Record>(import: &BulkImport<R>) -> Self {
        let status = import.status();
        let rows = import
            .records()
            .iter()
            .enumerate()
            .map(|(index, record)| StagedRow {
                index,
                cells: record.cells(),
                errors: status
                    .errors
                    .iter()
                    .filter(|e| e.index == index)
                    .cloned()
                    .collect(),
            })
            .collect();
        Self {
            kind: R::KIND,
            columns: R::FIELDS.iter().map(|f| f.label).collect(),
            rows,
            status,
        }
    }

    /// Renders the rows as a plain-text table followed by their errors and the status banner.
    fn render<R: Record>(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#\t{}", self.columns.join("\t"));
        for row in &self.rows {
            let _ = writeln!(out, "{}\t{}", row.index, row.cells.join("\t"));
            for e in &row.errors {
                let _ = writeln!(out, "\t{}: {}", R::label(&e.field), e.message);
            }
        }
        if let Some(banner) = self.status.banner() {
            let _ = writeln!(out, "{banner}");
        }
        let _ = write!(
            out,
            "{} registro(s) en espera, {} con errores",
            self.status.pending,
            self.rows.iter().filter(|r| !r.errors.is_empty()).count()
        );
        out
    }
}

/// Restores the staged rows of kind `R` saved by a previous command. Nothing saved means nothing
/// staged.
async fn load_import<R: Record>(config: &Config) -> Result<BulkImport<R>> {
    let path = config.staging_path(R::KIND);
    if !path.is_file() {
        return Ok(BulkImport::default());
    }
    let session: Session<R> = utils::deserialize(&path).await?;
    Ok(BulkImport::new(session))
}

async fn save_import<R: Record>(config: &Config, import: &BulkImport<R>) -> Result<()> {
    utils::serialize(&config.staging_path(R::KIND), &import.session()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductRecord;

    #[test]
    fn test_out_from_message() {
        let out: Out<()> = "hecho".into();
        assert_eq!(out.message(), "hecho");
        assert!(out.structure().is_none());
    }

    #[test]
    fn test_render_staged_view() {
        let import = BulkImport::default();
        import.replace_all(vec![ProductRecord {
            title: "Cemento".to_string(),
            description: String::new(),
            unit_of_measurement: "BOL".to_string(),
            material_type: "Construcción".to_string(),
        }]);
        let view = StagedView::new(&import);
        assert_eq!(view.columns[0], "Título");
        let text = view.render::<ProductRecord>();
        assert!(text.contains("0\tCemento\t\tBOL\tConstrucción"));
        assert!(text.ends_with("1 registro(s) en espera, 0 con errores"));
    }
}
