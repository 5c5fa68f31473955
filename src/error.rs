//! Error types.
//!
//! Most of the crate returns `anyhow` errors with context attached at I/O boundaries. The import
//! workflow has a closed set of failure modes that callers need to tell apart (for example, to
//! decide whether a retry makes sense), so those are represented by `ImportError`. An
//! `ImportError` can travel through an `anyhow::Error` and be recovered with `downcast_ref`.

use std::path::PathBuf;

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The failure modes of the parse, stage and submit workflow. The messages are shown to warehouse
/// staff as-is.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The file extension is not one of the accepted spreadsheet formats.
    #[error("Formato de archivo no soportado: '{0}' (use .xlsx, .xls o .csv)")]
    UnsupportedFormat(String),

    /// The file could not be decoded as a workbook or CSV document.
    #[error("Error al procesar el archivo {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The file was readable but produced no data rows.
    #[error("El archivo no contiene datos válidos")]
    EmptyFile,

    /// A date cell could not be parsed and the date fallback policy is `reject`.
    #[error("Fecha inválida en la fila {row}, columna '{column}': '{value}'")]
    InvalidDate {
        row: usize,
        column: String,
        value: String,
    },

    /// A submission was requested while the staging store is empty.
    #[error("No hay registros para enviar")]
    NothingToSubmit,

    /// A submission was requested while another one is still in flight.
    #[error("Ya hay un envío en curso")]
    AlreadySubmitting,

    /// The remote call failed without producing a result list.
    #[error("Error en la conexión con el servidor")]
    ConnectionFailed(#[source] anyhow::Error),

    /// The remote returned a result list that cannot be attributed to the submitted records.
    #[error(
        "Error en la conexión con el servidor: se enviaron {expected} registros pero se \
        recibieron {actual} resultados"
    )]
    MisalignedResults { expected: usize, actual: usize },
}

impl ImportError {
    /// Whether resubmitting the unchanged staging store could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ImportError::ConnectionFailed(_)
                | ImportError::MisalignedResults { .. }
                | ImportError::AlreadySubmitting
        )
    }
}
