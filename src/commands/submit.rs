//! The `submit` command: sends the staged rows of one kind as a single batch.

use crate::api::{self, Mode};
use crate::args::KindArgs;
use crate::commands::lock::SubmitLock;
use crate::commands::{load_import, save_import, Out, StagedView};
use crate::error::ImportError;
use crate::model::{EntryRecord, Kind, ProductRecord, Record, WithdrawalRecord};
use crate::{Config, Error, Result};
use serde::Serialize;
use tracing::debug;

/// What a submission did, for printing as structured output.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// How many of the created entities were added to the local catalog.
    pub merged: usize,
    /// The rows left staged, with the errors of those that failed.
    pub staged: StagedView,
}

/// Submits every staged row of `args.kind()` in one request. Rows the server creates are removed
/// from the staging store and merged into the local catalog; rows it rejects stay staged with
/// their errors for `warehouse staged` to show.
///
/// # Errors
/// - `AlreadySubmitting` when another submission of the same kind holds the lock.
/// - `NothingToSubmit` when nothing is staged.
/// - `ConnectionFailed` or `MisalignedResults` when the server's answer cannot be used. The rows
///   stay staged and can be submitted again.
///
/// Errors that leave the rows untouched carry a hint on what to run next.
pub async fn submit(config: Config, mode: Mode, args: KindArgs) -> Result<Out<SubmitSummary>> {
    let kind = args.kind();
    let lock = SubmitLock::acquire(&config, kind)
        .await
        .map_err(|e| with_hint(e, kind))?;
    let result = match kind {
        Kind::Entry => submit_kind::<EntryRecord>(&config, mode).await,
        Kind::Product => submit_kind::<ProductRecord>(&config, mode).await,
        Kind::Withdrawal => submit_kind::<WithdrawalRecord>(&config, mode).await,
    };
    drop(lock);
    result.map_err(|e| with_hint(e, kind))
}

fn with_hint(e: Error, kind: Kind) -> Error {
    let hint = match e.downcast_ref::<ImportError>() {
        Some(ImportError::AlreadySubmitting) => format!(
            "Espere a que termine, o ejecute 'warehouse unlock {kind}' si el envío anterior se \
            interrumpió"
        ),
        Some(error) if error.is_retryable() => format!(
            "Los registros siguen en espera. Ejecute 'warehouse submit {kind}' para reintentar"
        ),
        _ => return e,
    };
    e.context(hint)
}

async fn submit_kind<R: Record>(config: &Config, mode: Mode) -> Result<Out<SubmitSummary>> {
    let import = load_import::<R>(config).await?;
    let remote = api::remote::<R>(config, mode).await?;
    let result = import.submit_batch(remote.as_ref()).await;
    save_import(config, &import).await?;
    let report = result?;

    let catalog_file = config.catalog_file();
    let merged = match catalog_file.read().await? {
        Some(mut catalog) => {
            let merged = report.merge_into(&mut catalog);
            catalog_file.write(&catalog).await?;
            merged
        }
        None => {
            debug!("There is no local catalog, skipping merge");
            0
        }
    };

    let staged = StagedView::new(&import);
    let mut message = report.banner().to_string();
    if !report.is_complete() {
        message = format!("{message}\n{}", staged.render::<R>());
    }
    Ok(Out::new(
        message,
        SubmitSummary {
            succeeded: report.succeeded,
            failed: report.failed,
            merged,
            staged,
        },
    ))
}
