//! Handlers that edit the staging store of one record kind.

use crate::args::{KindArgs, StageArgs, UnstageArgs};
use crate::commands::lock::ensure_not_submitting;
use crate::commands::{load_import, save_import, Out, StagedView};
use crate::import::load_file;
use crate::model::{EntryRecord, Kind, ProductRecord, Record, WithdrawalRecord};
use crate::{Config, Result};
use anyhow::Context;
use std::path::PathBuf;
use tracing::{debug, info};

/// Reads the spreadsheet given in `args` and stages its rows, replacing whatever was staged for
/// that kind along with the results of its last submission.
///
/// # Errors
/// - `UnsupportedFormat`, `UnreadableFile`, `EmptyFile` or `InvalidDate` when the file cannot be
///   loaded. The staged rows are left as they were.
/// - `AlreadySubmitting` when a submission of the same kind is in flight.
pub async fn stage(config: Config, args: StageArgs) -> Result<Out<StagedView>> {
    match args.kind() {
        Kind::Entry => stage_kind::<EntryRecord>(&config, args.file().to_path_buf()).await,
        Kind::Product => stage_kind::<ProductRecord>(&config, args.file().to_path_buf()).await,
        Kind::Withdrawal => {
            stage_kind::<WithdrawalRecord>(&config, args.file().to_path_buf()).await
        }
    }
}

/// Shows the staged rows of a kind, their errors from the last submission and its banner.
pub async fn staged(config: Config, args: KindArgs) -> Result<Out<StagedView>> {
    match args.kind() {
        Kind::Entry => show::<EntryRecord>(&config).await,
        Kind::Product => show::<ProductRecord>(&config).await,
        Kind::Withdrawal => show::<WithdrawalRecord>(&config).await,
    }
}

/// Removes the staged row at `args.index()`. An index past the end leaves the rows unchanged.
pub async fn unstage(config: Config, args: UnstageArgs) -> Result<Out<StagedView>> {
    match args.kind() {
        Kind::Entry => unstage_kind::<EntryRecord>(&config, args.index()).await,
        Kind::Product => unstage_kind::<ProductRecord>(&config, args.index()).await,
        Kind::Withdrawal => unstage_kind::<WithdrawalRecord>(&config, args.index()).await,
    }
}

/// Removes every staged row of a kind and forgets its last submission.
pub async fn clear(config: Config, args: KindArgs) -> Result<Out<StagedView>> {
    match args.kind() {
        Kind::Entry => clear_kind::<EntryRecord>(&config).await,
        Kind::Product => clear_kind::<ProductRecord>(&config).await,
        Kind::Withdrawal => clear_kind::<WithdrawalRecord>(&config).await,
    }
}

async fn stage_kind<R: Record>(config: &Config, file: PathBuf) -> Result<Out<StagedView>> {
    ensure_not_submitting(config, R::KIND).await?;
    let normalizer = config.normalizer();
    let records = tokio::task::spawn_blocking(move || load_file::<R>(&file, &normalizer))
        .await
        .context("The spreadsheet reader stopped unexpectedly")??;

    let import = load_import::<R>(config).await?;
    let count = records.len();
    import.replace_all(records);
    save_import(config, &import).await?;
    info!("Staged {count} {}", R::KIND.collection());

    let view = StagedView::new(&import);
    let message = format!(
        "{count} registro(s) de tipo {} cargados\n{}",
        R::KIND.label(),
        view.render::<R>()
    );
    Ok(Out::new(message, view))
}

async fn show<R: Record>(config: &Config) -> Result<Out<StagedView>> {
    let import = load_import::<R>(config).await?;
    let view = StagedView::new(&import);
    if import.is_empty() && view.status.banner().is_none() {
        return Ok(Out::new(
            format!("No hay registros de tipo {} en espera", R::KIND.label()),
            view,
        ));
    }
    Ok(Out::new(view.render::<R>(), view))
}

async fn unstage_kind<R: Record>(config: &Config, index: usize) -> Result<Out<StagedView>> {
    ensure_not_submitting(config, R::KIND).await?;
    let import = load_import::<R>(config).await?;
    let removed = import.remove_at(index);
    let message = match removed {
        Some(_) => {
            save_import(config, &import).await?;
            format!("Registro {index} eliminado")
        }
        None => {
            debug!("No staged {} at index {index}", R::KIND);
            format!("No existe el registro {index}")
        }
    };
    let view = StagedView::new(&import);
    Ok(Out::new(format!("{message}\n{}", view.render::<R>()), view))
}

async fn clear_kind<R: Record>(config: &Config) -> Result<Out<StagedView>> {
    ensure_not_submitting(config, R::KIND).await?;
    let import = load_import::<R>(config).await?;
    let count = import.len();
    import.clear();
    save_import(config, &import).await?;
    Ok(Out::new(
        format!("{count} registro(s) de tipo {} descartados", R::KIND.label()),
        StagedView::new(&import),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::test::{write_withdrawals_workbook, TestEnv};
    use std::time::Duration;

    const PRODUCTS_CSV: &str = "titulo,descripcion,um,tipomaterial\n\
        Cemento,Bolsa de 42.5 kg,BOL,Construcción\n\
        ,,,\n\
        Arena fina,,M3,Agregados\n\
        Fierro 1/2,,UND,Acero\n";

    #[tokio::test]
    async fn test_stage_replaces_previous_upload() {
        let env = TestEnv::new().await;
        let file = env.write_file("productos.csv", PRODUCTS_CSV);
        let out = stage(env.config(), StageArgs::new(Kind::Product, &file))
            .await
            .unwrap();
        let view = out.structure().unwrap();
        assert_eq!(view.rows.len(), 3);
        assert_eq!(view.rows[1].cells[0], "Arena fina");
        assert_eq!(view.status.pending, 3);

        let file = env.write_file("otro.csv", "titulo,um\nYeso,BOL\n");
        stage(env.config(), StageArgs::new(Kind::Product, &file))
            .await
            .unwrap();
        let out = staged(env.config(), KindArgs::new(Kind::Product))
            .await
            .unwrap();
        let view = out.structure().unwrap();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].cells[0], "Yeso");
    }

    #[tokio::test]
    async fn test_stage_failure_keeps_staged_rows() {
        let env = TestEnv::new().await;
        let file = env.write_file("productos.csv", PRODUCTS_CSV);
        stage(env.config(), StageArgs::new(Kind::Product, &file))
            .await
            .unwrap();

        let empty = env.write_file("vacio.csv", "titulo,um\n");
        let err = stage(env.config(), StageArgs::new(Kind::Product, &empty))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::EmptyFile)
        ));

        let txt = env.write_file("notas.txt", "titulo\nCemento\n");
        let err = stage(env.config(), StageArgs::new(Kind::Product, &txt))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::UnsupportedFormat(_))
        ));

        let out = staged(env.config(), KindArgs::new(Kind::Product))
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().rows.len(), 3);
    }

    #[tokio::test]
    async fn test_staged_nothing() {
        let env = TestEnv::new().await;
        let out = staged(env.config(), KindArgs::new(Kind::Entry))
            .await
            .unwrap();
        assert_eq!(out.message(), "No hay registros de tipo Entrada en espera");
        assert!(out.structure().unwrap().rows.is_empty());
    }

    #[tokio::test]
    async fn test_unstage_and_clear() {
        let env = TestEnv::new().await;
        let file = env.write_file("productos.csv", PRODUCTS_CSV);
        stage(env.config(), StageArgs::new(Kind::Product, &file))
            .await
            .unwrap();

        let out = unstage(env.config(), UnstageArgs::new(Kind::Product, 1))
            .await
            .unwrap();
        let titles: Vec<&str> = out
            .structure()
            .unwrap()
            .rows
            .iter()
            .map(|r| r.cells[0].as_str())
            .collect();
        assert_eq!(titles, vec!["Cemento", "Fierro 1/2"]);

        let out = unstage(env.config(), UnstageArgs::new(Kind::Product, 9))
            .await
            .unwrap();
        assert!(out.message().starts_with("No existe el registro 9"));
        assert_eq!(out.structure().unwrap().rows.len(), 2);

        let out = clear(env.config(), KindArgs::new(Kind::Product))
            .await
            .unwrap();
        assert!(out.structure().unwrap().rows.is_empty());
        let out = staged(env.config(), KindArgs::new(Kind::Product))
            .await
            .unwrap();
        assert!(out.structure().unwrap().rows.is_empty());
    }

    #[tokio::test]
    async fn test_edits_refused_while_submitting() {
        let env = TestEnv::new().await;
        let file = env.write_file("productos.csv", PRODUCTS_CSV);
        stage(env.config(), StageArgs::new(Kind::Product, &file))
            .await
            .unwrap();
        std::fs::write(env.config().lock_path(Kind::Product), "").unwrap();

        let err = clear(env.config(), KindArgs::new(Kind::Product))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::AlreadySubmitting)
        ));

        // other kinds are not affected
        clear(env.config(), KindArgs::new(Kind::Entry)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_lock_does_not_block_edits() {
        let env = TestEnv::new().await;
        let file = env.write_file("productos.csv", PRODUCTS_CSV);
        stage(env.config(), StageArgs::new(Kind::Product, &file))
            .await
            .unwrap();
        env.write_lock(Kind::Product, Duration::from_secs(3600));

        let out = clear(env.config(), KindArgs::new(Kind::Product))
            .await
            .unwrap();
        assert!(out.structure().unwrap().rows.is_empty());
    }

    #[tokio::test]
    async fn test_stage_workbook() {
        let env = TestEnv::new().await;
        let file = env.write_file("salidas.xlsx", "");
        write_withdrawals_workbook(&file);

        let out = stage(env.config(), StageArgs::new(Kind::Withdrawal, &file))
            .await
            .unwrap();
        let view = out.structure().unwrap();
        assert_eq!(view.rows.len(), 3);
        assert_eq!(view.rows[0].cells, vec!["7", "Cemento", "3", "05/03/2024"]);
        assert!(out
            .message()
            .starts_with("3 registro(s) de tipo Salida cargados"));
    }

    #[tokio::test]
    async fn test_rejected_date_keeps_staged_rows() {
        let mut env = TestEnv::new().await;
        let csv = env.write_file(
            "salidas.csv",
            "productoId,titulo,cantidad,fecha\n7,Cemento,1,2024-03-01\n7,Cemento,2,2024-03-02\n",
        );
        stage(env.config(), StageArgs::new(Kind::Withdrawal, &csv))
            .await
            .unwrap();

        env.set_config("date_fallback", "reject".into()).await;
        let workbook = env.write_file("salidas.xlsx", "");
        write_withdrawals_workbook(&workbook);
        let err = stage(env.config(), StageArgs::new(Kind::Withdrawal, &workbook))
            .await
            .unwrap_err();
        match err.downcast_ref::<ImportError>() {
            Some(ImportError::InvalidDate { row, column, value }) => {
                assert_eq!(*row, 4);
                assert_eq!(column, "fecha");
                assert_eq!(value, "mañana");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let out = staged(env.config(), KindArgs::new(Kind::Withdrawal))
            .await
            .unwrap();
        let view = out.structure().unwrap();
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[1].cells[3], "02/03/2024");
    }
}
