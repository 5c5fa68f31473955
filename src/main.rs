use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use warehouse_sync::args::{Args, Command, InsertSubcommand};
use warehouse_sync::{commands, Config, Mode, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().warehouse_home().path();

    // When WAREHOUSE_SYNC_IN_TEST_MODE is set and non-empty, submissions go to an in-memory
    // server instead of the inventory API.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.api_url()).await?.print(),

        Command::Stage(stage_args) => {
            let config = Config::load(home).await?;
            commands::stage(config, stage_args.clone()).await?.print()
        }

        Command::Staged(kind_args) => {
            let config = Config::load(home).await?;
            commands::staged(config, kind_args.clone()).await?.print()
        }

        Command::Unstage(unstage_args) => {
            let config = Config::load(home).await?;
            commands::unstage(config, unstage_args.clone())
                .await?
                .print()
        }

        Command::Clear(kind_args) => {
            let config = Config::load(home).await?;
            commands::clear(config, kind_args.clone()).await?.print()
        }

        Command::Submit(kind_args) => {
            let config = Config::load(home).await?;
            commands::submit(config, mode, kind_args.clone())
                .await?
                .print()
        }

        Command::Unlock(kind_args) => {
            let config = Config::load(home).await?;
            commands::unlock(config, kind_args.clone()).await?.print()
        }

        Command::Insert(insert_args) => {
            let config = Config::load(home).await?;
            match insert_args.entity() {
                InsertSubcommand::Entry(args) => {
                    commands::insert_entry(config, mode, args.clone())
                        .await?
                        .print()
                }
                InsertSubcommand::Product(args) => {
                    commands::insert_product(config, mode, args.clone())
                        .await?
                        .print()
                }
                InsertSubcommand::Withdrawal(args) => {
                    commands::insert_withdrawal(config, mode, args.clone())
                        .await?
                        .print()
                }
            }
        }

        Command::Catalog => commands::catalog(Config::load(home).await?).await?.print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
