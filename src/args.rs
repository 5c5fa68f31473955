//! These structs provide the CLI interface for the warehouse CLI.

use crate::model::Kind;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// warehouse: A command-line tool for bulk-loading inventory data.
///
/// Warehouse staff keep products, entries (stock received from suppliers) and withdrawals (stock
/// sent out) in spreadsheets. This program reads those spreadsheets, lets you review the rows it
/// understood, and submits them to the inventory API in one batch. Rows the server rejects stay
/// staged with their errors so you can fix them and submit again.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. Decide what directory you want to store data in
    /// and pass this as --warehouse-home. By default, it will be $HOME/warehouse.
    Init(InitArgs),
    /// Read a spreadsheet and stage its rows, replacing whatever was staged for that kind.
    ///
    /// Only the first sheet is read. Its first row must hold the column names, e.g. productoId,
    /// cantidad, precio, ruc and fecha for entries.
    Stage(StageArgs),
    /// Show the staged rows of a kind along with the result of the last submission.
    Staged(KindArgs),
    /// Remove one staged row by its position.
    Unstage(UnstageArgs),
    /// Remove every staged row of a kind.
    Clear(KindArgs),
    /// Submit every staged row of a kind to the inventory API in one batch.
    Submit(KindArgs),
    /// Remove the submission lock of a kind left behind by an interrupted submission.
    ///
    /// A lock older than the request timeout is taken over on its own; use this when a
    /// submission was interrupted moments ago and you know it is not running.
    Unlock(KindArgs),
    /// Create a single product, entry or withdrawal without staging it.
    Insert(InsertArgs),
    /// Print the local catalog of products with their entries and withdrawals.
    Catalog,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where warehouse data and configuration is held. Defaults to ~/warehouse
    #[arg(long, env = "WAREHOUSE_HOME", default_value_t = default_warehouse_home())]
    warehouse_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, warehouse_home: PathBuf) -> Self {
        Self {
            log_level,
            warehouse_home: warehouse_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn warehouse_home(&self) -> &DisplayPath {
        &self.warehouse_home
    }
}

/// Args for the `warehouse init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of the inventory API, e.g. https://inventario.example.com/api
    #[arg(long)]
    api_url: String,
}

impl InitArgs {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// Args for commands that act on the staged rows of one kind.
#[derive(Debug, Parser, Clone)]
pub struct KindArgs {
    /// The kind of record: entry, product or withdrawal
    #[arg(value_enum)]
    kind: Kind,
}

impl KindArgs {
    pub fn new(kind: Kind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

/// Args for the `warehouse stage` command.
#[derive(Debug, Parser, Clone)]
pub struct StageArgs {
    /// The kind of record the spreadsheet holds: entry, product or withdrawal
    #[arg(value_enum)]
    kind: Kind,

    /// The spreadsheet to read: .xlsx, .xls, .xlsm, .xlsb, .ods or .csv
    #[arg(long, short = 'f')]
    file: PathBuf,
}

impl StageArgs {
    pub fn new(kind: Kind, file: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            file: file.into(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Args for the `warehouse unstage` command.
#[derive(Debug, Parser, Clone)]
pub struct UnstageArgs {
    /// The kind of record: entry, product or withdrawal
    #[arg(value_enum)]
    kind: Kind,

    /// The position of the row to remove, as shown by `warehouse staged`, starting at 0
    #[arg(long)]
    index: usize,
}

impl UnstageArgs {
    pub fn new(kind: Kind, index: usize) -> Self {
        Self { kind, index }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Args for the `warehouse insert` command.
#[derive(Debug, Parser, Clone)]
pub struct InsertArgs {
    #[command(subcommand)]
    entity: InsertSubcommand,
}

impl InsertArgs {
    pub fn new(entity: InsertSubcommand) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &InsertSubcommand {
        &self.entity
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum InsertSubcommand {
    /// Record stock received from a supplier.
    Entry(InsertEntryArgs),
    /// Add a product to the catalog.
    Product(InsertProductArgs),
    /// Record stock sent out.
    Withdrawal(InsertWithdrawalArgs),
}

/// Args for `warehouse insert entry`.
#[derive(Debug, Parser, Clone)]
pub struct InsertEntryArgs {
    /// The id of the product received
    #[arg(long)]
    pub product_id: i64,

    /// The supplier's 11-digit RUC
    #[arg(long)]
    pub ruc: String,

    /// How many units were received
    #[arg(long)]
    pub quantity: Decimal,

    /// The unit price
    #[arg(long)]
    pub price: Decimal,

    /// The date of the entry as yyyy-mm-dd. Defaults to today.
    #[arg(long)]
    pub start_time: Option<NaiveDate>,
}

/// Args for `warehouse insert product`.
#[derive(Debug, Parser, Clone)]
pub struct InsertProductArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// e.g. UND, KG, BOL
    #[arg(long)]
    pub unit_of_measurement: String,

    #[arg(long)]
    pub material_type: String,
}

/// Args for `warehouse insert withdrawal`.
#[derive(Debug, Parser, Clone)]
pub struct InsertWithdrawalArgs {
    /// The id of the product sent out
    #[arg(long)]
    pub product_id: i64,

    /// What the withdrawal is for, e.g. the site or work order
    #[arg(long)]
    pub title: String,

    /// How many units were sent out
    #[arg(long)]
    pub quantity: Decimal,

    /// The date of the withdrawal as yyyy-mm-dd. Defaults to today.
    #[arg(long)]
    pub end_time: Option<NaiveDate>,
}

fn default_warehouse_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("warehouse"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --warehouse-home or WAREHOUSE_HOME instead of relying on the \
                default warehouse home directory. If you continue using the program right now, \
                you may have problems!",
            );
            PathBuf::from("warehouse")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage() {
        let args = Args::try_parse_from([
            "warehouse",
            "--warehouse-home",
            "/tmp/w",
            "stage",
            "withdrawal",
            "--file",
            "salidas.xlsx",
        ])
        .unwrap();
        assert_eq!(args.common().warehouse_home().path(), Path::new("/tmp/w"));
        match args.command() {
            Command::Stage(stage) => {
                assert_eq!(stage.kind(), Kind::Withdrawal);
                assert_eq!(stage.file(), Path::new("salidas.xlsx"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_insert_entry() {
        let args = Args::try_parse_from([
            "warehouse",
            "--log-level",
            "debug",
            "insert",
            "entry",
            "--product-id",
            "7",
            "--ruc",
            "20100070970",
            "--quantity",
            "3",
            "--price",
            "12.50",
            "--start-time",
            "2024-03-05",
        ])
        .unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        let Command::Insert(insert) = args.command() else {
            panic!("expected insert");
        };
        let InsertSubcommand::Entry(entry) = insert.entity() else {
            panic!("expected entry");
        };
        assert_eq!(entry.price, Decimal::new(1250, 2));
        assert_eq!(entry.start_time, NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Args::try_parse_from(["warehouse", "submit", "supplier"]).is_err());
    }

    #[test]
    fn test_parse_unlock() {
        let args = Args::try_parse_from(["warehouse", "unlock", "entry"]).unwrap();
        let Command::Unlock(kind_args) = args.command() else {
            panic!("expected unlock");
        };
        assert_eq!(kind_args.kind(), Kind::Entry);
    }
}
