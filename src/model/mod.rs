//! Types that represent the core data model: the three staged record shapes, the entities the
//! server creates from them, and the local catalog those entities are merged into.
mod catalog;
mod cell;
pub(crate) mod date;
mod entry;
pub(crate) mod number;
mod product;
mod withdrawal;

pub use catalog::{Catalog, CatalogFile, CatalogProduct, ProductRef, Supplier};
pub use cell::{CellValue, RawRow};
pub use entry::{EntryEntity, EntryRecord};
pub use number::format_price;
pub use product::{ProductEntity, ProductRecord};
pub use withdrawal::{WithdrawalEntity, WithdrawalRecord};

use crate::error::ImportError;
use crate::import::Normalizer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// The three kinds of record that can be bulk-imported.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Inward stock: a purchase or receipt from a supplier.
    Entry,
    /// A catalog item.
    Product,
    /// Outward stock.
    Withdrawal,
}

serde_plain::derive_display_from_serialize!(Kind);
serde_plain::derive_fromstr_from_deserialize!(Kind);

impl Kind {
    /// The plural name used in API paths, payload keys and file names.
    pub fn collection(&self) -> &'static str {
        match self {
            Kind::Entry => "entries",
            Kind::Product => "products",
            Kind::Withdrawal => "withdrawals",
        }
    }

    /// The name shown to warehouse staff.
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Entry => "Entrada",
            Kind::Product => "Producto",
            Kind::Withdrawal => "Salida",
        }
    }
}

/// Describes one field of a record: its wire name, the spreadsheet headers it may be read from
/// (in priority order) and the label shown to staff.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub label: &'static str,
}

/// Something the server created and assigned an id to.
pub trait Entity:
    Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn id(&self) -> i64;
}

/// A strictly-typed record that can be staged and submitted. Implementations supply the
/// kind-specific configuration; the import engine is written once against this trait.
///
/// The `Serialize` implementation is the wire format: camelCase field names, numbers as JSON
/// numbers and timestamps as ISO-8601 strings.
pub trait Record:
    Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// What the server returns when it accepts this record.
    type Entity: Entity;

    const KIND: Kind;

    /// The fields in display order.
    const FIELDS: &'static [Field];

    /// Builds a record from a spreadsheet row. Individual fields never fail; the only error is a
    /// date that cannot be parsed while the fallback policy is `reject`.
    fn from_row(row: &RawRow, normalizer: &Normalizer) -> Result<Self, ImportError>;

    /// The field values, formatted for display, in the order of `FIELDS`.
    fn cells(&self) -> Vec<String>;

    /// The product this record refers to, if any.
    fn product_id(&self) -> Option<i64> {
        None
    }

    /// Inserts `entity`, which the server created from this record, at its place in `catalog`.
    /// Returns `false` when nothing was inserted because an entity with the same id is already
    /// present or its parent product is not in the catalog.
    fn merge_into(&self, entity: &Self::Entity, catalog: &mut Catalog) -> bool;

    /// Whether `name` is one of this record's fields (used to map server errors onto form
    /// fields).
    fn has_field(name: &str) -> bool {
        Self::FIELDS.iter().any(|f| f.name == name)
    }

    /// The label of field `name`, or `name` itself when it is not one of this record's fields.
    fn label(name: &str) -> &str {
        Self::FIELDS
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.label)
            .unwrap_or(name)
    }
}
