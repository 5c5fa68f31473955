//! The remote inventory API.
//!
//! The import workflow only needs two operations per record kind: create many and create one.
//! They are expressed by the `Remote` trait, which has an HTTP implementation for real servers and
//! an in-memory implementation used in tests and when `WAREHOUSE_SYNC_IN_TEST_MODE` is set.

mod http;
mod test_api;

use crate::import::Staged;
use crate::model::{Catalog, Record};
use crate::{Config, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use http::HttpRemote;
pub use test_api::{Script, TestRemote};

/// The environment variable that switches the app to the in-memory remote.
pub const TEST_MODE_ENV: &str = "WAREHOUSE_SYNC_IN_TEST_MODE";

/// Which `Remote` implementation to use.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Talk to the inventory API over HTTP.
    #[default]
    Http,
    /// Use the in-memory server from `TestRemote`.
    Test,
}

impl Mode {
    /// `Mode::Test` when `WAREHOUSE_SYNC_IN_TEST_MODE` is set to a non-empty value, otherwise
    /// `Mode::Http`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Http,
        }
    }
}

/// The server side of the import workflow, for records of kind `R`.
#[async_trait::async_trait]
pub trait Remote<R: Record>: Send + Sync {
    /// Creates every record of `batch` independently and reports one result per record. An `Err`
    /// means no result list was obtained (transport failure or a server error response).
    async fn create_batch(&self, batch: &[Staged<R>]) -> Result<BatchResponse<R::Entity>>;

    /// Creates a single record.
    async fn create_one(&self, record: &R) -> Result<SingleResponse<R::Entity>>;
}

/// Builds the `Remote` selected by `mode`. In test mode the in-memory server is seeded with the
/// products of the local catalog so that entries and withdrawals can refer to them.
pub async fn remote<R: Record>(config: &Config, mode: Mode) -> Result<Box<dyn Remote<R>>> {
    match mode {
        Mode::Http => Ok(Box::new(HttpRemote::new(config)?)),
        Mode::Test => {
            let catalog = config.catalog_file().read().await?.unwrap_or_default();
            Ok(Box::new(TestRemote::seeded(&catalog)))
        }
    }
}

/// A record as it goes on the wire: its own fields plus the correlation token.
#[derive(Debug, Serialize)]
pub struct WireRecord<'a, R> {
    #[serde(flatten)]
    record: &'a R,
    #[serde(rename = "clientRef")]
    client_ref: Uuid,
}

/// Builds the body of a bulk create request: `{"<collection>": [record + clientRef, ...]}`.
pub fn batch_body<R: Record>(batch: &[Staged<R>]) -> Result<serde_json::Value> {
    let items: Vec<WireRecord<'_, R>> = batch
        .iter()
        .map(|staged| WireRecord {
            record: staged.record(),
            client_ref: staged.token(),
        })
        .collect();
    let mut body = serde_json::Map::new();
    body.insert(
        R::KIND.collection().to_string(),
        serde_json::to_value(items).context("Unable to serialize the batch")?,
    );
    Ok(serde_json::Value::Object(body))
}

/// A validation message from the server about one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            index: None,
            product_id: None,
        }
    }
}

/// The response to a bulk create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse<E> {
    pub results: Vec<WireOutcome<E>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<usize>,
}

/// The result for one record of a bulk create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOutcome<E> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<E>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// The response to a single create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleResponse<E> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<E>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// What happened to one submitted record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<E> {
    Success(E),
    Failure(Vec<FieldError>),
}

/// Reported when the server neither created the record nor said why.
const NO_ENTITY: &str = "El servidor no devolvió el registro creado";

/// A result counts as a success only when it carries an entity and no errors.
fn outcome<E>(entity: Option<E>, errors: Option<Vec<FieldError>>) -> Outcome<E> {
    let errors = errors.unwrap_or_default();
    match entity {
        Some(entity) if errors.is_empty() => Outcome::Success(entity),
        _ if errors.is_empty() => Outcome::Failure(vec![FieldError::new("", NO_ENTITY)]),
        _ => Outcome::Failure(errors),
    }
}

impl<E> WireOutcome<E> {
    pub fn into_outcome(self) -> Outcome<E> {
        outcome(self.entity, self.errors)
    }
}

impl<E> SingleResponse<E> {
    pub fn into_outcome(self) -> Outcome<E> {
        outcome(self.entity, self.errors)
    }
}

/// Collects every product id of `catalog`.
pub(crate) fn known_products(catalog: &Catalog) -> impl Iterator<Item = i64> + '_ {
    catalog.products.iter().map(|p| p.product.id)
}
