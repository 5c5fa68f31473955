//! Implements the `Remote` trait with an in-memory server for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without an inventory server.
//!
//! The server works on the JSON the client would send over HTTP, so the wire format is exercised
//! too. It applies the same row-independent validation as the real API and assigns increasing
//! ids to what it creates.

use crate::api::{
    batch_body, known_products, BatchResponse, FieldError, Remote, SingleResponse, WireOutcome,
};
use crate::import::Staged;
use crate::model::{Catalog, Kind, Record};
use crate::Result;
use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

/// How the in-memory server answers requests.
#[derive(Debug, Clone, Default)]
pub enum Script {
    /// Validate and create records.
    #[default]
    Serve,
    /// Fail every request as if the server could not be reached.
    Unreachable,
    /// Answer every request with this JSON body, whatever was sent.
    Respond(Value),
}

#[derive(Debug)]
struct State {
    next_id: i64,
    products: BTreeSet<i64>,
    script: Script,
    echo_client_ref: bool,
    requests: usize,
    gate: Option<Arc<Notify>>,
}

/// An in-memory implementation of the inventory API. Clones share the same server state.
#[derive(Debug, Clone)]
pub struct TestRemote {
    state: Arc<Mutex<State>>,
}

impl Default for TestRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRemote {
    /// A server with no products.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: 1,
                products: BTreeSet::new(),
                script: Script::Serve,
                echo_client_ref: true,
                requests: 0,
                gate: None,
            })),
        }
    }

    /// A server that knows `products` and assigns ids above them.
    pub fn with_products(products: impl IntoIterator<Item = i64>) -> Self {
        let remote = Self::new();
        {
            let mut state = remote.lock();
            state.products.extend(products);
            state.next_id = state.products.iter().max().copied().unwrap_or(0) + 1;
        }
        remote
    }

    /// A server that knows the products of `catalog` and assigns ids above every id in it.
    pub fn seeded(catalog: &Catalog) -> Self {
        let remote = Self::with_products(known_products(catalog));
        let highest = catalog
            .products
            .iter()
            .flat_map(|p| {
                p.entries
                    .iter()
                    .map(|e| e.id)
                    .chain(p.withdrawals.iter().map(|w| w.id))
            })
            .max()
            .unwrap_or(0);
        {
            let mut state = remote.lock();
            state.next_id = state.next_id.max(highest + 1);
        }
        remote
    }

    pub fn set_script(&self, script: Script) {
        self.lock().script = script;
    }

    /// Whether bulk results carry the `clientRef` of the record they belong to.
    pub fn set_echo_client_ref(&self, echo: bool) {
        self.lock().echo_client_ref = echo;
    }

    /// Makes every following request wait until the returned `Notify` is notified once per
    /// request.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().gate = Some(gate.clone());
        gate
    }

    /// The number of requests received so far.
    pub fn requests(&self) -> usize {
        self.lock().requests
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the request, waits on the gate if one is set and returns the script to follow.
    async fn receive(&self) -> Script {
        let (gate, script) = {
            let mut state = self.lock();
            state.requests += 1;
            (state.gate.clone(), state.script.clone())
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        script
    }
}

#[async_trait::async_trait]
impl<R: Record> Remote<R> for TestRemote {
    async fn create_batch(&self, batch: &[Staged<R>]) -> Result<BatchResponse<R::Entity>> {
        match self.receive().await {
            Script::Unreachable => bail!("Connection refused"),
            Script::Respond(body) => {
                serde_json::from_value(body).context("Unable to parse the scripted response")
            }
            Script::Serve => {
                let body = batch_body(batch)?;
                let items = body
                    .get(R::KIND.collection())
                    .and_then(Value::as_array)
                    .cloned()
                    .with_context(|| format!("The body has no '{}'", R::KIND.collection()))?;

                let mut state = self.lock();
                let mut results = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let client_ref = item
                        .get("clientRef")
                        .and_then(Value::as_str)
                        .and_then(|s| Uuid::parse_str(s).ok());
                    let (entity, errors) = state.create::<R>(item, Some(index))?;
                    results.push(WireOutcome {
                        client_ref: client_ref.filter(|_| state.echo_client_ref),
                        entity,
                        errors,
                    });
                }
                let success_count = results.iter().filter(|r| r.entity.is_some()).count();
                debug!(
                    "In-memory server created {success_count} of {} {}",
                    results.len(),
                    R::KIND.collection()
                );
                Ok(BatchResponse {
                    total: Some(results.len()),
                    success_count: Some(success_count),
                    error_count: Some(results.len() - success_count),
                    results,
                })
            }
        }
    }

    async fn create_one(&self, record: &R) -> Result<SingleResponse<R::Entity>> {
        match self.receive().await {
            Script::Unreachable => bail!("Connection refused"),
            Script::Respond(body) => {
                serde_json::from_value(body).context("Unable to parse the scripted response")
            }
            Script::Serve => {
                let item = serde_json::to_value(record).context("Unable to serialize record")?;
                let (entity, errors) = self.lock().create::<R>(item, None)?;
                Ok(SingleResponse { entity, errors })
            }
        }
    }
}

type Created<E> = (Option<E>, Option<Vec<FieldError>>);

impl State {
    /// Validates one record and, if it is valid, creates its entity.
    fn create<R: Record>(&mut self, item: Value, index: Option<usize>) -> Result<Created<R::Entity>> {
        let mut fields = match item {
            Value::Object(fields) => fields,
            other => bail!("Expected a JSON object, got {other}"),
        };
        fields.remove("clientRef");

        let errors = self.validate(&fields, index);
        if !errors.is_empty() {
            return Ok((None, Some(errors)));
        }

        let id = self.next_id;
        self.next_id += 1;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        fields.insert("id".to_string(), json!(id));
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));
        match R::KIND {
            Kind::Product => {
                self.products.insert(id);
            }
            Kind::Entry => {
                let product_id = fields.get("productId").cloned().unwrap_or(Value::Null);
                let ruc = fields.get("ruc").cloned().unwrap_or(Value::Null);
                let name = format!("Proveedor {}", ruc.as_str().unwrap_or_default());
                fields.insert("product".to_string(), json!({ "id": product_id }));
                fields.insert(
                    "supplier".to_string(),
                    json!({ "id": 1, "name": name, "ruc": ruc }),
                );
            }
            Kind::Withdrawal => {}
        }

        let entity = serde_json::from_value(Value::Object(fields))
            .with_context(|| format!("Unable to build the created {}", R::KIND))?;
        Ok((Some(entity), None))
    }

    fn validate(&self, fields: &Map<String, Value>, index: Option<usize>) -> Vec<FieldError> {
        let product_id = fields.get("productId").and_then(Value::as_i64);
        let mut errors = Vec::new();
        let mut fail = |field: &str, message: String| {
            errors.push(FieldError {
                field: field.to_string(),
                message,
                index,
                product_id: product_id.filter(|id| *id > 0),
            })
        };

        if let Some(title) = fields.get("title") {
            if title.as_str().unwrap_or_default().trim().is_empty() {
                fail("title", "El título es obligatorio".to_string());
            }
        }
        if fields.contains_key("productId") {
            match product_id {
                Some(id) if id > 0 && self.products.contains(&id) => {}
                Some(id) if id > 0 => fail("productId", format!("El producto {id} no existe")),
                _ => fail("productId", "El producto es obligatorio".to_string()),
            }
        }
        if let Some(quantity) = fields.get("quantity") {
            if quantity.as_f64().unwrap_or_default() <= 0.0 {
                fail("quantity", "La cantidad debe ser mayor a 0".to_string());
            }
        }
        if let Some(price) = fields.get("price") {
            if price.as_f64().unwrap_or(-1.0) < 0.0 {
                fail("price", "El precio no puede ser negativo".to_string());
            }
        }
        if let Some(ruc) = fields.get("ruc") {
            let ruc = ruc.as_str().unwrap_or_default();
            if ruc.len() != 11 || !ruc.chars().all(|c| c.is_ascii_digit()) {
                fail("ruc", "El RUC debe tener 11 dígitos".to_string());
            }
        }
        errors
    }
}
