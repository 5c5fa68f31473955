//! Submits one record typed in by hand, without going through the staging store.

use crate::api::{FieldError, Outcome, Remote};
use crate::error::ImportError;
use crate::model::{Catalog, Record};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Server errors mapped onto the fields of the manual entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    /// The first message for each form field, by field name.
    pub fields: BTreeMap<String, String>,
    /// Messages that do not belong to any field of the form, joined into one line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl FormErrors {
    /// Sorts `errors` into field messages and the form-level banner. Only the first message for a
    /// field is kept.
    pub fn from_errors<R: Record>(errors: Vec<FieldError>) -> Self {
        let mut fields = BTreeMap::new();
        let mut other = Vec::new();
        for e in errors {
            if R::has_field(&e.field) {
                fields.entry(e.field).or_insert(e.message);
            } else {
                other.push(e.message);
            }
        }
        Self {
            fields,
            banner: (!other.is_empty()).then(|| other.join(" ")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.banner.is_none()
    }
}

/// The result of a manual submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SingleOutcome<E> {
    Created(E),
    Rejected(FormErrors),
}

/// Sends `record` to the server. When it is created and a `catalog` is given, the new entity is
/// inserted into it unless an entity with the same id is already there.
///
/// # Errors
/// `ConnectionFailed` when the server could not be reached or did not answer with a result.
pub async fn submit_one<R: Record>(
    remote: &dyn Remote<R>,
    record: &R,
    catalog: Option<&mut Catalog>,
) -> Result<SingleOutcome<R::Entity>, ImportError> {
    let response = remote.create_one(record).await.map_err(|e| {
        warn!("Unable to create {}: {e:#}", R::KIND);
        ImportError::ConnectionFailed(e)
    })?;

    match response.into_outcome() {
        Outcome::Success(entity) => {
            if let Some(catalog) = catalog {
                let merged = record.merge_into(&entity, catalog);
                debug!("Merged new {} into the catalog: {merged}", R::KIND);
            }
            Ok(SingleOutcome::Created(entity))
        }
        Outcome::Failure(errors) => Ok(SingleOutcome::Rejected(FormErrors::from_errors::<R>(
            errors,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Script, TestRemote};
    use crate::model::{EntryRecord, ProductEntity, ProductRecord};
    use serde_json::json;

    fn product(title: &str) -> ProductRecord {
        ProductRecord {
            title: title.to_string(),
            description: "Bolsa de 42.5 kg".to_string(),
            unit_of_measurement: "BOL".to_string(),
            material_type: "Construcción".to_string(),
        }
    }

    #[tokio::test]
    async fn test_created_product_is_merged_once() {
        let remote = TestRemote::new();
        let mut catalog = Catalog::default();
        let outcome =
            submit_one::<ProductRecord>(&remote, &product("Cemento"), Some(&mut catalog))
                .await
                .unwrap();
        let SingleOutcome::Created(entity) = outcome else {
            panic!("expected the product to be created");
        };
        assert_eq!(entity.id, 1);
        assert_eq!(entity.description.as_deref(), Some("Bolsa de 42.5 kg"));
        assert_eq!(catalog.products.len(), 1);

        // The same entity arriving again does not duplicate it.
        assert!(!product("Cemento").merge_into(&entity, &mut catalog));
        assert_eq!(catalog.products.len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_maps_errors_to_fields() {
        let remote = TestRemote::new();
        remote.set_script(Script::Respond(json!({
            "errors": [
                {"field": "title", "message": "El título es obligatorio"},
                {"field": "title", "message": "El título es muy corto"},
                {"field": "", "message": "Producto duplicado."},
                {"field": "sku", "message": "Código inválido."}
            ]
        })));
        let outcome: SingleOutcome<ProductEntity> =
            submit_one::<ProductRecord>(&remote, &product(""), None)
                .await
                .unwrap();
        let SingleOutcome::Rejected(errors) = outcome else {
            panic!("expected a rejection");
        };
        assert_eq!(errors.fields.len(), 1);
        assert_eq!(errors.fields["title"], "El título es obligatorio");
        assert_eq!(
            errors.banner.as_deref(),
            Some("Producto duplicado. Código inválido.")
        );
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let remote = TestRemote::with_products([1]);
        let entry: EntryRecord = serde_json::from_value(json!({
            "productId": 2,
            "ruc": "20100070970",
            "quantity": 1,
            "price": 3.5,
            "startTime": "2024-05-01T00:00:00.000Z"
        }))
        .unwrap();
        let outcome = submit_one::<EntryRecord>(&remote, &entry, None).await.unwrap();
        let SingleOutcome::Rejected(errors) = outcome else {
            panic!("expected a rejection");
        };
        assert_eq!(errors.fields["productId"], "El producto 2 no existe");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let remote = TestRemote::new();
        remote.set_script(Script::Unreachable);
        let err = submit_one::<ProductRecord>(&remote, &product("Cemento"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::ConnectionFailed(_)));
    }
}
