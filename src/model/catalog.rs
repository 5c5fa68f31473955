//! The local read model: products with their entries and withdrawals, as last known to this
//! client. Created entities are merged in as the server reports them so the catalog does not
//! have to be refetched after every submission.

use crate::model::{Entity, EntryEntity, ProductEntity, WithdrawalEntity};
use crate::{utils, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::trace;

/// The supplier of an entry, resolved by the server from the entry's tax id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub ruc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_count: Option<i64>,
}

/// A reference to a product by id, as nested in other entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: i64,
}

/// A product and the stock movements recorded against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    #[serde(flatten)]
    pub product: ProductEntity,
    #[serde(default)]
    pub entries: Vec<EntryEntity>,
    #[serde(default)]
    pub withdrawals: Vec<WithdrawalEntity>,
}

impl From<ProductEntity> for CatalogProduct {
    fn from(product: ProductEntity) -> Self {
        Self {
            product,
            entries: Vec::new(),
            withdrawals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub products: Vec<CatalogProduct>,
}

impl Catalog {
    pub fn product(&self, id: i64) -> Option<&CatalogProduct> {
        self.products.iter().find(|p| p.product.id == id)
    }

    fn product_mut(&mut self, id: i64) -> Option<&mut CatalogProduct> {
        self.products.iter_mut().find(|p| p.product.id == id)
    }

    /// Appends `product` unless a product with the same id is already present.
    pub fn insert_product(&mut self, product: ProductEntity) -> bool {
        if self.product(product.id).is_some() {
            return false;
        }
        self.products.push(product.into());
        true
    }

    /// Appends `entry` to the entries of product `product_id`. Nothing happens if the product is
    /// unknown or already has an entry with the same id.
    pub fn insert_entry(&mut self, product_id: i64, entry: EntryEntity) -> bool {
        match self.product_mut(product_id) {
            Some(p) => push_unique(&mut p.entries, entry),
            None => {
                trace!("Product {product_id} is not in the catalog, skipping entry merge");
                false
            }
        }
    }

    /// Appends `withdrawal` to the withdrawals of product `product_id`, with the same rules as
    /// `insert_entry`.
    pub fn insert_withdrawal(&mut self, product_id: i64, withdrawal: WithdrawalEntity) -> bool {
        match self.product_mut(product_id) {
            Some(p) => push_unique(&mut p.withdrawals, withdrawal),
            None => {
                trace!("Product {product_id} is not in the catalog, skipping withdrawal merge");
                false
            }
        }
    }
}

fn push_unique<E: Entity>(list: &mut Vec<E>, item: E) -> bool {
    if list.iter().any(|existing| existing.id() == item.id()) {
        return false;
    }
    list.push(item);
    true
}

/// File-backed storage for the catalog. A catalog that was never written reads as `None`, and
/// callers skip merging in that case rather than inventing a partial catalog.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Option<Catalog>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        Ok(Some(utils::deserialize(&self.path).await?))
    }

    pub async fn write(&self, catalog: &Catalog) -> Result<()> {
        utils::serialize(&self.path, catalog).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::date::midnight_utc;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn product(id: i64) -> ProductEntity {
        ProductEntity {
            id,
            title: format!("P{id}"),
            description: None,
            unit_of_measurement: "UND".to_string(),
            material_type: "General".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    fn withdrawal(id: i64) -> WithdrawalEntity {
        WithdrawalEntity {
            id,
            title: None,
            quantity: Decimal::ONE,
            end_time: midnight_utc(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_insert_product_dedup() {
        let mut catalog = Catalog::default();
        assert!(catalog.insert_product(product(1)));
        assert!(!catalog.insert_product(product(1)));
        assert_eq!(catalog.products.len(), 1);
    }

    #[test]
    fn test_insert_withdrawal_dedup_and_order() {
        let mut catalog = Catalog::default();
        catalog.insert_product(product(1));
        assert!(catalog.insert_withdrawal(1, withdrawal(10)));
        assert!(catalog.insert_withdrawal(1, withdrawal(11)));
        assert!(!catalog.insert_withdrawal(1, withdrawal(10)));
        let ids: Vec<i64> = catalog.product(1).unwrap().withdrawals.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn test_insert_into_unknown_product() {
        let mut catalog = Catalog::default();
        assert!(!catalog.insert_withdrawal(99, withdrawal(1)));
        assert!(catalog.products.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_file() {
        let dir = TempDir::new().unwrap();
        let file = CatalogFile::new(dir.path().join("catalog.json"));
        assert!(file.read().await.unwrap().is_none());

        let mut catalog = Catalog::default();
        catalog.insert_product(product(5));
        file.write(&catalog).await.unwrap();
        assert_eq!(file.read().await.unwrap(), Some(catalog));
    }
}
