use crate::error::ImportError;
use crate::import::Normalizer;
use crate::model::catalog::{Catalog, ProductRef, Supplier};
use crate::model::date::iso_millis;
use crate::model::number::format_price;
use crate::model::{Entity, Field, Kind, RawRow, Record};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PRODUCT_ID: Field = Field {
    name: "productId",
    aliases: &["productoId", "productId"],
    label: "Producto ID",
};
const QUANTITY: Field = Field {
    name: "quantity",
    aliases: &["cantidad", "quantity"],
    label: "Cantidad",
};
const PRICE: Field = Field {
    name: "price",
    aliases: &["precio", "price"],
    label: "Precio",
};
const RUC: Field = Field {
    name: "ruc",
    aliases: &["ruc"],
    label: "RUC",
};
const START_TIME: Field = Field {
    name: "startTime",
    aliases: &["fecha", "startTime"],
    label: "Fecha",
};

/// An inward stock movement: `quantity` units of a product bought from the supplier identified
/// by its tax id (`ruc`) at `price` each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub product_id: i64,
    pub ruc: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "iso_millis")]
    pub start_time: DateTime<Utc>,
}

impl Record for EntryRecord {
    type Entity = EntryEntity;
    const KIND: Kind = Kind::Entry;
    const FIELDS: &'static [Field] = &[PRODUCT_ID, QUANTITY, PRICE, RUC, START_TIME];

    fn from_row(row: &RawRow, normalizer: &Normalizer) -> Result<Self, ImportError> {
        Ok(Self {
            product_id: normalizer.integer(row, &PRODUCT_ID),
            ruc: normalizer.text(row, &RUC),
            quantity: normalizer.decimal(row, &QUANTITY),
            price: normalizer.decimal(row, &PRICE),
            start_time: normalizer.date(row, &START_TIME)?,
        })
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.product_id.to_string(),
            self.quantity.normalize().to_string(),
            format_price(self.price),
            self.ruc.clone(),
            self.start_time.format("%d/%m/%Y").to_string(),
        ]
    }

    fn product_id(&self) -> Option<i64> {
        Some(self.product_id)
    }

    fn merge_into(&self, entity: &EntryEntity, catalog: &mut Catalog) -> bool {
        let product_id = entity
            .product
            .as_ref()
            .map(|p| p.id)
            .unwrap_or(self.product_id);
        catalog.insert_entry(product_id, entity.clone())
    }
}

/// An entry as stored by the server, with its supplier resolved from the submitted `ruc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryEntity {
    pub id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "iso_millis")]
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<Supplier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRef>,
}

impl Entity for EntryEntity {
    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::date::midnight_utc;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn record() -> EntryRecord {
        EntryRecord {
            product_id: 7,
            ruc: "20100070970".to_string(),
            quantity: Decimal::from(3),
            price: Decimal::from_str("12.5").unwrap(),
            start_time: midnight_utc(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
        }
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "productId": 7,
                "ruc": "20100070970",
                "quantity": 3.0,
                "price": 12.5,
                "startTime": "2024-03-05T00:00:00.000Z"
            })
        );
    }

    #[test]
    fn test_cells() {
        assert_eq!(
            record().cells(),
            vec!["7", "3", "S/ 12.50", "20100070970", "05/03/2024"]
        );
    }

    #[test]
    fn test_entity_from_server_json() {
        let json = r#"{
            "id": 41,
            "quantity": 3,
            "price": 12.5,
            "startTime": "2024-03-05T00:00:00.000Z",
            "createdAt": "2024-03-06T14:00:00Z",
            "supplier": {"id": 2, "name": "ACME SAC", "ruc": "20100070970"},
            "product": {"id": 7}
        }"#;
        let entity: EntryEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.id(), 41);
        assert_eq!(entity.supplier.unwrap().name, "ACME SAC");
        assert_eq!(entity.product.unwrap().id, 7);
    }
}
