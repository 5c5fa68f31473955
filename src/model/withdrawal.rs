use crate::error::ImportError;
use crate::import::Normalizer;
use crate::model::catalog::Catalog;
use crate::model::date::iso_millis;
use crate::model::{Entity, Field, Kind, RawRow, Record};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PRODUCT_ID: Field = Field {
    name: "productId",
    aliases: &["productoId", "productId"],
    label: "Producto ID",
};
const TITLE: Field = Field {
    name: "title",
    aliases: &["titulo", "title"],
    label: "Título",
};
const QUANTITY: Field = Field {
    name: "quantity",
    aliases: &["cantidad", "quantity"],
    label: "Cantidad",
};
const END_TIME: Field = Field {
    name: "endTime",
    aliases: &["fecha", "endTime"],
    label: "Fecha",
};

/// An outward stock movement of `quantity` units of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRecord {
    pub product_id: i64,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "iso_millis")]
    pub end_time: DateTime<Utc>,
}

impl Record for WithdrawalRecord {
    type Entity = WithdrawalEntity;
    const KIND: Kind = Kind::Withdrawal;
    const FIELDS: &'static [Field] = &[PRODUCT_ID, TITLE, QUANTITY, END_TIME];

    fn from_row(row: &RawRow, normalizer: &Normalizer) -> Result<Self, ImportError> {
        Ok(Self {
            product_id: normalizer.integer(row, &PRODUCT_ID),
            title: normalizer.text(row, &TITLE),
            quantity: normalizer.decimal(row, &QUANTITY),
            end_time: normalizer.date(row, &END_TIME)?,
        })
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.product_id.to_string(),
            self.title.clone(),
            self.quantity.normalize().to_string(),
            self.end_time.format("%d/%m/%Y").to_string(),
        ]
    }

    fn product_id(&self) -> Option<i64> {
        Some(self.product_id)
    }

    /// The server does not echo the product on a withdrawal, so the parent comes from the
    /// submitted record.
    fn merge_into(&self, entity: &WithdrawalEntity, catalog: &mut Catalog) -> bool {
        if self.product_id == 0 {
            return false;
        }
        catalog.insert_withdrawal(self.product_id, entity.clone())
    }
}

/// A withdrawal as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalEntity {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "iso_millis")]
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for WithdrawalEntity {
    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::date::midnight_utc;
    use chrono::NaiveDate;

    #[test]
    fn test_wire_format() {
        let record = WithdrawalRecord {
            product_id: 3,
            title: "Obra Norte".to_string(),
            quantity: Decimal::new(25, 1),
            end_time: midnight_utc(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["productId"], 3);
        assert_eq!(json["quantity"], 2.5);
        assert_eq!(json["endTime"], "2024-12-31T00:00:00.000Z");
        assert_eq!(
            record.cells(),
            vec!["3", "Obra Norte", "2.5", "31/12/2024"]
        );
    }
}
