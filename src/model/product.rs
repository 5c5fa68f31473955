use crate::error::ImportError;
use crate::import::Normalizer;
use crate::model::catalog::Catalog;
use crate::model::{Entity, Field, Kind, RawRow, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const TITLE: Field = Field {
    name: "title",
    aliases: &["titulo", "title"],
    label: "Título",
};
const DESCRIPTION: Field = Field {
    name: "description",
    aliases: &["descripcion", "description"],
    label: "Descripción",
};
const UNIT_OF_MEASUREMENT: Field = Field {
    name: "unitOfMeasurement",
    aliases: &["um", "unitOfMeasurement"],
    label: "UM",
};
const MATERIAL_TYPE: Field = Field {
    name: "materialType",
    aliases: &["tipomaterial", "materialType"],
    label: "Tipo de material",
};

/// A catalog item. Values are kept exactly as typed; the server trims and validates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub title: String,
    /// Sent as `null` when empty.
    #[serde(
        serialize_with = "empty_as_null",
        deserialize_with = "null_as_empty",
        default
    )]
    pub description: String,
    pub unit_of_measurement: String,
    pub material_type: String,
}

impl Record for ProductRecord {
    type Entity = ProductEntity;
    const KIND: Kind = Kind::Product;
    const FIELDS: &'static [Field] = &[TITLE, DESCRIPTION, UNIT_OF_MEASUREMENT, MATERIAL_TYPE];

    fn from_row(row: &RawRow, normalizer: &Normalizer) -> Result<Self, ImportError> {
        Ok(Self {
            title: normalizer.text(row, &TITLE),
            description: normalizer.text(row, &DESCRIPTION),
            unit_of_measurement: normalizer.text(row, &UNIT_OF_MEASUREMENT),
            material_type: normalizer.text(row, &MATERIAL_TYPE),
        })
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.description.clone(),
            self.unit_of_measurement.clone(),
            self.material_type.clone(),
        ]
    }

    fn merge_into(&self, entity: &ProductEntity, catalog: &mut Catalog) -> bool {
        catalog.insert_product(entity.clone())
    }
}

fn empty_as_null<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_empty() {
        serializer.serialize_none()
    } else {
        serializer.serialize_str(value)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A product as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductEntity {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unit_of_measurement: String,
    pub material_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for ProductEntity {
    fn id(&self) -> i64 {
        self.id
    }
}
