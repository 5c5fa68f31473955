//! Insert command handlers.

use crate::api::{self, Mode};
use crate::args::{InsertEntryArgs, InsertProductArgs, InsertWithdrawalArgs};
use crate::commands::Out;
use crate::import::{submit_one, FormErrors, SingleOutcome};
use crate::model::date::midnight_utc;
use crate::model::{
    Entity, EntryEntity, EntryRecord, ProductEntity, ProductRecord, Record, WithdrawalEntity,
    WithdrawalRecord,
};
use crate::{Config, Result};
use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use tracing::info;

/// Creates a single entry on the server and adds it to the local catalog.
///
/// # Arguments
///
/// - `config` - The application configuration.
/// - `mode` - Which remote to talk to.
/// - `args` - The entry to create. When `start_time` is not given the entry is dated today.
///
/// # Returns
///
/// On success, returns an `Out` containing the entry as created by the server, with its id and
/// its supplier resolved from the RUC.
///
/// # Errors
///
/// - Returns an error listing the rejected fields if the server refuses the entry.
/// - Returns `ConnectionFailed` if the server cannot be reached.
pub async fn insert_entry(
    config: Config,
    mode: Mode,
    args: InsertEntryArgs,
) -> Result<Out<EntryEntity>> {
    let record = EntryRecord {
        product_id: args.product_id,
        ruc: args.ruc,
        quantity: args.quantity,
        price: args.price,
        start_time: midnight_utc(args.start_time.unwrap_or_else(today)),
    };
    insert(&config, mode, record).await
}

/// Creates a single product on the server and adds it to the local catalog. A missing
/// description is sent as `null`.
pub async fn insert_product(
    config: Config,
    mode: Mode,
    args: InsertProductArgs,
) -> Result<Out<ProductEntity>> {
    let record = ProductRecord {
        title: args.title,
        description: args.description.unwrap_or_default(),
        unit_of_measurement: args.unit_of_measurement,
        material_type: args.material_type,
    };
    insert(&config, mode, record).await
}

/// Creates a single withdrawal on the server and adds it to the local catalog.
pub async fn insert_withdrawal(
    config: Config,
    mode: Mode,
    args: InsertWithdrawalArgs,
) -> Result<Out<WithdrawalEntity>> {
    let record = WithdrawalRecord {
        product_id: args.product_id,
        title: args.title,
        quantity: args.quantity,
        end_time: midnight_utc(args.end_time.unwrap_or_else(today)),
    };
    insert(&config, mode, record).await
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn insert<R: Record>(config: &Config, mode: Mode, record: R) -> Result<Out<R::Entity>> {
    let remote = api::remote::<R>(config, mode).await?;
    let catalog_file = config.catalog_file();
    let mut catalog = catalog_file.read().await?;

    match submit_one(remote.as_ref(), &record, catalog.as_mut()).await? {
        SingleOutcome::Created(entity) => {
            if let Some(catalog) = &catalog {
                catalog_file.write(catalog).await?;
            }
            info!("Created {} {}", R::KIND, entity.id());
            Ok(Out::new(
                format!("{} creado con id {}", R::KIND.label(), entity.id()),
                entity,
            ))
        }
        SingleOutcome::Rejected(errors) => Err(anyhow!(rejection::<R>(&errors))),
    }
}

/// One line per rejected field, labelled the way the form labels it, then any message that does
/// not belong to a field.
fn rejection<R: Record>(errors: &FormErrors) -> String {
    let mut lines = vec![format!("No se pudo crear el registro de tipo {}", R::KIND.label())];
    for (field, message) in &errors.fields {
        lines.push(format!("  {}: {message}", R::label(field)));
    }
    if let Some(banner) = &errors.banner {
        lines.push(format!("  {banner}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::test::{product_entity, TestEnv};
    use rust_decimal::Decimal;

    fn product_args(title: &str) -> InsertProductArgs {
        InsertProductArgs {
            title: title.to_string(),
            description: None,
            unit_of_measurement: "BOL".to_string(),
            material_type: "Construcción".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_product() {
        let env = TestEnv::new().await;
        let out = insert_product(env.config(), Mode::Test, product_args("Cemento"))
            .await
            .unwrap();
        assert_eq!(out.message(), "Producto creado con id 1");
        let entity = out.structure().unwrap();
        assert_eq!(entity.description, None);

        let catalog = env.catalog().await;
        assert_eq!(catalog.products.len(), 1);
        assert_eq!(catalog.products[0].product.title, "Cemento");
    }

    #[tokio::test]
    async fn test_insert_product_rejected() {
        let env = TestEnv::new().await;
        let err = insert_product(env.config(), Mode::Test, product_args(""))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No se pudo crear el registro de tipo Producto\n  Título: El título es obligatorio"
        );
        assert!(env.catalog().await.products.is_empty());
    }

    #[tokio::test]
    async fn test_insert_withdrawal_defaults_to_today() {
        let env = TestEnv::new().await;
        env.add_product(product_entity(8, "Arena")).await;

        let args = InsertWithdrawalArgs {
            product_id: 8,
            title: "Obra Miraflores".to_string(),
            quantity: Decimal::from(2),
            end_time: None,
        };
        let out = insert_withdrawal(env.config(), Mode::Test, args)
            .await
            .unwrap();
        let entity = out.structure().unwrap();
        assert_eq!(entity.end_time, midnight_utc(today()));

        let catalog = env.catalog().await;
        assert_eq!(catalog.product(8).unwrap().withdrawals[0].id, entity.id);
    }

    #[tokio::test]
    async fn test_insert_entry_lists_every_rejected_field() {
        let env = TestEnv::new().await;
        let args = InsertEntryArgs {
            product_id: 99,
            ruc: "123".to_string(),
            quantity: Decimal::ZERO,
            price: Decimal::ONE,
            start_time: NaiveDate::from_ymd_opt(2024, 3, 5),
        };
        let err = insert_entry(env.config(), Mode::Test, args)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Producto ID: El producto 99 no existe"));
        assert!(message.contains("Cantidad: La cantidad debe ser mayor a 0"));
        assert!(message.contains("RUC: El RUC debe tener 11 dígitos"));
        assert!(err.downcast_ref::<ImportError>().is_none());
    }

    #[tokio::test]
    async fn test_insert_entry() {
        let env = TestEnv::new().await;
        env.add_product(product_entity(3, "Fierro 1/2")).await;
        let args = InsertEntryArgs {
            product_id: 3,
            ruc: "20100070970".to_string(),
            quantity: Decimal::from(40),
            price: Decimal::new(3250, 2),
            start_time: NaiveDate::from_ymd_opt(2024, 3, 5),
        };
        let out = insert_entry(env.config(), Mode::Test, args).await.unwrap();
        let entity = out.structure().unwrap();
        assert_eq!(entity.id, 4);
        assert_eq!(entity.price, Decimal::new(3250, 2));

        let catalog = env.catalog().await;
        assert_eq!(catalog.product(3).unwrap().entries.len(), 1);
    }
}
