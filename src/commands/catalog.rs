use crate::commands::Out;
use crate::model::{format_price, Catalog};
use crate::{Config, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Write;

/// Stock totals for one product of the local catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: i64,
    pub title: String,
    pub unit_of_measurement: String,
    pub entries: usize,
    pub withdrawals: usize,
    pub received: Decimal,
    pub withdrawn: Decimal,
    /// What was paid for everything received.
    pub spent: Decimal,
}

impl ProductSummary {
    pub fn stock(&self) -> Decimal {
        self.received - self.withdrawn
    }
}

/// Summarizes the local catalog: one line per product with its stock movements.
pub async fn catalog(config: Config) -> Result<Out<Vec<ProductSummary>>> {
    let Some(catalog) = config.catalog_file().read().await? else {
        return Ok("No hay catálogo local, ejecute 'warehouse init'".into());
    };
    let summaries = summarize(&catalog);
    if summaries.is_empty() {
        return Ok(Out::new("El catálogo está vacío", summaries));
    }

    let mut message = String::from("ID\tProducto\tUM\tEntradas\tSalidas\tStock\tCosto");
    for s in &summaries {
        let _ = write!(
            message,
            "\n{}\t{}\t{}\t{}\t{}\t{}\t{}",
            s.id,
            s.title,
            s.unit_of_measurement,
            s.entries,
            s.withdrawals,
            s.stock().normalize(),
            format_price(s.spent)
        );
    }
    Ok(Out::new(message, summaries))
}

fn summarize(catalog: &Catalog) -> Vec<ProductSummary> {
    catalog
        .products
        .iter()
        .map(|p| ProductSummary {
            id: p.product.id,
            title: p.product.title.clone(),
            unit_of_measurement: p.product.unit_of_measurement.clone(),
            entries: p.entries.len(),
            withdrawals: p.withdrawals.len(),
            received: p.entries.iter().map(|e| e.quantity).sum(),
            withdrawn: p.withdrawals.iter().map(|w| w.quantity).sum(),
            spent: p.entries.iter().map(|e| e.quantity * e.price).sum(),
        })
        .collect()
}
