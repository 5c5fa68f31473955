//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::model::{Catalog, Kind, ProductEntity};
use crate::Config;
use chrono::Utc;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Test environment that sets up a warehouse home directory with a Config and an empty catalog.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("warehouse");
        let config = Config::create(&root, "http://localhost:3000/api")
            .await
            .unwrap();
        config
            .catalog_file()
            .write(&Catalog::default())
            .await
            .unwrap();

        Self { temp_dir, config }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Writes `contents` to a file named `name` outside of the warehouse home, the way a user's
    /// spreadsheet would be, and returns its path.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub async fn catalog(&self) -> Catalog {
        self.config.catalog_file().read().await.unwrap().unwrap()
    }

    /// Adds `product` to the local catalog.
    pub async fn add_product(&self, product: ProductEntity) {
        let mut catalog = self.catalog().await;
        catalog.insert_product(product);
        self.config.catalog_file().write(&catalog).await.unwrap();
    }
}

impl TestEnv {
    /// Writes a submission lock of `kind` as another process would have, taken `age` ago.
    pub fn write_lock(&self, kind: Kind, age: Duration) {
        let started_at = Utc::now() - chrono::Duration::from_std(age).unwrap();
        let info = serde_json::json!({"pid": 1, "started_at": started_at});
        std::fs::write(self.config.lock_path(kind), info.to_string()).unwrap();
    }

    /// Rewrites `config.json` with `key` set to `value` and reloads the Config.
    pub async fn set_config(&mut self, key: &str, value: serde_json::Value) {
        let path = self.config.config_path().to_path_buf();
        let mut file: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        file[key] = value;
        std::fs::write(&path, file.to_string()).unwrap();
        self.config = Config::load(self.config.root()).await.unwrap();
    }
}

pub fn product_entity(id: i64, title: &str) -> ProductEntity {
    ProductEntity {
        id,
        title: title.to_string(),
        description: None,
        unit_of_measurement: "UND".to_string(),
        material_type: "General".to_string(),
        created_at: None,
        updated_at: None,
    }
}

/// Writes a workbook whose first sheet, "Salidas", holds three withdrawals: one with a date cell,
/// one with a date typed as text and one whose date cannot be read. A second sheet holds rows that
/// must never be imported.
pub fn write_withdrawals_workbook(path: &Path) {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let sheet = workbook.add_worksheet().set_name("Salidas").unwrap();
    for (col, header) in ["productoId", "titulo", "cantidad", "fecha"].iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    let rows = [(7.0, "Cemento", 3.0), (7.0, "Cemento", 1.5), (8.0, "Arena", 2.0)];
    for (ix, (product_id, title, quantity)) in rows.iter().enumerate() {
        let row = ix as u32 + 1;
        sheet.write_number(row, 0, *product_id).unwrap();
        sheet.write_string(row, 1, *title).unwrap();
        sheet.write_number(row, 2, *quantity).unwrap();
    }
    let date = ExcelDateTime::from_ymd(2024, 3, 5).unwrap();
    sheet
        .write_datetime_with_format(1, 3, &date, &date_format)
        .unwrap();
    sheet.write_string(2, 3, "06/03/2024").unwrap();
    sheet.write_string(3, 3, "mañana").unwrap();

    let other = workbook.add_worksheet().set_name("Resumen").unwrap();
    other.write_string(0, 0, "titulo").unwrap();
    other.write_string(1, 0, "Yeso").unwrap();

    workbook.save(path).unwrap();
}
