use crate::commands::Out;
use crate::model::Catalog;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `api_url` along with default settings
/// - Writes an empty `catalog.json` that submissions merge created entities into
///
/// # Arguments
/// - `warehouse_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/warehouse`
/// - `api_url` - The base URL of the inventory API, e.g. `https://inventario.example.com/api`
///
/// # Errors
/// - Returns an error if the URL is invalid or any file operations fail.
pub async fn init(warehouse_home: &Path, api_url: &str) -> Result<Out<()>> {
    let config = Config::create(warehouse_home, api_url)
        .await
        .context("Unable to create the data directory and configs")?;

    let catalog = config.catalog_file();
    if catalog.read().await?.is_none() {
        catalog.write(&Catalog::default()).await?;
    }

    Ok(format!(
        "Directorio de datos creado en {}",
        config.root().display()
    )
    .into())
}
