//! Configuration file handling for warehouse.
//!
//! The configuration file is stored at `$WAREHOUSE_HOME/config.json` and contains the URL of the
//! inventory API and the settings of the import workflow.

use crate::import::{DateFallback, Normalizer};
use crate::model::{CatalogFile, Kind};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "warehouse";
const CONFIG_VERSION: u8 = 1;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const STAGING: &str = "staging";
const CONFIG_JSON: &str = "config.json";
const CATALOG_JSON: &str = "catalog.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$WAREHOUSE_HOME` and from there it loads `$WAREHOUSE_HOME/config.json`. It
/// provides paths to the other files the app keeps in the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    staging: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    api_url: Url,
}

impl Config {
    /// Creates the data directory, its `staging` subdirectory and an initial `config.json` that
    /// points to `api_url`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/warehouse`
    /// - `api_url` - The base URL of the inventory API, e.g. `https://inventario.example.com/api`
    ///
    /// # Errors
    /// - Returns an error if `api_url` is not an http(s) URL or if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>, api_url: &str) -> Result<Self> {
        let api_url = parse_api_url(api_url)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the warehouse home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let staging = root.join(STAGING);
        utils::make_dir(&staging).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            api_url: api_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            staging,
            config_path,
            config_file,
            api_url,
        })
    }

    /// This will
    /// - validate that `warehouse_home` and its config file exist
    /// - load and validate the config file
    /// - validate that the staging directory exists
    pub async fn load(warehouse_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = warehouse_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Warehouse home is missing, run 'warehouse init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let api_url = parse_api_url(&config_file.api_url)?;

        let staging = root.join(STAGING);
        if !staging.is_dir() {
            bail!(
                "The staging directory is missing '{}'",
                staging.display()
            )
        }

        Ok(Self {
            root,
            staging,
            config_path,
            config_file,
            api_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.request_timeout_secs)
    }

    pub fn date_fallback(&self) -> DateFallback {
        self.config_file.date_fallback
    }

    /// A `Normalizer` that applies the configured date fallback.
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.date_fallback())
    }

    /// Where the staging store of `kind` is kept between runs.
    pub fn staging_path(&self, kind: Kind) -> PathBuf {
        self.staging.join(format!("{kind}.json"))
    }

    /// The file that marks a submission of `kind` as in flight.
    pub fn lock_path(&self, kind: Kind) -> PathBuf {
        self.staging.join(format!("{kind}.lock"))
    }

    pub fn catalog_file(&self) -> CatalogFile {
        CatalogFile::new(self.root.join(CATALOG_JSON))
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "warehouse",
///   "config_version": 1,
///   "api_url": "https://inventario.example.com/api",
///   "request_timeout_secs": 30,
///   "date_fallback": "now"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "warehouse"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the inventory API
    api_url: String,

    /// How long to wait for the server before a submission is considered failed
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    /// What to do with spreadsheet dates that cannot be read: "now" or "reject"
    #[serde(default)]
    date_fallback: DateFallback,
}

fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: String::new(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            date_fallback: DateFallback::default(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names another app.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

/// Parses the API base URL, which must be http or https.
fn parse_api_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid API URL '{url}'"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => bail!("The API URL must use http or https, got '{other}'"),
    }
}
