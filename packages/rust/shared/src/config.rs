//! Application configuration for pricedoc.
//!
//! User config lives at `~/.pricedoc/pricedoc.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PriceDocError, Result};
use crate::types::{Platform, PlatformSet};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pricedoc.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pricedoc";

// ---------------------------------------------------------------------------
// Config structs (matching pricedoc.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// CSV header names for the fixed columns.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Known platforms, in tie-break order.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<Platform>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            columns: ColumnsConfig::default(),
            platforms: default_platforms(),
        }
    }
}

impl AppConfig {
    /// The configured platforms as a validated [`PlatformSet`].
    pub fn platform_set(&self) -> Result<PlatformSet> {
        PlatformSet::new(self.platforms.clone())
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Batch label stamped into every document. Unset means "use the CSV file stem".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,

    /// Maximum number of documents to produce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// CSV field delimiter (a single ASCII character).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Export format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Discover platforms from the CSV header instead of `[[platforms]]`.
    #[serde(default)]
    pub discover_platforms: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_source: None,
            limit: None,
            delimiter: default_delimiter(),
            format: OutputFormat::default(),
            discover_platforms: false,
        }
    }
}

impl DefaultsConfig {
    /// The delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        parse_delimiter(&self.delimiter)
    }
}

fn default_delimiter() -> String {
    ",".into()
}

/// Export format for transformed documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON array.
    #[default]
    Json,
    /// One compact JSON document per line.
    Jsonl,
}

/// `[columns]` section — header names of the fixed CSV columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub sku: String,
    pub style_id: String,
    pub catalog: String,
    pub category: String,
    pub size: String,
    pub weight: String,
    pub tp: String,
    pub mrp_old: String,
    pub final_mrp_old: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            sku: "Sku".into(),
            style_id: "Style Id".into(),
            catalog: "Catalog".into(),
            category: "Category".into(),
            size: "Size".into(),
            weight: "Weight".into(),
            tp: "TP".into(),
            mrp_old: "MRP Old".into(),
            final_mrp_old: "Final MRP Old".into(),
        }
    }
}

impl ColumnsConfig {
    /// Every configured fixed-column header, trimmed, skipping unset ones.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [
            &self.sku,
            &self.style_id,
            &self.catalog,
            &self.category,
            &self.size,
            &self.weight,
            &self.tp,
            &self.mrp_old,
            &self.final_mrp_old,
        ]
        .into_iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
    }
}

/// Platforms of the May-2022 export, in column order.
fn default_platforms() -> Vec<Platform> {
    [
        ("ajio", "Ajio MRP"),
        ("amazon", "Amazon MRP"),
        ("amazon_fba", "Amazon FBA MRP"),
        ("flipkart", "Flipkart MRP"),
        ("limeroad", "Limeroad MRP"),
        ("myntra", "Myntra MRP"),
        ("paytm", "Paytm MRP"),
        ("snapdeal", "Snapdeal MRP"),
    ]
    .into_iter()
    .map(|(name, column)| Platform::new(name, column))
    .collect()
}

/// Parse a delimiter string into a single ASCII byte.
fn parse_delimiter(value: &str) -> Result<u8> {
    let value = if value == "\\t" { "\t" } else { value };
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(PriceDocError::config(format!(
            "delimiter must be a single ASCII character, got '{value}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pricedoc/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PriceDocError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pricedoc/pricedoc.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PriceDocError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PriceDocError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PriceDocError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PriceDocError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PriceDocError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check the delimiter, the platform list, and that at least one identifier
/// column is named.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    config.defaults.delimiter_byte()?;
    config.platform_set()?;

    if config.columns.sku.trim().is_empty() && config.columns.style_id.trim().is_empty() {
        return Err(PriceDocError::config(
            "at least one of columns.sku and columns.style_id must be set",
        ));
    }

    Ok(())
}
