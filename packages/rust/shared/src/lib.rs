//! Shared types, error model, and configuration for pricedoc.
//!
//! This crate is the foundation depended on by all other pricedoc crates.
//! It provides:
//! - [`PriceDocError`] — the unified error type
//! - Domain types ([`PriceDocument`], [`Metadata`], [`Platform`], [`PlatformSet`])
//! - Configuration ([`AppConfig`], [`ColumnsConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColumnsConfig, DefaultsConfig, OutputFormat, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{PriceDocError, Result};
pub use types::{
    Metadata, Platform, PlatformPrices, PlatformSet, PriceDocument, PriceSummary, Pricing,
    Product, standardize_platform_name,
};
