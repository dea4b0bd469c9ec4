//! Core domain types for pricedoc documents.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ColumnsConfig;
use crate::error::{PriceDocError, Result};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// A named e-commerce storefront and the CSV column carrying its price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Key used in `ecommerce_platforms` (e.g., `amazon_fba`).
    pub name: String,
    /// Source column header (e.g., `Amazon FBA MRP`).
    pub column: String,
}

impl Platform {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }

    /// Build a platform from its column header, standardizing the name.
    pub fn from_column(column: &str) -> Self {
        Self::new(standardize_platform_name(column), column.trim())
    }
}

/// Turn a platform column header into a document key.
///
/// `"Amazon FBA MRP"` becomes `"amazon_fba"`.
pub fn standardize_platform_name(column: &str) -> String {
    column
        .replace(" MRP", "")
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

// ---------------------------------------------------------------------------
// PlatformSet
// ---------------------------------------------------------------------------

/// The fixed, ordered list of platforms used for a whole batch.
///
/// Order matters: it is the iteration order when collecting prices and
/// therefore decides which platform wins a tie on the minimum price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSet {
    platforms: Vec<Platform>,
}

impl PlatformSet {
    /// Create a set, rejecting empty or duplicate names and columns.
    pub fn new(platforms: Vec<Platform>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut columns = HashSet::new();

        for platform in &platforms {
            if platform.name.trim().is_empty() || platform.column.trim().is_empty() {
                return Err(PriceDocError::config(
                    "platform name and column must not be empty",
                ));
            }
            if !names.insert(platform.name.as_str()) {
                return Err(PriceDocError::config(format!(
                    "duplicate platform name '{}'",
                    platform.name
                )));
            }
            if !columns.insert(platform.column.as_str()) {
                return Err(PriceDocError::config(format!(
                    "duplicate platform column '{}'",
                    platform.column
                )));
            }
        }

        Ok(Self { platforms })
    }

    /// Discover platforms from a CSV header: every column mentioning `MRP`
    /// that is not one of the configured fixed columns, in header order.
    pub fn discover<'a>(
        headers: impl IntoIterator<Item = &'a str>,
        columns: &ColumnsConfig,
    ) -> Self {
        let fixed: HashSet<&str> = columns.names().collect();
        let mut seen = HashSet::new();
        let platforms = headers
            .into_iter()
            .map(str::trim)
            .filter(|h| h.contains("MRP") && !fixed.contains(h))
            .map(Platform::from_column)
            .filter(|p| !p.name.is_empty() && seen.insert(p.name.clone()))
            .collect();

        Self { platforms }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Platform> {
        self.platforms.iter()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Platform names in set order.
    pub fn names(&self) -> Vec<&str> {
        self.platforms.iter().map(|p| p.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a PlatformSet {
    type Item = &'a Platform;
    type IntoIter = std::slice::Iter<'a, Platform>;

    fn into_iter(self) -> Self::IntoIter {
        self.platforms.iter()
    }
}

// ---------------------------------------------------------------------------
// PriceDocument
// ---------------------------------------------------------------------------

/// Platform name → price, kept in platform-set order.
pub type PlatformPrices = IndexMap<String, f64>;

/// One denormalized document, ready for a document-database bulk insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDocument {
    pub sku: String,
    pub style_id: String,
    pub product: Product,
    pub pricing: Pricing,
    pub ecommerce_platforms: PlatformPrices,
    pub metadata: Metadata,
}

/// `product` sub-document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Size column value, or the size suffix parsed from the SKU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// `pricing` sub-document with the base prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrp_old: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_mrp_old: Option<f64>,
}

/// `metadata` sub-document.
///
/// The price statistics are flattened into the same object and are omitted
/// entirely when the row had no usable platform prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(flatten)]
    pub summary: Option<PriceSummary>,
    /// When the document was built (not when the source row was written).
    pub created_at: DateTime<Utc>,
    /// Caller-supplied batch label, e.g. `May-2022`.
    pub data_source: String,
}

/// Statistics derived from a document's `ecommerce_platforms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub cheapest_platform: String,
    pub cheapest_price: f64,
    pub price_range: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// Mean rounded to two decimals, clamped into `[min_price, max_price]`.
    pub avg_price: f64,
}
