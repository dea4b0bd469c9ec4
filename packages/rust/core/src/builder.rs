//! Document builder: flat [`InputRecord`]s → nested [`PriceDocument`]s.
//!
//! Per row, the builder:
//! 1. Takes `sku`/`style_id`, skipping rows that have neither
//! 2. Coerces product and base-pricing fields (bad numbers become absent)
//! 3. Collects platform prices in [`PlatformSet`] order
//! 4. Derives the price summary in one pass over those prices
//! 5. Stamps `created_at` from the clock and `data_source` from the label
//!
//! Row-level problems never abort the batch; they are collected in the
//! [`BuildReport`]. Only errors from the record source itself propagate.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use pricedoc_shared::{
    Metadata, PlatformPrices, PlatformSet, PriceDocument, PriceSummary, Pricing, Product, Result,
};

use crate::clock::{Clock, SystemClock};
use crate::source::InputRecord;

// ---------------------------------------------------------------------------
// Row-level problems
// ---------------------------------------------------------------------------

/// A row that cannot become a document and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRow {
    #[error("row {row}: missing both sku and style_id")]
    MissingIdentifiers { row: usize },
}

impl MalformedRow {
    pub fn row(&self) -> usize {
        match self {
            Self::MissingIdentifiers { row } => *row,
        }
    }
}

/// A field that failed numeric coercion and was left out of its document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row}: {field} value '{value}' is not a usable number")]
pub struct CoercionWarning {
    pub row: usize,
    pub field: String,
    pub value: String,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Documents in source order.
    pub documents: Vec<PriceDocument>,
    /// Rows that were skipped.
    pub skipped: Vec<MalformedRow>,
    /// Fields dropped because they were not numbers.
    pub warnings: Vec<CoercionWarning>,
    /// Rows pulled from the source (stops early once the limit is hit).
    pub rows_read: usize,
}

// ---------------------------------------------------------------------------
// DocumentBuilder
// ---------------------------------------------------------------------------

/// Builds documents for one batch: a platform set, a label, and a clock.
#[derive(Debug, Clone)]
pub struct DocumentBuilder<C = SystemClock> {
    platforms: PlatformSet,
    data_source: String,
    clock: C,
}

impl DocumentBuilder<SystemClock> {
    pub fn new(platforms: PlatformSet, data_source: impl Into<String>) -> Self {
        Self::with_clock(platforms, data_source, SystemClock)
    }
}

impl<C: Clock> DocumentBuilder<C> {
    pub fn with_clock(platforms: PlatformSet, data_source: impl Into<String>, clock: C) -> Self {
        Self {
            platforms,
            data_source: data_source.into(),
            clock,
        }
    }

    pub fn platforms(&self) -> &PlatformSet {
        &self.platforms
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    /// Build one document. Coercion failures are appended to `warnings`.
    pub fn build_document(
        &self,
        record: &InputRecord,
        warnings: &mut Vec<CoercionWarning>,
    ) -> std::result::Result<PriceDocument, MalformedRow> {
        if record.sku.is_none() && record.style_id.is_none() {
            return Err(MalformedRow::MissingIdentifiers { row: record.row });
        }

        let mut number = |field: &str, raw: Option<&String>| -> Option<f64> {
            let raw = raw?;
            let value = parse_number(raw);
            if value.is_none() {
                warnings.push(CoercionWarning {
                    row: record.row,
                    field: field.to_string(),
                    value: raw.clone(),
                });
            }
            value
        };

        let product = Product {
            catalog: record.catalog.clone(),
            category: record.category.clone(),
            weight: number("product.weight", record.weight.as_ref()),
            size: record
                .size
                .clone()
                .or_else(|| record.sku.as_deref().and_then(size_from_sku)),
        };

        let pricing = Pricing {
            tp: number("pricing.tp", record.tp.as_ref()),
            mrp_old: number("pricing.mrp_old", record.mrp_old.as_ref()),
            final_mrp_old: number("pricing.final_mrp_old", record.final_mrp_old.as_ref()),
        };

        let mut ecommerce_platforms = PlatformPrices::new();
        for platform in &self.platforms {
            let Some(raw) = record.platform_cell(&platform.column) else {
                continue;
            };
            match parse_number(raw) {
                Some(price) if price > 0.0 => {
                    ecommerce_platforms.insert(platform.name.clone(), price);
                }
                Some(price) => {
                    debug!(row = record.row, platform = %platform.name, price, "non-positive price ignored");
                }
                None => warnings.push(CoercionWarning {
                    row: record.row,
                    field: format!("ecommerce_platforms.{}", platform.name),
                    value: raw.to_string(),
                }),
            }
        }

        let metadata = Metadata {
            summary: summarize(&ecommerce_platforms),
            created_at: self.clock.now(),
            data_source: self.data_source.clone(),
        };

        Ok(PriceDocument {
            sku: record.sku.clone().unwrap_or_default(),
            style_id: record.style_id.clone().unwrap_or_default(),
            product,
            pricing,
            ecommerce_platforms,
            metadata,
        })
    }

    /// Build documents from a record stream, stopping after `limit` documents.
    pub fn build_batch<I>(&self, records: I, limit: Option<usize>) -> Result<BuildReport>
    where
        I: IntoIterator<Item = Result<InputRecord>>,
    {
        self.build_batch_with(records, limit, |_, _| {})
    }

    /// Like [`build_batch`](Self::build_batch), calling `on_document` with the
    /// running document count (including this one) as each document is built.
    pub fn build_batch_with<I, F>(
        &self,
        records: I,
        limit: Option<usize>,
        mut on_document: F,
    ) -> Result<BuildReport>
    where
        I: IntoIterator<Item = Result<InputRecord>>,
        F: FnMut(&PriceDocument, usize),
    {
        let mut report = BuildReport::default();

        if limit == Some(0) {
            return Ok(report);
        }

        for record in records {
            let record = record?;
            report.rows_read += 1;

            let before = report.warnings.len();
            match self.build_document(&record, &mut report.warnings) {
                Ok(doc) => {
                    on_document(&doc, report.documents.len() + 1);
                    report.documents.push(doc);
                }
                Err(malformed) => {
                    warn!(row = malformed.row(), "{malformed}, skipping row");
                    report.skipped.push(malformed);
                }
            }

            for warning in &report.warnings[before..] {
                debug!(row = warning.row, field = %warning.field, value = %warning.value, "coercion failed");
            }

            if limit.is_some_and(|n| report.documents.len() >= n) {
                break;
            }
        }

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Derive the price summary. `None` when there are no prices.
///
/// Single pass; on a tie for the minimum the earlier platform wins.
pub fn summarize(prices: &PlatformPrices) -> Option<PriceSummary> {
    let mut iter = prices.iter();
    let (first_name, &first_price) = iter.next()?;

    let mut cheapest = (first_name, first_price);
    let mut max = first_price;
    let mut sum = first_price;

    for (name, &price) in iter {
        if price < cheapest.1 {
            cheapest = (name, price);
        }
        if price > max {
            max = price;
        }
        sum += price;
    }

    let min = cheapest.1;
    let avg = round_cents(sum / prices.len() as f64).clamp(min, max);

    Some(PriceSummary {
        cheapest_platform: cheapest.0.clone(),
        cheapest_price: min,
        price_range: max - min,
        min_price: min,
        max_price: max,
        avg_price: avg,
    })
}

/// Parse a finite number; anything else is absent.
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Size suffix of a SKU such as `Os206_3141_XL` or `SET414_KR_NP_3XL`.
pub fn size_from_sku(sku: &str) -> Option<String> {
    static SIZE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"_(\d*[SMXL]+)$").expect("valid regex"));

    SIZE_RE
        .captures(sku.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use pricedoc_shared::Platform;

    use crate::clock::FixedClock;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2022-05-31T12:00:00Z")
            .expect("parse")
            .with_timezone(&Utc)
    }

    fn builder() -> DocumentBuilder<FixedClock> {
        let platforms = PlatformSet::new(vec![
            Platform::new("ajio", "Ajio MRP"),
            Platform::new("amazon", "Amazon MRP"),
            Platform::new("flipkart", "Flipkart MRP"),
        ])
        .expect("platform set");
        DocumentBuilder::with_clock(platforms, "May-2022", FixedClock(fixed_time()))
    }

    fn record(row: usize, sku: &str, prices: &[(&str, &str)]) -> InputRecord {
        let mut r = InputRecord::new(row);
        r.sku = Some(sku.to_string());
        for (column, value) in prices {
            r.set_platform_cell(*column, *value);
        }
        r
    }

    #[test]
    fn builds_summary_for_example_row() {
        let rec = record(
            1,
            "A1",
            &[("Ajio MRP", "100"), ("Amazon MRP", "90"), ("Flipkart MRP", "95")],
        );
        let mut warnings = Vec::new();
        let doc = builder().build_document(&rec, &mut warnings).expect("valid row");

        assert!(warnings.is_empty());
        assert_eq!(doc.sku, "A1");
        assert_eq!(doc.style_id, "");
        let names: Vec<&str> = doc.ecommerce_platforms.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ajio", "amazon", "flipkart"]);
        assert_eq!(doc.ecommerce_platforms["amazon"], 90.0);

        let summary = doc.metadata.summary.expect("summary");
        assert_eq!(summary.cheapest_platform, "amazon");
        assert_eq!(summary.cheapest_price, 90.0);
        assert_eq!(summary.min_price, 90.0);
        assert_eq!(summary.max_price, 100.0);
        assert_eq!(summary.price_range, 10.0);
        assert_eq!(summary.avg_price, 95.0);
        assert_eq!(doc.metadata.created_at, fixed_time());
        assert_eq!(doc.metadata.data_source, "May-2022");
    }

    #[test]
    fn tie_goes_to_first_platform_in_order() {
        // Cells are inserted out of order; platform-set order still decides.
        let rec = record(1, "T1", &[("Amazon MRP", "50"), ("Ajio MRP", "50")]);
        let doc = builder()
            .build_document(&rec, &mut Vec::new())
            .expect("valid row");
        let summary = doc.metadata.summary.expect("summary");
        assert_eq!(summary.cheapest_platform, "ajio");
        assert_eq!(summary.price_range, 0.0);
    }

    #[test]
    fn no_platform_prices_yields_bare_metadata() {
        let rec = record(1, "E1", &[]);
        let doc = builder()
            .build_document(&rec, &mut Vec::new())
            .expect("valid row");
        assert!(doc.ecommerce_platforms.is_empty());
        assert!(doc.metadata.summary.is_none());

        let json = serde_json::to_value(&doc).expect("serialize");
        let meta = json["metadata"].as_object().expect("metadata object");
        let mut keys: Vec<&str> = meta.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["created_at", "data_source"]);
    }

    #[test]
    fn missing_identifiers_is_malformed() {
        let rec = InputRecord::new(7);
        let err = builder()
            .build_document(&rec, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err, MalformedRow::MissingIdentifiers { row: 7 });
        assert!(err.to_string().contains("row 7"));
    }

    #[test]
    fn style_id_alone_is_enough() {
        let mut rec = InputRecord::new(1);
        rec.style_id = Some("Os206_3141".into());
        let doc = builder()
            .build_document(&rec, &mut Vec::new())
            .expect("valid row");
        assert_eq!(doc.sku, "");
        assert_eq!(doc.style_id, "Os206_3141");
        assert_eq!(doc.product.size, None);
    }

    #[test]
    fn bad_numbers_become_absent_with_warnings() {
        let mut rec = record(3, "B1", &[("Ajio MRP", "n/a"), ("Amazon MRP", "120")]);
        rec.tp = Some("abc".into());
        rec.weight = Some("NaN".into());
        rec.mrp_old = Some("2178".into());

        let mut warnings = Vec::new();
        let doc = builder().build_document(&rec, &mut warnings).expect("valid row");

        assert_eq!(doc.pricing.tp, None);
        assert_eq!(doc.pricing.mrp_old, Some(2178.0));
        assert_eq!(doc.product.weight, None);
        assert_eq!(doc.ecommerce_platforms.len(), 1);

        let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["product.weight", "pricing.tp", "ecommerce_platforms.ajio"]
        );
        assert!(warnings.iter().all(|w| w.row == 3));
    }

    #[test]
    fn non_positive_platform_prices_are_excluded() {
        let rec = record(
            1,
            "Z1",
            &[("Ajio MRP", "0"), ("Amazon MRP", "-5"), ("Flipkart MRP", "80")],
        );
        let mut warnings = Vec::new();
        let doc = builder().build_document(&rec, &mut warnings).expect("valid row");
        assert!(warnings.is_empty());
        assert_eq!(doc.ecommerce_platforms.len(), 1);
        assert_eq!(
            doc.metadata.summary.map(|s| s.cheapest_platform),
            Some("flipkart".to_string())
        );
    }

    #[test]
    fn size_column_wins_over_sku_suffix() {
        let mut rec = record(1, "Os206_3141_XL", &[]);
        assert_eq!(
            builder().build_document(&rec, &mut Vec::new()).expect("row").product.size.as_deref(),
            Some("XL")
        );

        rec.size = Some("Free".into());
        assert_eq!(
            builder().build_document(&rec, &mut Vec::new()).expect("row").product.size.as_deref(),
            Some("Free")
        );
    }

    #[test]
    fn sku_size_parsing() {
        assert_eq!(size_from_sku("Os206_3141_S").as_deref(), Some("S"));
        assert_eq!(size_from_sku("SET414_KR_NP_3XL").as_deref(), Some("3XL"));
        assert_eq!(size_from_sku("J0230_XXL").as_deref(), Some("XXL"));
        assert_eq!(size_from_sku("Os206_3141"), None);
        assert_eq!(size_from_sku("JNE3781-KR-XXXL"), None);
    }

    #[test]
    fn avg_is_rounded_and_clamped() {
        let mut prices = PlatformPrices::new();
        prices.insert("a".into(), 10.0);
        prices.insert("b".into(), 10.0);
        prices.insert("c".into(), 10.01);
        let summary = summarize(&prices).expect("summary");
        assert_eq!(summary.avg_price, 10.0);

        let mut prices = PlatformPrices::new();
        prices.insert("a".into(), 99.999);
        prices.insert("b".into(), 99.999);
        let summary = summarize(&prices).expect("summary");
        assert!(summary.avg_price <= summary.max_price);
        assert!(summary.avg_price >= summary.min_price);

        assert!(summarize(&PlatformPrices::new()).is_none());
    }

    fn rows() -> Vec<InputRecord> {
        vec![
            record(1, "R1", &[("Ajio MRP", "799"), ("Amazon MRP", "649.5")]),
            InputRecord::new(2),
            record(3, "R3", &[("Flipkart MRP", "1299")]),
            record(4, "R4", &[]),
            record(5, "R5", &[("Ajio MRP", "10"), ("Amazon MRP", "30"), ("Flipkart MRP", "20.25")]),
        ]
    }

    #[test]
    fn batch_skips_malformed_and_keeps_order() {
        let report = builder()
            .build_batch(rows().into_iter().map(Ok), None)
            .expect("batch");

        let skus: Vec<&str> = report.documents.iter().map(|d| d.sku.as_str()).collect();
        assert_eq!(skus, vec!["R1", "R3", "R4", "R5"]);
        assert_eq!(report.skipped, vec![MalformedRow::MissingIdentifiers { row: 2 }]);
        assert_eq!(report.rows_read, 5);
    }

    #[test]
    fn batch_invariants_hold() {
        let report = builder()
            .build_batch(rows().into_iter().map(Ok), None)
            .expect("batch");

        for doc in &report.documents {
            let Some(s) = &doc.metadata.summary else {
                assert!(doc.ecommerce_platforms.is_empty());
                continue;
            };
            assert!(s.min_price <= s.cheapest_price && s.cheapest_price <= s.max_price);
            assert_eq!(s.max_price - s.min_price, s.price_range);
            assert!(s.min_price <= s.avg_price && s.avg_price <= s.max_price);
            assert_eq!(doc.ecommerce_platforms[&s.cheapest_platform], s.cheapest_price);
        }
    }

    #[test]
    fn limit_counts_documents_not_rows() {
        let b = builder();
        let report = b.build_batch(rows().into_iter().map(Ok), Some(2)).expect("batch");
        let skus: Vec<&str> = report.documents.iter().map(|d| d.sku.as_str()).collect();
        assert_eq!(skus, vec!["R1", "R3"]);
        assert_eq!(report.rows_read, 3);

        let report = b.build_batch(rows().into_iter().map(Ok), Some(50)).expect("batch");
        assert_eq!(report.documents.len(), 4);

        let report = b.build_batch(rows().into_iter().map(Ok), Some(0)).expect("batch");
        assert!(report.documents.is_empty());
        assert_eq!(report.rows_read, 0);
    }

    #[test]
    fn same_input_same_documents() {
        let b = builder();
        let first = b.build_batch(rows().into_iter().map(Ok), None).expect("batch");
        let second = b.build_batch(rows().into_iter().map(Ok), None).expect("batch");
        assert_eq!(first.documents, second.documents);
    }

    #[test]
    fn source_errors_propagate() {
        let records = vec![
            Ok(record(1, "R1", &[])),
            Err(pricedoc_shared::PriceDocError::source_read("mem", "bad utf-8")),
            Ok(record(3, "R3", &[])),
        ];
        let result = builder().build_batch(records, None);
        assert!(result.is_err());
    }

    #[test]
    fn system_clock_builder_stamps_label() {
        let platforms = PlatformSet::new(vec![Platform::new("ajio", "Ajio MRP")]).expect("set");
        let b = DocumentBuilder::new(platforms, "June-2022");
        assert_eq!(b.data_source(), "June-2022");

        let before = Utc::now();
        let doc = b
            .build_document(&record(1, "N1", &[("Ajio MRP", "10")]), &mut Vec::new())
            .expect("valid row");
        assert!(doc.metadata.created_at >= before);
        assert_eq!(doc.metadata.data_source, "June-2022");
    }

    #[test]
    fn callback_sees_running_count() {
        let mut seen = Vec::new();
        builder()
            .build_batch_with(rows().into_iter().map(Ok), None, |doc, n| {
                seen.push((doc.sku.clone(), n))
            })
            .expect("batch");
        assert_eq!(seen.first(), Some(&("R1".to_string(), 1)));
        let counts: Vec<usize> = seen.iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![1, 2, 3, 4]);

        let mut calls = 0;
        let report = builder()
            .build_batch_with(rows().into_iter().map(Ok), Some(2), |_, n| calls = n)
            .expect("limited batch");
        assert_eq!(calls, 2);
        assert_eq!(report.documents.len(), 2);
    }
}
