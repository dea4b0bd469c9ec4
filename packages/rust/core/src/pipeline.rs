//! End-to-end transform pipeline: CSV → records → documents.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use pricedoc_shared::{
    AppConfig, ColumnsConfig, PlatformSet, PriceDocError, PriceDocument, Result,
};

use crate::builder::{CoercionWarning, DocumentBuilder, MalformedRow};
use crate::clock::Clock;
use crate::source::RecordReader;

/// Where the batch's platform list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformSource {
    /// A fixed list from configuration.
    Configured(PlatformSet),
    /// Discovered once from the CSV header.
    Discover,
}

/// Configuration for [`transform_csv`].
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// CSV file to read.
    pub source: PathBuf,
    /// Label stamped into every document's `metadata.data_source`.
    pub data_source: String,
    /// Maximum number of documents to produce.
    pub limit: Option<usize>,
    /// CSV field delimiter.
    pub delimiter: u8,
    /// Header names of the fixed columns.
    pub columns: ColumnsConfig,
    /// Platform list or header discovery.
    pub platforms: PlatformSource,
}

impl TransformConfig {
    /// Runtime config for `source`, seeded from the app config.
    ///
    /// An unset `data_source` falls back to the CSV file stem; a set one is
    /// used verbatim, even when empty.
    pub fn new(source: impl Into<PathBuf>, app: &AppConfig) -> Result<Self> {
        let source = source.into();
        let platforms = if app.defaults.discover_platforms {
            PlatformSource::Discover
        } else {
            PlatformSource::Configured(app.platform_set()?)
        };
        let data_source = match &app.defaults.data_source {
            Some(label) => label.clone(),
            None => default_data_source(&source),
        };

        Ok(Self {
            data_source,
            limit: app.defaults.limit,
            delimiter: app.defaults.delimiter_byte()?,
            columns: app.columns.clone(),
            platforms,
            source,
        })
    }
}

/// Batch label derived from a file name: `data/May-2022.csv` → `May-2022`.
pub fn default_data_source(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Result of [`transform_csv`].
#[derive(Debug)]
pub struct TransformResult {
    /// Documents in source order.
    pub documents: Vec<PriceDocument>,
    /// Rows dropped for lacking both identifiers.
    pub skipped: Vec<MalformedRow>,
    /// Fields dropped because they were not numbers.
    pub warnings: Vec<CoercionWarning>,
    /// Data rows read from the source.
    pub rows_read: usize,
    /// Platform set used for the batch.
    pub platforms: PlatformSet,
    /// Label stamped into the documents.
    pub data_source: String,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each document is built.
    fn document_built(&self, sku: &str, count: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &TransformResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_built(&self, _sku: &str, _count: usize) {}
    fn done(&self, _result: &TransformResult) {}
}

/// Resolve the platform set for a source without transforming it.
pub fn resolve_platforms(config: &TransformConfig) -> Result<PlatformSet> {
    match &config.platforms {
        PlatformSource::Configured(set) => Ok(set.clone()),
        PlatformSource::Discover => {
            let reader = RecordReader::open(&config.source, config.delimiter, &config.columns)?;
            Ok(PlatformSet::discover(
                reader.headers().iter().map(String::as_str),
                &config.columns,
            ))
        }
    }
}

/// Run the full transform.
///
/// 1. Open the CSV and resolve the header
/// 2. Resolve the platform set (configured or discovered)
/// 3. Build documents up to the limit
#[instrument(skip_all, fields(source = %config.source.display(), data_source = %config.data_source))]
pub fn transform_csv<C: Clock>(
    config: &TransformConfig,
    clock: C,
    progress: &dyn ProgressReporter,
) -> Result<TransformResult> {
    let start = Instant::now();

    info!(limit = ?config.limit, "starting transform");

    // --- Phase 1: Source ---
    progress.phase("Reading CSV header");
    let mut reader = RecordReader::open(&config.source, config.delimiter, &config.columns)?;

    // --- Phase 2: Platforms ---
    let platforms = match &config.platforms {
        PlatformSource::Configured(set) => set.clone(),
        PlatformSource::Discover => PlatformSet::discover(
            reader.headers().iter().map(String::as_str),
            &config.columns,
        ),
    };
    if platforms.is_empty() {
        return Err(PriceDocError::validation(format!(
            "no platform price columns available for {}",
            config.source.display()
        )));
    }
    let matched = reader.matched_platforms(&platforms)?;
    debug!(platforms = ?platforms.names(), matched, "platform set resolved");

    // --- Phase 3: Build documents ---
    progress.phase("Transforming rows");
    let builder = DocumentBuilder::with_clock(platforms, config.data_source.clone(), clock);
    let report = builder.build_batch_with(
        reader.records(builder.platforms()),
        config.limit,
        |doc, count| progress.document_built(&doc.sku, count),
    )?;

    if !report.skipped.is_empty() {
        warn!(skipped = report.skipped.len(), "some rows were skipped");
    }

    let result = TransformResult {
        documents: report.documents,
        skipped: report.skipped,
        warnings: report.warnings,
        rows_read: report.rows_read,
        platforms: builder.platforms().clone(),
        data_source: config.data_source.clone(),
        elapsed: start.elapsed(),
    };

    info!(
        documents = result.documents.len(),
        rows_read = result.rows_read,
        skipped = result.skipped.len(),
        warnings = result.warnings.len(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "transform complete"
    );

    progress.done(&result);
    Ok(result)
}
