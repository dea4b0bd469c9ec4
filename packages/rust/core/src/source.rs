//! CSV record source.
//!
//! Reads the header once, resolves configured column names to positions,
//! and yields one [`InputRecord`] per data row. Every cell is kept as an
//! optional raw string; numeric coercion is the builder's job.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use pricedoc_shared::{ColumnsConfig, PlatformSet, PriceDocError, Result};

// ---------------------------------------------------------------------------
// InputRecord
// ---------------------------------------------------------------------------

/// One flat row from the source, before any coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputRecord {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    pub sku: Option<String>,
    pub style_id: Option<String>,
    pub catalog: Option<String>,
    pub category: Option<String>,
    pub size: Option<String>,
    pub weight: Option<String>,
    pub tp: Option<String>,
    pub mrp_old: Option<String>,
    pub final_mrp_old: Option<String>,
    /// Platform price cells keyed by column header.
    platform_cells: HashMap<String, String>,
}

impl InputRecord {
    pub fn new(row: usize) -> Self {
        Self {
            row,
            ..Self::default()
        }
    }

    /// Set the raw cell for a platform column.
    pub fn set_platform_cell(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.platform_cells.insert(column.into(), value.into());
    }

    /// Raw cell for a platform column; `None` when the row lacks it.
    pub fn platform_cell(&self, column: &str) -> Option<&str> {
        self.platform_cells.get(column).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// RecordReader
// ---------------------------------------------------------------------------

/// Header positions of the fixed columns. `None` means the header lacks it.
#[derive(Debug, Clone, Default)]
struct ColumnPositions {
    sku: Option<usize>,
    style_id: Option<usize>,
    catalog: Option<usize>,
    category: Option<usize>,
    size: Option<usize>,
    weight: Option<usize>,
    tp: Option<usize>,
    mrp_old: Option<usize>,
    final_mrp_old: Option<usize>,
}

/// CSV reader bound to a header and a column mapping.
pub struct RecordReader<R> {
    reader: csv::Reader<R>,
    source: PathBuf,
    headers: Vec<String>,
    positions: ColumnPositions,
}

impl RecordReader<File> {
    /// Open a CSV file and read its header.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, delimiter: u8, columns: &ColumnsConfig) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| PriceDocError::source_read(path, format!("cannot open file: {e}")))?;
        Self::from_reader(file, delimiter, columns, path)
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap any reader. `source` is only used to label errors.
    pub fn from_reader(
        input: R,
        delimiter: u8,
        columns: &ColumnsConfig,
        source: impl Into<PathBuf>,
    ) -> Result<Self> {
        let source = source.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PriceDocError::source_read(&source, e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let position = |name: &str| -> Option<usize> {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            headers.iter().position(|h| h == name)
        };

        let positions = ColumnPositions {
            sku: position(&columns.sku),
            style_id: position(&columns.style_id),
            catalog: position(&columns.catalog),
            category: position(&columns.category),
            size: position(&columns.size),
            weight: position(&columns.weight),
            tp: position(&columns.tp),
            mrp_old: position(&columns.mrp_old),
            final_mrp_old: position(&columns.final_mrp_old),
        };

        if positions.sku.is_none() && positions.style_id.is_none() {
            return Err(PriceDocError::source_read(
                &source,
                format!(
                    "missing header: neither '{}' nor '{}' column found",
                    columns.sku, columns.style_id
                ),
            ));
        }

        debug!(columns = headers.len(), "header resolved");

        Ok(Self {
            reader,
            source,
            headers,
            positions,
        })
    }

    /// Trimmed header names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Count the platforms whose column is in the header.
    ///
    /// Missing columns are logged. Fails when none match, since every
    /// document would come out without prices.
    pub fn matched_platforms(&self, platforms: &PlatformSet) -> Result<usize> {
        let (present, missing): (Vec<_>, Vec<_>) = platforms
            .iter()
            .partition(|p| self.headers.iter().any(|h| *h == p.column));

        if present.is_empty() {
            return Err(PriceDocError::validation(format!(
                "none of the platform columns [{}] appear in the header of {}",
                platforms
                    .iter()
                    .map(|p| p.column.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.source.display()
            )));
        }

        for platform in missing {
            warn!(
                platform = %platform.name,
                column = %platform.column,
                "platform column not in header; its prices will be absent"
            );
        }

        Ok(present.len())
    }

    /// Iterate data rows, reading the given platforms' columns.
    ///
    /// Platforms whose column is absent from the header read as absent on
    /// every row.
    pub fn records<'a>(&'a mut self, platforms: &PlatformSet) -> Records<'a, R> {
        let mut platform_positions = Vec::with_capacity(platforms.len());
        for platform in platforms {
            match self.headers.iter().position(|h| *h == platform.column) {
                Some(pos) => platform_positions.push((platform.column.clone(), pos)),
                None => debug!(
                    platform = %platform.name,
                    column = %platform.column,
                    "platform column not in header"
                ),
            }
        }

        let Self {
            reader,
            source,
            positions,
            ..
        } = self;

        Records {
            inner: reader.records(),
            source: source.as_path(),
            positions: &*positions,
            platform_positions,
            row: 0,
        }
    }
}

/// Iterator over [`InputRecord`]s. A decode failure is fatal for the batch.
pub struct Records<'a, R> {
    inner: csv::StringRecordsIter<'a, R>,
    source: &'a Path,
    positions: &'a ColumnPositions,
    platform_positions: Vec<(String, usize)>,
    row: usize,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<InputRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.inner.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(PriceDocError::source_read(self.source, e.to_string()))),
        };
        self.row += 1;

        let cell = |pos: Option<usize>| -> Option<String> {
            pos.and_then(|p| record.get(p))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let p = self.positions;
        let mut input = InputRecord {
            row: self.row,
            sku: cell(p.sku),
            style_id: cell(p.style_id),
            catalog: cell(p.catalog),
            category: cell(p.category),
            size: cell(p.size),
            weight: cell(p.weight),
            tp: cell(p.tp),
            mrp_old: cell(p.mrp_old),
            final_mrp_old: cell(p.final_mrp_old),
            platform_cells: HashMap::new(),
        };

        for (column, pos) in &self.platform_positions {
            if let Some(value) = cell(Some(*pos)) {
                input.set_platform_cell(column.clone(), value);
            }
        }

        Some(Ok(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricedoc_shared::Platform;

    const SAMPLE: &str = "\
Sku,Style Id,Catalog,Category,Weight,TP,MRP Old,Final MRP Old,Ajio MRP,Amazon MRP
Os206_3141_S,Os206_3141,Moments,Kurta,0.3,538,2178,2295,2295,2099
Os206_3141_M,Os206_3141,Moments,Kurta,0.3,538,2178,2295,,
";

    fn platforms() -> PlatformSet {
        PlatformSet::new(vec![
            Platform::new("ajio", "Ajio MRP"),
            Platform::new("amazon", "Amazon MRP"),
            Platform::new("flipkart", "Flipkart MRP"),
        ])
        .expect("platform set")
    }

    #[test]
    fn reads_fixed_and_platform_cells() {
        let mut reader =
            RecordReader::from_reader(SAMPLE.as_bytes(), b',', &ColumnsConfig::default(), "mem")
                .expect("open");
        let platforms = platforms();
        let rows: Vec<InputRecord> = reader
            .records(&platforms)
            .collect::<Result<_>>()
            .expect("read rows");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].sku.as_deref(), Some("Os206_3141_S"));
        assert_eq!(rows[0].style_id.as_deref(), Some("Os206_3141"));
        assert_eq!(rows[0].tp.as_deref(), Some("538"));
        assert_eq!(rows[0].size, None);
        assert_eq!(rows[0].platform_cell("Amazon MRP"), Some("2099"));
        assert_eq!(rows[0].platform_cell("Flipkart MRP"), None);

        assert_eq!(rows[1].row, 2);
        assert_eq!(rows[1].platform_cell("Ajio MRP"), None);
    }

    #[test]
    fn short_rows_read_as_absent() {
        let csv = "Sku,Style Id,TP\nA1\n";
        let mut reader =
            RecordReader::from_reader(csv.as_bytes(), b',', &ColumnsConfig::default(), "mem")
                .expect("open");
        let platforms = platforms();
        let row = reader
            .records(&platforms)
            .next()
            .expect("one row")
            .expect("valid row");
        assert_eq!(row.sku.as_deref(), Some("A1"));
        assert_eq!(row.style_id, None);
        assert_eq!(row.tp, None);
    }

    #[test]
    fn missing_identifier_headers_is_fatal() {
        let csv = "Catalog,TP\nMoments,538\n";
        let result =
            RecordReader::from_reader(csv.as_bytes(), b',', &ColumnsConfig::default(), "mem");
        let err = result.err().expect("should fail");
        assert!(matches!(err, PriceDocError::SourceRead { .. }));
        assert!(err.to_string().contains("missing header"));
    }

    #[test]
    fn counts_matched_platform_columns() {
        let reader =
            RecordReader::from_reader(SAMPLE.as_bytes(), b',', &ColumnsConfig::default(), "mem")
                .expect("open");
        assert_eq!(reader.matched_platforms(&platforms()).expect("partial match"), 2);
    }

    #[test]
    fn no_matching_platform_columns_is_an_error() {
        let csv = "Sku,Style Id,Meesho Price\nA1,S1,100\n";
        let reader =
            RecordReader::from_reader(csv.as_bytes(), b',', &ColumnsConfig::default(), "mem")
                .expect("open");
        let err = reader.matched_platforms(&platforms()).unwrap_err();
        assert!(matches!(err, PriceDocError::Validation { .. }));
        assert!(err.to_string().contains("Ajio MRP"));
    }

    #[test]
    fn empty_input_is_fatal() {
        let result = RecordReader::from_reader(&b""[..], b',', &ColumnsConfig::default(), "mem");
        assert!(result.is_err());
    }

    #[test]
    fn honors_delimiter_and_header_whitespace() {
        let csv = " Sku ; Style Id ;Ajio MRP\nA1;S1; 100 \n";
        let mut reader =
            RecordReader::from_reader(csv.as_bytes(), b';', &ColumnsConfig::default(), "mem")
                .expect("open");
        assert_eq!(reader.headers(), ["Sku", "Style Id", "Ajio MRP"]);
        let platforms = platforms();
        let row = reader
            .records(&platforms)
            .next()
            .expect("row")
            .expect("valid");
        assert_eq!(row.platform_cell("Ajio MRP"), Some("100"));
    }

    #[test]
    fn invalid_utf8_is_fatal() {
        let mut bytes = b"Sku,Style Id\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b',', b'x', b'\n']);
        let mut reader =
            RecordReader::from_reader(bytes.as_slice(), b',', &ColumnsConfig::default(), "mem")
                .expect("header is valid");
        let platforms = platforms();
        let first = reader.records(&platforms).next().expect("one item");
        assert!(matches!(first, Err(PriceDocError::SourceRead { .. })));
    }

    #[test]
    fn missing_file_is_fatal() {
        let path = std::env::temp_dir().join(format!("pd-missing-{}.csv", uuid::Uuid::now_v7()));
        let err = RecordReader::open(&path, b',', &ColumnsConfig::default())
            .err()
            .expect("missing file");
        assert!(err.to_string().contains("cannot open file"));
    }
}
