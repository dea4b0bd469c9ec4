//! Writes documents to disk for inspection or bulk import.

use std::path::Path;

use tracing::{info, instrument};

use pricedoc_shared::{OutputFormat, PriceDocError, PriceDocument, Result};

/// Serialize documents in the given format.
///
/// `json` yields a pretty-printed array, `jsonl` one compact document per
/// line (with a trailing newline when non-empty).
pub fn render(documents: &[PriceDocument], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(documents)?),
        OutputFormat::Jsonl => {
            let mut out = String::new();
            for doc in documents {
                out.push_str(&serde_json::to_string(doc)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// Write the first `sample` documents (all when `None`) to `path`.
///
/// Parent directories are created as needed. Returns the number written.
#[instrument(skip_all, fields(path = %path.display(), total = documents.len(), format = ?format))]
pub fn write_documents(
    path: &Path,
    documents: &[PriceDocument],
    format: OutputFormat,
    sample: Option<usize>,
) -> Result<usize> {
    let count = sample.map_or(documents.len(), |n| n.min(documents.len()));
    let content = render(&documents[..count], format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PriceDocError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| PriceDocError::io(path, e))?;

    info!(count, "documents written");
    Ok(count)
}
