use super::fingerprint::compute_fingerprint;
use crate::constants::COLUMNS;
use crate::error::{EtlError, Result};
use crate::storage::RawStore;
use crate::types::RawRecord;
use csv::{ReaderBuilder, Trim};
use metrics::counter;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Everything read from one input file
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub source: String,
    pub header: Vec<String>,
    pub records: Vec<RawRecord>,
    pub fingerprint: String,
}

/// What the load stage reports back to the driver
#[derive(Debug, Clone, Serialize)]
pub struct RawLoadReport {
    pub source: String,
    pub rows_loaded: usize,
    pub fingerprint: String,
}

pub struct RawLoader;

impl RawLoader {
    /// Read a comma-delimited file with a header row. Field text is kept exactly as
    /// written; ragged rows are kept as they are.
    #[instrument]
    pub fn load(path: &Path) -> Result<RawBatch> {
        let bytes = fs::read(path).map_err(|source| EtlError::Input {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(path.display().to_string(), &bytes)
    }

    pub fn from_bytes(source: String, bytes: &[u8]) -> Result<RawBatch> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::None)
            .from_reader(bytes);

        let header: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();
        check_header(&source, &header);

        let mut records = Vec::new();
        for (i, result) in reader.byte_records().enumerate() {
            let record = result?;
            let fields = record
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect();
            records.push(RawRecord::new(i as u64 + 1, fields));
        }

        Ok(RawBatch {
            source,
            header,
            records,
            fingerprint: compute_fingerprint(bytes),
        })
    }

    /// Load `path` and replace the staging container with its rows.
    #[instrument(skip(raw_store))]
    pub async fn stage(path: &Path, raw_store: &dyn RawStore) -> Result<RawLoadReport> {
        let batch = Self::load(path)?;
        let rows_loaded = raw_store.replace_raw(&batch.records).await?;
        counter!("etl_raw_rows_loaded_total").increment(rows_loaded as u64);
        info!(
            fingerprint = %batch.fingerprint,
            "Staged {} raw rows from {}", rows_loaded, batch.source
        );
        Ok(RawLoadReport {
            source: batch.source,
            rows_loaded,
            fingerprint: batch.fingerprint,
        })
    }
}

/// Columns bind by position; a header that disagrees is worth a warning, not a failure.
fn check_header(source: &str, header: &[String]) {
    if header.is_empty() {
        warn!("{} has no header row", source);
        return;
    }
    let matches = header.len() == COLUMNS.len()
        && header
            .iter()
            .zip(COLUMNS.iter())
            .all(|(h, c)| h.trim().eq_ignore_ascii_case(c));
    if !matches {
        warn!(
            expected = %COLUMNS.join(","),
            found = %header.join(","),
            "Header of {} does not match the expected columns", source
        );
    }
}
