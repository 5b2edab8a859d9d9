use crate::error::{Result, StoreError};
use crate::storage::{CanonicalStore, InsertOutcome};
use crate::types::CleanRecord;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

/// Counts from one merge pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub skipped: usize,
    pub skipped_keys: Vec<String>,
    /// Skips that surfaced as a duplicate-key race rather than a clean no-op
    pub races_absorbed: usize,
}

/// Insert-if-absent merge keyed on `provider_booking_id`.
///
/// This is the only stage that is idempotent against the canonical store, so rerunning
/// the whole pipeline after a failure converges on the same end state.
pub struct IdempotentMerge;

impl IdempotentMerge {
    #[instrument(skip(records, store), fields(records = records.len()))]
    pub async fn merge(records: &[CleanRecord], store: &dyn CanonicalStore) -> Result<MergeReport> {
        // Fail before touching anything if the store cannot be reached
        let existing = store.count().await?;
        debug!("Canonical store holds {} records before merge", existing);

        let mut report = MergeReport::default();
        for record in records {
            match store.insert_if_absent(record).await {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted += 1;
                }
                Ok(InsertOutcome::AlreadyPresent) => {
                    report.skipped += 1;
                    report.skipped_keys.push(record.provider_booking_id.clone());
                }
                Err(StoreError::DuplicateKey(key)) => {
                    debug!("Concurrent insert won for {}; treating as present", key);
                    report.skipped += 1;
                    report.races_absorbed += 1;
                    report.skipped_keys.push(key);
                }
                Err(e) => {
                    error!(
                        "Merge aborted after {} inserts and {} skips: {}",
                        report.inserted, report.skipped, e
                    );
                    return Err(e.into());
                }
            }
        }

        counter!("etl_records_inserted_total").increment(report.inserted as u64);
        counter!("etl_records_skipped_total").increment(report.skipped as u64);
        if report.races_absorbed > 0 {
            warn!("{} duplicate-key races absorbed during merge", report.races_absorbed);
        }
        info!(
            "Merged {} records: {} inserted, {} already present",
            records.len(),
            report.inserted,
            report.skipped
        );
        Ok(report)
    }
}
