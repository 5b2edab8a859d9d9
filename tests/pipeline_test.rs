use anyhow::Result;
use async_trait::async_trait;
use provider_bookings_etl::pipeline::processing::{IdempotentMerge, RecordCleaner};
use provider_bookings_etl::pipeline::{PipelineConfig, PipelineOrchestrator, RetryPolicy};
use provider_bookings_etl::storage::{CanonicalStore, InMemoryStore, InsertOutcome, RawStore};
use provider_bookings_etl::{CanonicalRecord, CleanRecord, EtlError, RawRecord, RejectReason, StoreError};
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

const HEADER: &str = "provider_booking_id,booking_id,booking_timestamp,adults,children,infants,departure_geonode_id,arrival_geonode_id,booking_price,dep_date,is_edreams_merchant,booking_currency";

fn csv_file(rows: &[&str]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{}", HEADER)?;
    for row in rows {
        writeln!(file, "{}", row)?;
    }
    file.flush()?;
    Ok(file)
}

fn orchestrator(store: &InMemoryStore) -> PipelineOrchestrator {
    PipelineOrchestrator::new(Arc::new(store.clone()), Arc::new(store.clone()))
}

const ROWS: [&str; 6] = [
    "P1,B1,2025-05-07 10:00:00,2,0,0,1147415,1147417,\"$1,234.56\",2025-06-01,true,EUR",
    "P2,B2,2025-05-07 11:30:00,1,1,0,1147415,1147420,EUR 12.00,2025-06-03,false,EUR",
    "P3,B3,2025-05-08 09:00:00,1,0,1,1147420,1147415,99.90,2025-07-10,true,USD",
    // Exact duplicate of the first row
    "P1,B1,2025-05-07 10:00:00,2,0,0,1147415,1147417,\"$1,234.56\",2025-06-01,true,EUR",
    // Missing booking_id
    "P4,,2025-05-08 09:00:00,1,0,0,1,2,10.00,2025-07-10,true,USD",
    "P5,B5,2025-05-09 12:00:00,3,0,0,1147415,1147430,30.00,2025-08-01,true,EUR",
];

#[tokio::test]
async fn running_twice_matches_running_once() -> Result<()> {
    let input = csv_file(&ROWS)?;
    let config = PipelineConfig::full(input.path());

    let once = InMemoryStore::new();
    orchestrator(&once).run(&config).await?;

    let twice = InMemoryStore::new();
    let first = orchestrator(&twice).run(&config).await?;
    let second = orchestrator(&twice).run(&config).await?;

    assert_eq!(first.inserted(), 4);
    assert_eq!(second.inserted(), 0);
    assert_eq!(second.skipped(), 4);
    assert_eq!(once.list().await?, twice.list().await?);
    Ok(())
}

#[tokio::test]
async fn canonical_keys_stay_unique_across_overlapping_inputs() -> Result<()> {
    let store = InMemoryStore::new();
    let first = csv_file(&ROWS[..3])?;
    let overlapping = csv_file(&[
        // Same key as P2 with a different price: the stored row must not change
        "P2,B2,2025-05-07 11:30:00,1,1,0,1147415,1147420,EUR 15.00,2025-06-03,false,EUR",
        ROWS[5],
    ])?;

    orchestrator(&store).run(&PipelineConfig::full(first.path())).await?;
    let execution = orchestrator(&store).run(&PipelineConfig::full(overlapping.path())).await?;
    assert_eq!(execution.inserted(), 1);
    assert_eq!(execution.skipped(), 1);

    let records = store.list().await?;
    let keys: HashSet<&str> = records.iter().map(|r| r.provider_booking_id.as_str()).collect();
    assert_eq!(keys.len(), records.len());
    assert_eq!(records.len(), 4);

    let p2 = store.get("P2").await?.expect("P2 present");
    assert_eq!(p2.booking_price.to_string(), "12.00");
    Ok(())
}

#[tokio::test]
async fn required_keys_and_duplicates_are_handled() -> Result<()> {
    let input = csv_file(&ROWS)?;
    let store = InMemoryStore::new();
    let execution = orchestrator(&store).run(&PipelineConfig::full(input.path())).await?;

    let cleaned = execution.cleaned.expect("clean stage ran");
    assert_eq!(cleaned.rows_read, 6);
    assert_eq!(cleaned.duplicates_removed, 1);
    assert!(cleaned.records.iter().all(|r| r.provider_booking_id != "P4"));
    assert_eq!(cleaned.rejections.len(), 1);
    assert_eq!(
        cleaned.rejections[0].reason,
        RejectReason::MissingRequiredKey {
            field: "booking_id".to_string()
        }
    );
    assert_eq!(store.count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn new_existing_and_malformed_rows_in_one_batch() -> Result<()> {
    let row_a = "P1,B1,2025-05-07 10:00:00,2,0,0,1147415,1147417,120.00,2025-06-01,true,EUR";
    let row_b = "P2,B2,2025-05-07 11:30:00,1,1,0,1147415,1147420,EUR 12.00,2025-06-03,false,EUR";
    let row_c = "P3,B3,2025-05-08 09:00:00,1,0,1,1147420,1147415,n/a,2025-07-10,true,USD";

    // P2 is already canonical from an earlier run
    let store = InMemoryStore::new();
    let earlier = csv_file(&[row_b])?;
    orchestrator(&store).run(&PipelineConfig::full(earlier.path())).await?;
    assert_eq!(store.count().await?, 1);

    let input = csv_file(&[row_a, row_b, row_c])?;
    let execution = orchestrator(&store).run(&PipelineConfig::full(input.path())).await?;

    assert_eq!(execution.inserted(), 1);
    assert_eq!(execution.skipped(), 1);
    assert_eq!(execution.rejected(), 1);

    let merge = execution.merge.as_ref().expect("merge ran");
    assert_eq!(merge.skipped_keys, vec!["P2".to_string()]);

    let cleaned = execution.cleaned.as_ref().expect("clean ran");
    let rejection = &cleaned.rejections[0];
    assert_eq!(rejection.line, 3);
    assert_eq!(rejection.provider_booking_id.as_deref(), Some("P3"));
    assert!(matches!(rejection.reason, RejectReason::MalformedCurrency(_)));

    assert!(store.get("P1").await?.is_some());
    assert!(store.get("P3").await?.is_none());
    assert_eq!(store.count().await?, 2);
    Ok(())
}

/// Fails every insert after the first `allowed`, as if the connection dropped mid-batch.
struct FlakyStore {
    inner: InMemoryStore,
    allowed: AtomicUsize,
}

#[async_trait]
impl RawStore for FlakyStore {
    async fn replace_raw(&self, rows: &[RawRecord]) -> std::result::Result<usize, StoreError> {
        self.inner.replace_raw(rows).await
    }
    async fn load_raw(&self) -> std::result::Result<Vec<RawRecord>, StoreError> {
        self.inner.load_raw().await
    }
}

#[async_trait]
impl CanonicalStore for FlakyStore {
    async fn ensure_canonical(&self) -> std::result::Result<(), StoreError> {
        self.inner.ensure_canonical().await
    }
    async fn insert_if_absent(
        &self,
        record: &CleanRecord,
    ) -> std::result::Result<InsertOutcome, StoreError> {
        let remaining = self.allowed.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.allowed.store(remaining - 1, Ordering::SeqCst);
        self.inner.insert_if_absent(record).await
    }
    async fn get(&self, key: &str) -> std::result::Result<Option<CanonicalRecord>, StoreError> {
        self.inner.get(key).await
    }
    async fn count(&self) -> std::result::Result<usize, StoreError> {
        self.inner.count().await
    }
    async fn list(&self) -> std::result::Result<Vec<CanonicalRecord>, StoreError> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn rerun_after_partial_merge_converges() -> Result<()> {
    let input = csv_file(&ROWS)?;
    let config = PipelineConfig::full(input.path()).with_retry(RetryPolicy {
        max_attempts: 1,
        backoff_ms: 0,
    });

    let uninterrupted = InMemoryStore::new();
    orchestrator(&uninterrupted).run(&config).await?;

    let recovered = InMemoryStore::new();
    let flaky = Arc::new(FlakyStore {
        inner: recovered.clone(),
        allowed: AtomicUsize::new(2),
    });
    let failing = PipelineOrchestrator::new(flaky.clone(), flaky);
    let err = failing.run(&config).await.unwrap_err();
    assert!(matches!(err, EtlError::StoreUnavailable(_)));
    assert_eq!(recovered.count().await?, 2);

    orchestrator(&recovered).run(&config).await?;
    assert_eq!(recovered.list().await?, uninterrupted.list().await?);
    Ok(())
}

#[tokio::test]
async fn driver_finishes_a_batch_after_a_transient_store_failure() -> Result<()> {
    let input = csv_file(&ROWS)?;
    let config = PipelineConfig::full(input.path()).with_retry(RetryPolicy {
        max_attempts: 3,
        backoff_ms: 1,
    });

    let inner = InMemoryStore::new();
    let flaky = Arc::new(FlakyStore {
        inner: inner.clone(),
        allowed: AtomicUsize::new(3),
    });
    // Three inserts land before the store drops; the next run finishes the batch
    let orchestrator = PipelineOrchestrator::new(flaky.clone(), flaky.clone());
    let first = orchestrator.run(&config).await;
    assert!(first.is_err());
    flaky.allowed.store(usize::MAX, Ordering::SeqCst);

    let execution = orchestrator.run_with_retries(&config).await?;
    assert_eq!(execution.attempts, 1);
    assert_eq!(execution.inserted(), 1);
    assert_eq!(execution.skipped(), 3);
    assert_eq!(inner.count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn stages_compose_without_the_driver() -> Result<()> {
    let store = InMemoryStore::new();
    let raw: Vec<RawRecord> = ROWS
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_reader(row.as_bytes());
            let record = reader.records().next().unwrap().unwrap();
            RawRecord::new(i as u64 + 1, record.iter().map(str::to_string).collect())
        })
        .collect();

    store.replace_raw(&raw).await?;
    let outcome = RecordCleaner::clean(&store.load_raw().await?);
    store.ensure_canonical().await?;
    let report = IdempotentMerge::merge(&outcome.records, &store).await?;

    assert_eq!(report.inserted, 4);
    assert_eq!(outcome.rejected_count(), 1);
    Ok(())
}
