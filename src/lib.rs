//! Provider booking ETL: stage a raw booking extract, clean and type it, and merge it
//! into a canonical table that never receives the same `provider_booking_id` twice.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use error::{EtlError, Result, StoreError};
pub use pipeline::processing::normalize::{normalize_currency, MalformedCurrencyError};
pub use pipeline::{PipelineConfig, PipelineOrchestrator, Stage};
pub use types::{CanonicalRecord, CleanRecord, RawRecord, RejectReason, Rejection};
