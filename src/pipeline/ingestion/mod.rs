// Pipeline ingestion: reading the booking extract into raw staging

pub mod fingerprint;
pub mod raw_loader;

pub use fingerprint::compute_fingerprint;
pub use raw_loader::{RawBatch, RawLoadReport, RawLoader};
