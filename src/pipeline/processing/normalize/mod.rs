//! Field normalizers used by the record cleaner.
//!
//! Each normalizer is a pure function from raw text to a typed value, returning a
//! distinguishable error so the cleaner can reject the row instead of failing the batch.

pub mod currency;
pub mod fields;

pub use currency::{normalize_currency, MalformedCurrencyError};
pub use fields::{parse_count, parse_identifier, parse_timestamp, FieldError};
