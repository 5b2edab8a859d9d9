use crate::constants;
use crate::pipeline::processing::normalize::MalformedCurrencyError;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One data row of the input file, kept exactly as read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// 1-based data line number (the header is not counted)
    pub line: u64,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    /// Value at a column position; None when the row is short.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        constants::column_index(name).and_then(|i| self.get(i))
    }
}

/// Typed booking row produced by the cleaner and persisted by the merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CleanRecord {
    pub provider_booking_id: String,
    pub booking_id: String,
    pub booking_timestamp: Option<NaiveDateTime>,
    pub adults: Option<u32>,
    pub children: Option<u32>,
    pub infants: Option<u32>,
    pub departure_geonode_id: Option<i64>,
    pub arrival_geonode_id: Option<i64>,
    pub booking_price: Decimal,
    pub dep_date: Option<String>,
    pub is_edreams_merchant: Option<String>,
    pub booking_currency: Option<String>,
}

/// Once merged a record is never rewritten by the pipeline.
pub type CanonicalRecord = CleanRecord;

/// Why a single row was kept out of the cleaned set.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("missing required key: {field}")]
    MissingRequiredKey { field: String },

    #[error("type coercion failed for {field} ('{value}'): {message}")]
    TypeCoercion {
        field: String,
        value: String,
        message: String,
    },

    #[error(transparent)]
    MalformedCurrency(#[from] MalformedCurrencyError),
}

impl RejectReason {
    /// Stable label used for metrics and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::MissingRequiredKey { .. } => "missing_required_key",
            RejectReason::TypeCoercion { .. } => "type_coercion",
            RejectReason::MalformedCurrency(_) => "malformed_currency",
        }
    }
}

/// A rejected row with enough context to route it to a rejection sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub line: u64,
    pub provider_booking_id: Option<String>,
    pub reason: RejectReason,
}
