use crate::constants;
use crate::pipeline::processing::normalize::{
    normalize_currency, parse_count, parse_identifier, parse_timestamp, FieldError,
};
use crate::types::{CleanRecord, RawRecord, RejectReason, Rejection};
use metrics::counter;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

/// Output of a cleaning pass: the typed, de-duplicated rows plus every rejected row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanOutcome {
    pub rows_read: usize,
    pub records: Vec<CleanRecord>,
    pub rejections: Vec<Rejection>,
    pub duplicates_removed: usize,
}

impl CleanOutcome {
    pub fn rejected_count(&self) -> usize {
        self.rejections.len()
    }

    /// Rejection totals keyed by reason kind
    pub fn rejections_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut totals = BTreeMap::new();
        for rejection in &self.rejections {
            *totals.entry(rejection.reason.kind()).or_insert(0) += 1;
        }
        totals
    }
}

/// Turns staged text rows into typed records.
pub struct RecordCleaner;

impl RecordCleaner {
    /// Clean the whole staged batch. Bad rows are accumulated, never raised.
    #[instrument(skip(raw), fields(rows = raw.len()))]
    pub fn clean(raw: &[RawRecord]) -> CleanOutcome {
        let mut typed = Vec::with_capacity(raw.len());
        let mut rejections = Vec::new();

        for row in raw {
            match Self::clean_row(row) {
                Ok(record) => typed.push(record),
                Err(reason) => {
                    debug!(line = row.line, reason = %reason, "Rejected row");
                    counter!("etl_rows_rejected_total", "reason" => reason.kind()).increment(1);
                    rejections.push(Rejection {
                        line: row.line,
                        provider_booking_id: row
                            .field(constants::PROVIDER_BOOKING_ID)
                            .filter(|v| !v.trim().is_empty())
                            .map(str::to_string),
                        reason,
                    });
                }
            }
        }

        let typed_count = typed.len();
        let records = dedup_first_wins(typed);
        let duplicates_removed = typed_count - records.len();

        info!(
            "Cleaned {} rows: {} kept, {} duplicates removed, {} rejected",
            raw.len(),
            records.len(),
            duplicates_removed,
            rejections.len()
        );

        CleanOutcome {
            rows_read: raw.len(),
            records,
            rejections,
            duplicates_removed,
        }
    }

    /// Coerce a single row, stopping at the first field that does not fit.
    pub fn clean_row(row: &RawRecord) -> Result<CleanRecord, RejectReason> {
        let provider_booking_id = required_key(row, constants::PROVIDER_BOOKING_ID)?;
        let booking_id = required_key(row, constants::BOOKING_ID)?;

        let booking_timestamp = coerce(row, constants::BOOKING_TIMESTAMP, parse_timestamp)?;
        let adults = coerce(row, constants::ADULTS, parse_count)?;
        let children = coerce(row, constants::CHILDREN, parse_count)?;
        let infants = coerce(row, constants::INFANTS, parse_count)?;
        let departure_geonode_id = coerce(row, constants::DEPARTURE_GEONODE_ID, parse_identifier)?;
        let arrival_geonode_id = coerce(row, constants::ARRIVAL_GEONODE_ID, parse_identifier)?;

        let booking_price = normalize_currency(row.field(constants::BOOKING_PRICE).unwrap_or(""))?;
        if booking_price.is_sign_negative() && !booking_price.is_zero() {
            return Err(RejectReason::TypeCoercion {
                field: constants::BOOKING_PRICE.to_string(),
                value: row.field(constants::BOOKING_PRICE).unwrap_or("").to_string(),
                message: "must be non-negative".to_string(),
            });
        }

        Ok(CleanRecord {
            provider_booking_id,
            booking_id,
            booking_timestamp,
            adults,
            children,
            infants,
            departure_geonode_id,
            arrival_geonode_id,
            booking_price,
            dep_date: passthrough(row, constants::DEP_DATE),
            is_edreams_merchant: passthrough(row, constants::IS_EDREAMS_MERCHANT),
            booking_currency: passthrough(row, constants::BOOKING_CURRENCY),
        })
    }
}

fn required_key(row: &RawRecord, field: &str) -> Result<String, RejectReason> {
    match row.field(field) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(RejectReason::MissingRequiredKey {
            field: field.to_string(),
        }),
    }
}

fn coerce<T>(
    row: &RawRecord,
    field: &str,
    parse: fn(&str) -> Result<Option<T>, FieldError>,
) -> Result<Option<T>, RejectReason> {
    let value = row.field(field).unwrap_or("");
    parse(value).map_err(|e| RejectReason::TypeCoercion {
        field: field.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

fn passthrough(row: &RawRecord, field: &str) -> Option<String> {
    row.field(field)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Collapse rows equal in every field, keeping the earliest by input order.
fn dedup_first_wins(records: Vec<CleanRecord>) -> Vec<CleanRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect()
}
