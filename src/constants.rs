//! Column and table names shared by the loader, the cleaner and the stores.
//! The input file, the raw staging table and the canonical table all use this order.

pub const PROVIDER_BOOKING_ID: &str = "provider_booking_id";
pub const BOOKING_ID: &str = "booking_id";
pub const BOOKING_TIMESTAMP: &str = "booking_timestamp";
pub const ADULTS: &str = "adults";
pub const CHILDREN: &str = "children";
pub const INFANTS: &str = "infants";
pub const DEPARTURE_GEONODE_ID: &str = "departure_geonode_id";
pub const ARRIVAL_GEONODE_ID: &str = "arrival_geonode_id";
pub const BOOKING_PRICE: &str = "booking_price";
pub const DEP_DATE: &str = "dep_date";
pub const IS_EDREAMS_MERCHANT: &str = "is_edreams_merchant";
pub const BOOKING_CURRENCY: &str = "booking_currency";

pub const COLUMNS: [&str; 12] = [
    PROVIDER_BOOKING_ID,
    BOOKING_ID,
    BOOKING_TIMESTAMP,
    ADULTS,
    CHILDREN,
    INFANTS,
    DEPARTURE_GEONODE_ID,
    ARRIVAL_GEONODE_ID,
    BOOKING_PRICE,
    DEP_DATE,
    IS_EDREAMS_MERCHANT,
    BOOKING_CURRENCY,
];

pub const RAW_TABLE: &str = "provider_bookings_raw";
pub const CANONICAL_TABLE: &str = "provider_booking";

// Defaults used when etl.toml / environment leave a setting out
pub const DEFAULT_CONFIG_PATH: &str = "etl.toml";
pub const DEFAULT_INPUT_PATH: &str = "data/provider_booking.csv";
pub const DEFAULT_DATABASE_PATH: &str = "data/provider_bookings.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "etl.log";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Position of a named column, or None for names outside the schema
pub fn column_index(name: &str) -> Option<usize> {
    COLUMNS.iter().position(|c| *c == name)
}
