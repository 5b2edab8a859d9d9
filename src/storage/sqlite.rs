use super::{CanonicalStore, InsertOutcome, RawStore};
use crate::constants::{self, CANONICAL_TABLE, COLUMNS, RAW_TABLE};
use crate::error::StoreError;
use crate::types::{CanonicalRecord, CleanRecord, RawRecord};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed raw staging and canonical tables.
///
/// Several handles may open the same file; the conditional insert relies on the
/// primary key so concurrent merges cannot both add one key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(format!("{}: {}", parent.display(), e)))?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::configure(conn)
    }

    /// Private database that disappears with the handle
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn raw_table_ddl() -> String {
    let columns: Vec<String> = COLUMNS.iter().map(|c| format!("{} TEXT", c)).collect();
    format!(
        "CREATE TABLE {} (line INTEGER NOT NULL, {})",
        RAW_TABLE,
        columns.join(", ")
    )
}

fn canonical_table_ddl() -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            provider_booking_id  TEXT PRIMARY KEY,
            booking_id           TEXT NOT NULL,
            booking_timestamp    TEXT,
            adults               INTEGER,
            children             INTEGER,
            infants              INTEGER,
            departure_geonode_id INTEGER,
            arrival_geonode_id   INTEGER,
            booking_price        TEXT NOT NULL,
            dep_date             TEXT,
            is_edreams_merchant  TEXT,
            booking_currency     TEXT
        )
        "#,
        CANONICAL_TABLE
    )
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(message)) => {
            e.code == ErrorCode::ConstraintViolation
                && message.contains(constants::PROVIDER_BOOKING_ID)
        }
        _ => false,
    }
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn canonical_from_row(row: &Row<'_>) -> rusqlite::Result<CanonicalRecord> {
    let booking_timestamp = row
        .get::<_, Option<String>>(2)?
        .map(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(|e| conversion_error(2, e)))
        .transpose()?;
    let price: String = row.get(8)?;
    let booking_price = Decimal::from_str(&price).map_err(|e| conversion_error(8, e))?;

    Ok(CanonicalRecord {
        provider_booking_id: row.get(0)?,
        booking_id: row.get(1)?,
        booking_timestamp,
        adults: row.get(3)?,
        children: row.get(4)?,
        infants: row.get(5)?,
        departure_geonode_id: row.get(6)?,
        arrival_geonode_id: row.get(7)?,
        booking_price,
        dep_date: row.get(9)?,
        is_edreams_merchant: row.get(10)?,
        booking_currency: row.get(11)?,
    })
}

#[async_trait]
impl RawStore for SqliteStore {
    async fn replace_raw(&self, rows: &[RawRecord]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", RAW_TABLE))?;
        tx.execute_batch(&raw_table_ddl())?;
        {
            let sql = format!(
                "INSERT INTO {} (line, {}) VALUES ({})",
                RAW_TABLE,
                COLUMNS.join(", "),
                placeholders(COLUMNS.len() + 1)
            );
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                // Short rows store NULL for the missing trailing columns. Extra
                // trailing fields have no column to land in.
                let mut values: Vec<Option<&str>> = Vec::with_capacity(COLUMNS.len() + 1);
                let line = row.line.to_string();
                values.push(Some(line.as_str()));
                values.extend((0..COLUMNS.len()).map(|i| row.get(i)));
                stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;
        info!("Staged {} raw rows into {}", rows.len(), RAW_TABLE);
        Ok(rows.len())
    }

    async fn load_raw(&self) -> Result<Vec<RawRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT line, {} FROM {} ORDER BY line", COLUMNS.join(", "), RAW_TABLE);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let line: i64 = row.get(0)?;
            let mut fields = Vec::with_capacity(COLUMNS.len());
            for i in 0..COLUMNS.len() {
                match row.get::<_, Option<String>>(i + 1)? {
                    Some(value) => fields.push(value),
                    // NULLs only ever come from short rows, so the row ends here
                    None => break,
                }
            }
            Ok(RawRecord::new(line as u64, fields))
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Loaded {} raw rows from {}", records.len(), RAW_TABLE);
        Ok(records)
    }
}

#[async_trait]
impl CanonicalStore for SqliteStore {
    async fn ensure_canonical(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(&canonical_table_ddl())?;
        Ok(())
    }

    async fn insert_if_absent(&self, record: &CleanRecord) -> Result<InsertOutcome, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(provider_booking_id) DO NOTHING",
            CANONICAL_TABLE,
            COLUMNS.join(", "),
            placeholders(COLUMNS.len())
        );
        let timestamp = record
            .booking_timestamp
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string());
        let result = conn.execute(
            &sql,
            params![
                record.provider_booking_id,
                record.booking_id,
                timestamp,
                record.adults,
                record.children,
                record.infants,
                record.departure_geonode_id,
                record.arrival_geonode_id,
                record.booking_price.to_string(),
                record.dep_date,
                record.is_edreams_merchant,
                record.booking_currency,
            ],
        );
        match result {
            Ok(0) => Ok(InsertOutcome::AlreadyPresent),
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::DuplicateKey(record.provider_booking_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, provider_booking_id: &str) -> Result<Option<CanonicalRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE provider_booking_id = ?1",
            COLUMNS.join(", "),
            CANONICAL_TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![provider_booking_id])?;
        let found = match rows.next()? {
            Some(row) => Some(canonical_from_row(row)?),
            None => None,
        };
        Ok(found)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", CANONICAL_TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    async fn list(&self) -> Result<Vec<CanonicalRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY provider_booking_id",
            COLUMNS.join(", "),
            CANONICAL_TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], canonical_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
