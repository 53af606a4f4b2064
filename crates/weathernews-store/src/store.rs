//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Statement};
use time::Date;
use tracing::{debug, info};

use weathernews_types::{ForecastRecord, ForecastSummary, dates};

use crate::error::{Error, Result};
use crate::queries::ForecastQuery;
use crate::schema;

const RECORD_COLUMNS: &str = "id, date, condition_id, min_temp, max_temp, humidity, pressure, \
                              wind_speed, wind_direction";

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO forecasts (date, condition_id, min_temp, \
                          max_temp, humidity, pressure, wind_speed, wind_direction) \
                          VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// SQLite-based store for cached forecasts.
///
/// Holds at most one row per calendar day. Writes replace rather than fail
/// on a date conflict.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening forecast database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

// Write operations
impl Store {
    /// Insert or replace the record for `record.date`.
    ///
    /// Returns the new row id. An existing row for the same day is removed
    /// and replaced, so the row id changes.
    pub fn upsert(&self, record: &ForecastRecord) -> Result<i64> {
        let mut stmt = self.conn.prepare_cached(UPSERT_SQL)?;
        execute_upsert(&mut stmt, record)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Upsert many records in one transaction.
    pub fn bulk_insert(&self, records: &[ForecastRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = insert_all(&tx, records)?;
        tx.commit()?;

        debug!("Bulk inserted {} forecasts", inserted);
        Ok(inserted)
    }

    /// Delete every record, then insert `records`, as one transaction.
    ///
    /// Readers on other connections see either the old set or the new set,
    /// never the empty table in between.
    pub fn replace_all(&self, records: &[ForecastRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM forecasts", [])?;
        let inserted = insert_all(&tx, records)?;
        tx.commit()?;

        info!(
            "Replaced forecast cache: {} old rows deleted, {} new rows inserted",
            deleted, inserted
        );
        Ok(inserted)
    }

    /// Remove every record. Returns the number of rows deleted.
    pub fn delete_all(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM forecasts", [])?;
        debug!("Deleted {} forecasts", deleted);
        Ok(deleted)
    }
}

// Read operations
impl Store {
    /// Exact-day lookup.
    pub fn get_by_date(&self, date: Date) -> Result<Option<ForecastRecord>> {
        let sql = format!("SELECT {} FROM forecasts WHERE date = ?", RECORD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        let record = stmt
            .query_row([dates::to_timestamp(date)], record_from_row)
            .optional()?;

        Ok(record)
    }

    /// Summaries for every day on or after `date`, soonest first.
    pub fn get_from(&self, date: Date) -> Result<Vec<ForecastSummary>> {
        self.query(&ForecastQuery::new().since(date))
    }

    /// Number of days on or after `date`.
    pub fn count_from(&self, date: Date) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(id) FROM forecasts WHERE date >= ?",
            [dates::to_timestamp(date)],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Total number of stored days.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(id) FROM forecasts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Query summaries with filters.
    pub fn query(&self, query: &ForecastQuery) -> Result<Vec<ForecastSummary>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok(ForecastSummary {
                    id: row.get(0)?,
                    condition_id: row.get(1)?,
                    date: date_column(row, 2)?,
                    min_temp: row.get(3)?,
                    max_temp: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    /// Every stored record, soonest first.
    pub fn list_all(&self) -> Result<Vec<ForecastRecord>> {
        let sql = format!("SELECT {} FROM forecasts ORDER BY date ASC", RECORD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        let records = stmt
            .query_map([], record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

fn insert_all(conn: &Connection, records: &[ForecastRecord]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(UPSERT_SQL)?;
    let mut inserted = 0;
    for record in records {
        inserted += execute_upsert(&mut stmt, record)?;
    }
    Ok(inserted)
}

fn execute_upsert(stmt: &mut Statement<'_>, record: &ForecastRecord) -> rusqlite::Result<usize> {
    stmt.execute(rusqlite::params![
        dates::to_timestamp(record.date),
        record.condition_id,
        record.min_temp,
        record.max_temp,
        record.humidity,
        record.pressure,
        record.wind_speed,
        record.wind_direction_degrees,
    ])
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Date> {
    let ts: i64 = row.get(idx)?;
    dates::from_timestamp(ts)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ForecastRecord> {
    Ok(ForecastRecord {
        id: row.get(0)?,
        date: date_column(row, 1)?,
        condition_id: row.get(2)?,
        min_temp: row.get(3)?,
        max_temp: row.get(4)?,
        humidity: row.get(5)?,
        pressure: row.get(6)?,
        wind_speed: row.get(7)?,
        wind_direction_degrees: row.get(8)?,
    })
}
