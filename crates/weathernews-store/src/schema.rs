//! Database schema and migrations.
//!
//! The schema version lives in SQLite's `user_version` pragma. Migration *n*
//! in [`MIGRATIONS`] takes the database from version *n* to *n + 1*.

use rusqlite::Connection;

use crate::error::Result;

/// Ordered migration scripts.
///
/// `date` holds the Unix timestamp of UTC midnight; the UNIQUE constraint is
/// what makes `INSERT OR REPLACE` overwrite an existing day.
const MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS forecasts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date INTEGER NOT NULL UNIQUE,
        condition_id INTEGER NOT NULL,
        min_temp REAL NOT NULL,
        max_temp REAL NOT NULL,
        humidity REAL NOT NULL,
        pressure REAL NOT NULL,
        wind_speed REAL NOT NULL,
        wind_direction REAL NOT NULL
    );
"#];

/// Schema version of a fully migrated database.
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the schema up to [`SCHEMA_VERSION`].
pub fn initialize(conn: &Connection) -> Result<()> {
    let mut version = user_version(conn)?;

    while version < SCHEMA_VERSION {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(MIGRATIONS[version as usize])?;
        tx.pragma_update(None, "user_version", version + 1)?;
        tx.commit()?;
        version += 1;
        tracing::debug!("Migrated forecast schema to version {}", version);
    }

    Ok(())
}

fn user_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
