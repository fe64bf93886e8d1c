//! Database layer for the clinic core.

mod schema;
mod appointments;
mod consent;
mod packages;
mod patients;
mod stock;
mod treatments;
mod visits;

pub use schema::*;
pub use stock::StockMatch;

pub(crate) use consent::has_consent_in;
pub(crate) use packages::{
    add_payment_row, consume_session_row, insert_package_row, load_package, set_payment_status_row,
};
pub(crate) use stock::{apply_stock_delta, load_stock_item, update_packaging_and_add};
pub(crate) use treatments::load_treatment;
pub(crate) use visits::{
    complete_visit_row, insert_visit_consumable, insert_visit_treatment, load_visit,
    lock_visit_row,
};

use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        // Other devices may hold the write lock briefly
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction. Dropping it without `commit` rolls back.
    ///
    /// Callers hold the only handle to this connection (the FFI object wraps it
    /// in a mutex), so nested transactions cannot occur.
    pub fn begin(&self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}

/// Map an unknown status string to a constraint error.
pub(crate) fn parse_status<T>(
    value: &str,
    what: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> DbResult<T> {
    parse(value).ok_or_else(|| DbError::Constraint(format!("Unknown {}: {}", what, value)))
}
