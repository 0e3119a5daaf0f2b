pub mod interactions;
pub mod mapper;
pub mod schema;
pub mod templates;

use crate::error::{GradeError, Result};
use crate::grading::evaluate::DEFAULT_PRECISION;
use crate::types::config::StorageSettings;
use rusqlite::Connection;
use tracing::debug;

/// Handle over one SQLite connection. Each writer thread opens its own.
pub struct Store {
    conn: Connection,
    display_precision: u32,
}

impl Store {
    pub fn open(settings: &StorageSettings) -> Result<Self> {
        if let Some(parent) = settings.database.parent() {
            std::fs::create_dir_all(parent).map_err(GradeError::Io)?;
        }
        let conn = Connection::open(&settings.database)?;
        conn.busy_timeout(settings.busy_timeout)?;
        debug!(database = %settings.database.display(), "opened grading store");
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn,
            display_precision: DEFAULT_PRECISION,
        })
    }

    pub fn set_display_precision(&mut self, precision: u32) {
        self.display_precision = precision;
    }

    pub fn display_precision(&self) -> u32 {
        self.display_precision
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
