//! Shared SQLite handle.
//!
//! One connection serves every store. Calls take turns on a mutex and run on
//! tokio's blocking pool. Once a [`Database`] exists its schema is current.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// How long a statement waits on a locked file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open the database file at `path`, creating it and its directory when
    /// missing, and apply any pending schema steps.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let conn = tokio::task::spawn_blocking(move || -> StoreResult<Connection> {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let mut conn = Connection::open(&path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            let schema = prepare(&mut conn)?;
            info!(path = %path.display(), schema, "database ready");
            Ok(conn)
        })
        .await??;

        Ok(Self::wrap(conn))
    }

    /// A private in-memory database with the full schema.
    pub fn in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        let schema = prepare(&mut conn)?;
        debug!(schema, "in-memory database ready");
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Whether the connection still answers a trivial query.
    pub async fn ping(&self) -> bool {
        self.call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))? == 1))
            .await
            .unwrap_or(false)
    }

    pub async fn schema_version(&self) -> StoreResult<u32> {
        self.call(|conn| migration::schema_version(conn)).await
    }

    /// Run `f` with exclusive access to the connection on the blocking pool.
    ///
    /// `f` gets `&mut Connection` so it can open a transaction.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await?
    }
}

/// Connection settings shared by file and memory databases, then migrations.
/// Returns the resulting schema version.
fn prepare(conn: &mut Connection) -> StoreResult<u32> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migration::migrate(conn)
}
