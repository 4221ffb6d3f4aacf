//! Bounded pool of SQLite connections
//!
//! Connections are opened lazily up to the pool size. A caller that finds every
//! connection checked out waits on the pool's semaphore instead of failing.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::StorageResult;
use rusqlite::Connection;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct Shared {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl Shared {
    fn lock_idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed-capacity pool of connections to one database file
///
/// Checked-out connections own their slot, so they can be moved onto the
/// blocking thread pool for the duration of a query.
pub struct ConnectionPool {
    shared: Arc<Shared>,
    size: usize,
    slots: Arc<Semaphore>,
}

impl ConnectionPool {
    /// Opens the first connection, bootstraps the schema and builds the pool
    pub fn open(path: &Path, size: usize) -> StorageResult<Self> {
        let size = size.max(1);
        let conn = open_connection(path)?;
        initialize_schema(&conn)?;

        Ok(Self {
            shared: Arc::new(Shared {
                path: path.to_path_buf(),
                idle: Mutex::new(vec![conn]),
            }),
            size,
            slots: Arc::new(Semaphore::new(size)),
        })
    }

    /// Checks out a connection, waiting while the pool is exhausted
    pub async fn acquire(&self) -> StorageResult<PooledConnection> {
        let permit = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            // The slot semaphore is private and never closed.
            Err(_) => unreachable!("connection pool semaphore closed"),
        };

        let idle = self.shared.lock_idle().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => open_connection(&self.shared.path)?,
        };

        Ok(PooledConnection {
            shared: Arc::clone(&self.shared),
            conn: Some(conn),
            _permit: permit,
        })
    }

    /// Maximum number of connections
    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections that could be checked out right now without waiting
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.shared.lock_idle().len()
    }
}

/// A connection checked out of a [`ConnectionPool`]
///
/// Returned to the pool on drop, unless it was discarded.
pub struct PooledConnection {
    shared: Arc<Shared>,
    conn: Option<Connection>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Closes the connection instead of returning it to the pool
    ///
    /// The slot is still released; the next caller opens a fresh connection.
    pub fn discard(mut self) {
        self.conn.take();
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `discard` and `drop` take the connection, and both consume the guard.
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("pooled connection used after discard"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.lock_idle().push(conn);
        }
    }
}

/// Opens a connection configured for concurrent writers
fn open_connection(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connections_are_reused() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(&dir.path().join("cars.db"), 2).unwrap();

        {
            let conn = pool.acquire().await.unwrap();
            conn.execute_batch("SELECT 1").unwrap();
            assert_eq!(pool.available(), 1);
        }

        assert_eq!(pool.available(), 2);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(ConnectionPool::open(&dir.path().join("cars.db"), 1).unwrap());

        let held = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let conn = pool.acquire().await.unwrap();
                conn.query_row("SELECT COUNT(*) FROM cars", [], |row| row.get::<_, i64>(0))
                    .unwrap()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert_eq!(waiter.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_discard_releases_slot() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(&dir.path().join("cars.db"), 1).unwrap();

        let conn = pool.acquire().await.unwrap();
        conn.discard();

        assert_eq!(pool.available(), 1);
        assert_eq!(pool.idle_count(), 0);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_moves_to_blocking_thread() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(&dir.path().join("cars.db"), 1).unwrap();

        let conn = pool.acquire().await.unwrap();
        let count = tokio::task::spawn_blocking(move || {
            conn.query_row("SELECT COUNT(*) FROM cars", [], |row| row.get::<_, i64>(0))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(count, 0);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.idle_count(), 1);
    }
}
