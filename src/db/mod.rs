//! SQLite persistence for host groups
//!
//! ## Architecture
//!
//! - Connections come from an r2d2 pool; each store operation checks out
//!   exactly one and returns it when the operation's closure ends
//! - Diesel calls are blocking, so they run on Tokio's blocking pool and
//!   every operation is bounded by `query_timeout_ms`
//!
//! ## Tables
//!
//! - `principal` - Accounts that create host groups (id, display name)
//! - `hostgroup` - Host groups; membership is a comma-joined id list
//! - `host` - Worker hosts served by [`hosts::SqlHostRegistry`]

pub mod hostgroups;
pub mod hosts;
pub mod models;
pub mod principals;
pub mod query;
pub mod schema;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::HostGroupError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Per-connection pragmas applied on checkout from a fresh manager
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pooled SQLite database shared by every store
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    query_timeout: Duration,
}

impl Database {
    /// Open or create the database described by `config` and bring the
    /// schema up to date
    pub fn open(config: &Config) -> Result<Self, HostGroupError> {
        if !config.is_in_memory() {
            if let Some(parent) = std::path::Path::new(&config.database_url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        HostGroupError::Config(format!("Failed to create {}: {}", parent.display(), e))
                    })?;
                }
            }
        }

        info!(
            database = %config.database_url,
            pool_max_size = config.pool_max_size,
            "Opening SQLite database"
        );

        let manager = ConnectionManager::<SqliteConnection>::new(&config.database_url);
        let options = ConnectionOptions {
            busy_timeout_ms: config.busy_timeout_ms,
        };

        // Every connection to ":memory:" is its own database, so the pool
        // must hold exactly one connection and never recycle it.
        let builder = if config.is_in_memory() {
            Pool::builder()
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder().max_size(config.pool_max_size.max(1))
        };

        let pool = builder
            .connection_timeout(config.connection_timeout())
            .connection_customizer(Box::new(options))
            .build(manager)
            .map_err(|e| HostGroupError::persistence("db.open", e))?;

        let db = Self {
            pool,
            query_timeout: config.query_timeout(),
        };

        {
            let mut conn = db.conn("db.init_schema")?;
            schema::init_schema(&mut conn, !config.is_in_memory())?;
        }

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, HostGroupError> {
        debug!("Opening in-memory SQLite database");
        Self::open(&Config {
            database_url: ":memory:".to_string(),
            ..Default::default()
        })
    }

    /// Check a connection out of the pool
    pub fn conn(&self, op: &'static str) -> Result<PooledConn, HostGroupError> {
        self.pool
            .get()
            .map_err(|e| HostGroupError::persistence(op, e))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Run `f` on a pooled connection off the async executor.
    ///
    /// The connection is held for the whole closure and released when it
    /// returns, whatever the outcome. Checkout waits no longer than the
    /// operation's deadline. If the deadline passes or the returned future
    /// is dropped before a connection is in hand, `f` never runs and the
    /// caller gets `Timeout`. A statement that has already started runs to
    /// completion.
    pub async fn run<F, T>(&self, op: &'static str, f: F) -> Result<T, HostGroupError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, HostGroupError> + Send + 'static,
        T: Send + 'static,
    {
        let after = self.query_timeout;
        let deadline = Instant::now() + after;
        let guard = CancelOnDrop::default();
        let cancelled = guard.flag();

        let pool = self.pool.clone();
        let task = tokio::task::spawn_blocking(move || {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || cancelled.load(Ordering::SeqCst) {
                return Err(HostGroupError::Timeout { op, after });
            }

            let mut conn = pool.get_timeout(remaining).map_err(|e| {
                if Instant::now() >= deadline {
                    HostGroupError::Timeout { op, after }
                } else {
                    HostGroupError::persistence(op, e)
                }
            })?;

            if Instant::now() >= deadline || cancelled.load(Ordering::SeqCst) {
                debug!(op, "Deadline passed during checkout, not executing");
                return Err(HostGroupError::Timeout { op, after });
            }

            f(&mut conn)
        });

        let outcome = tokio::time::timeout(after, task).await;
        drop(guard);

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(HostGroupError::persistence(op, join_err)),
            Err(_) => Err(HostGroupError::Timeout { op, after }),
        }
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<DbStats, HostGroupError> {
        self.run("db.stats", |conn| {
            let hostgroup_count = count_rows(conn, "hostgroup")?;
            let host_count = count_rows(conn, "host")?;
            let principal_count = count_rows(conn, "principal")?;

            Ok(DbStats {
                hostgroup_count,
                host_count,
                principal_count,
            })
        })
        .await
    }
}

/// Raises a shared flag when dropped, telling a blocking task that nobody
/// is waiting for it any more
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn count_rows(conn: &mut SqliteConnection, table: &'static str) -> Result<u64, HostGroupError> {
    let row: models::CountRow = diesel::sql_query(format!("SELECT COUNT(*) AS total FROM {}", table))
        .get_result(conn)
        .map_err(|e| HostGroupError::persistence("db.stats", e))?;
    Ok(row.total.max(0) as u64)
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub hostgroup_count: u64,
    pub host_count: u64,
    pub principal_count: u64,
}

// Re-exports
pub use hostgroups::HostGroupStore;
pub use hosts::SqlHostRegistry;
pub use principals::PrincipalStore;
