//! SQL-backed host registry over the `host` table

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use tracing::{debug, info};

use super::models::HostRow;
use super::query::BoundSql;
use super::Database;
use crate::clock::{Clock, SystemClock};
use crate::config::default_time_format;
use crate::error::{BoxError, HostGroupError};
use crate::model::Host;
use crate::registry::HostRegistry;

const SELECT_HOSTS: &str = "SELECT id, addr, hostname, version, online, stop, remark, \
    lastUpdateTime AS last_update_time FROM host";

/// Fields an operator supplies when registering a host
#[derive(Debug, Clone, Default)]
pub struct NewHost {
    pub id: String,
    pub addr: String,
    pub hostname: String,
    pub version: String,
    pub online: bool,
    pub remark: String,
}

#[derive(Clone)]
pub struct SqlHostRegistry {
    db: Database,
    clock: Arc<dyn Clock>,
    time_format: Arc<str>,
}

impl SqlHostRegistry {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            time_format: Arc::from(default_time_format()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Arc::from(format.into());
        self
    }

    /// Insert or refresh a host record. Refreshing keeps the `stop` flag.
    pub async fn register(&self, host: NewHost) -> Result<(), HostGroupError> {
        let now = self.clock.now().timestamp();

        self.db
            .run("host.register", move |conn| {
                diesel::sql_query(
                    "INSERT INTO host (id, addr, hostname, version, online, stop, remark, lastUpdateTime) \
                     VALUES (?, ?, ?, ?, ?, 0, ?, ?) \
                     ON CONFLICT(id) DO UPDATE SET \
                        addr = excluded.addr, \
                        hostname = excluded.hostname, \
                        version = excluded.version, \
                        online = excluded.online, \
                        remark = excluded.remark, \
                        lastUpdateTime = excluded.lastUpdateTime",
                )
                .bind::<Text, _>(&host.id)
                .bind::<Text, _>(&host.addr)
                .bind::<Text, _>(&host.hostname)
                .bind::<Text, _>(&host.version)
                .bind::<Integer, _>(host.online as i32)
                .bind::<Text, _>(&host.remark)
                .bind::<BigInt, _>(now)
                .execute(conn)
                .map_err(|e| HostGroupError::persistence("host.register", e))?;

                info!(id = %host.id, addr = %host.addr, "Registered host");
                Ok(())
            })
            .await
    }

    /// Remove a host record. Groups that list it are not touched.
    pub async fn remove(&self, id: &str) -> Result<bool, HostGroupError> {
        let id = id.to_string();

        self.db
            .run("host.remove", move |conn| {
                let changed = diesel::sql_query("DELETE FROM host WHERE id = ?")
                    .bind::<Text, _>(&id)
                    .execute(conn)
                    .map_err(|e| HostGroupError::persistence("host.remove", e))?;
                Ok(changed > 0)
            })
            .await
    }

    /// Every registered host
    pub async fn list(&self) -> Result<Vec<Host>, HostGroupError> {
        let mut q = BoundSql::new(SELECT_HOSTS);
        q.push_sql(" ORDER BY id");
        self.load(vec![q]).await
    }

    /// Hosts with the given ids, in table order within each chunk of
    /// [`MAX_IDS_PER_QUERY`] ids
    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Host>, HostGroupError> {
        self.load(id_lookups(ids)).await
    }

    /// Run every statement on one connection and concatenate the rows
    async fn load(&self, queries: Vec<BoundSql>) -> Result<Vec<Host>, HostGroupError> {
        if queries.is_empty() {
            return Ok(vec![]);
        }
        let time_format = self.time_format.clone();

        self.db
            .run("host.query", move |conn| {
                let mut hosts = Vec::new();
                for q in queries {
                    debug!("Executing query: {}", q.sql());
                    let rows: Vec<HostRow> = q
                        .into_query()
                        .load(conn)
                        .map_err(|e| HostGroupError::persistence("host.query", e))?;
                    hosts.extend(rows.into_iter().map(|r| r.into_host(&time_format)));
                }
                Ok(hosts)
            })
            .await
    }
}

/// Upper bound on `?` placeholders per lookup, well under SQLite's
/// bound-variable limit
pub const MAX_IDS_PER_QUERY: usize = 500;

/// One `id IN (...)` statement per chunk of distinct ids
fn id_lookups(ids: &[String]) -> Vec<BoundSql> {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect();

    unique
        .chunks(MAX_IDS_PER_QUERY)
        .map(|chunk| {
            let mut q = BoundSql::new(SELECT_HOSTS);
            q.push_sql(" WHERE id IN ").push_text_list(chunk.iter().copied());
            q
        })
        .collect()
}

#[async_trait]
impl HostRegistry for SqlHostRegistry {
    async fn resolve_hosts(&self, host_ids: &[String]) -> Result<Vec<Host>, BoxError> {
        Ok(self.get_by_ids(host_ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(id: &str, addr: &str) -> NewHost {
        NewHost {
            id: id.into(),
            addr: addr.into(),
            hostname: format!("{}.local", id),
            online: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = SqlHostRegistry::new(Database::open_in_memory().unwrap());
        registry.register(host("h1", "10.0.0.1:8080")).await.unwrap();
        registry.register(host("h2", "10.0.0.2:8080")).await.unwrap();
        registry.register(host("h3", "10.0.0.3:8080")).await.unwrap();

        let ids = vec!["h3".to_string(), "h1".to_string(), "missing".to_string()];
        let hosts = registry.resolve_hosts(&ids).await.unwrap();

        let mut found: Vec<_> = hosts.iter().map(|h| h.id.as_str()).collect();
        found.sort();
        assert_eq!(found, vec!["h1", "h3"]);
        assert!(hosts.iter().all(|h| h.online && !h.stop));
    }

    #[tokio::test]
    async fn test_register_refreshes_existing() {
        let registry = SqlHostRegistry::new(Database::open_in_memory().unwrap());
        registry.register(host("h1", "10.0.0.1:8080")).await.unwrap();

        let mut moved = host("h1", "10.0.0.9:8080");
        moved.online = false;
        registry.register(moved).await.unwrap();

        let hosts = registry.list().await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].addr, "10.0.0.9:8080");
        assert!(!hosts[0].online);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SqlHostRegistry::new(Database::open_in_memory().unwrap());
        registry.register(host("h1", "10.0.0.1:8080")).await.unwrap();

        assert!(registry.remove("h1").await.unwrap());
        assert!(!registry.remove("h1").await.unwrap());
        assert!(registry.get_by_ids(&["h1".to_string()]).await.unwrap().is_empty());
    }

    #[test]
    fn test_id_lookups_chunk_and_dedupe() {
        assert!(id_lookups(&[]).is_empty());

        let ids: Vec<String> = (0..1_200).map(|i| format!("h{}", i)).collect();
        let lookups = id_lookups(&ids);
        assert_eq!(lookups.len(), 3);
        assert_eq!(lookups[0].args().len(), MAX_IDS_PER_QUERY);
        assert_eq!(lookups[2].args().len(), 200);

        let repeated = vec!["h1".to_string(), "h2".to_string(), "h1".to_string()];
        let lookups = id_lookups(&repeated);
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].args().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_more_ids_than_one_statement_binds() {
        let registry = SqlHostRegistry::new(Database::open_in_memory().unwrap());
        registry.register(host("h5", "10.0.0.5:8080")).await.unwrap();
        registry.register(host("h700", "10.0.0.7:8080")).await.unwrap();
        registry.register(host("h40000", "10.0.4.0:8080")).await.unwrap();

        let ids: Vec<String> = (0..40_001).map(|i| format!("h{}", i)).collect();
        let hosts = registry.resolve_hosts(&ids).await.unwrap();

        let mut found: Vec<_> = hosts.iter().map(|h| h.id.as_str()).collect();
        found.sort();
        assert_eq!(found, vec!["h40000", "h5", "h700"]);
    }
}
