//! Principal registration
//!
//! Host groups only store the creator's id; the display name is looked up
//! here at read time.

use std::sync::Arc;

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use tracing::info;

use super::models::PrincipalRow;
use super::Database;
use crate::clock::{Clock, SystemClock};
use crate::config::default_time_format;
use crate::error::HostGroupError;
use crate::model::Principal;

#[derive(Clone)]
pub struct PrincipalStore {
    db: Database,
    clock: Arc<dyn Clock>,
    time_format: Arc<str>,
}

impl PrincipalStore {
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

    /// Insert a principal, or rename an existing one (create time kept)
    pub async fn register(&self, id: &str, name: &str) -> Result<(), HostGroupError> {
        let id = id.to_string();
        let name = name.to_string();
        let now = self.clock.now().timestamp();

        self.db
            .run("principal.register", move |conn| {
                diesel::sql_query(
                    "INSERT INTO principal (id, name, createTime) VALUES (?, ?, ?) \
                     ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                )
                .bind::<Text, _>(&id)
                .bind::<Text, _>(&name)
                .bind::<BigInt, _>(now)
                .execute(conn)
                .map_err(|e| HostGroupError::persistence("principal.register", e))?;

                info!(id = %id, name = %name, "Registered principal");
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Principal, HostGroupError> {
        let id = id.to_string();
        let time_format = self.time_format.clone();

        self.db
            .run("principal.get", move |conn| {
                let row: Option<PrincipalRow> = diesel::sql_query(
                    "SELECT id, name, createTime AS create_time FROM principal WHERE id = ?",
                )
                .bind::<Text, _>(&id)
                .get_result(conn)
                .optional()
                .map_err(|e| HostGroupError::persistence("principal.get", e))?;

                row.map(|r| r.into_principal(&time_format))
                    .ok_or(HostGroupError::PrincipalNotFound(id))
            })
            .await
    }
}
