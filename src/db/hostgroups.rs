//! Host group CRUD operations
//!
//! Reads join `hostgroup` against `principal` so the creator's display
//! name is always current. A group whose creator is missing is left out
//! of every read.

use std::sync::Arc;

use diesel::connection::DefaultLoadingMode;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use tracing::{debug, info, warn};

use super::models::{encode_host_ids, CountRow, HostGroupRow};
use super::query::BoundSql;
use super::Database;
use crate::clock::{Clock, SystemClock};
use crate::config::default_time_format;
use crate::error::HostGroupError;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::model::{HostGroup, HostGroupPage};

const SELECT_HOSTGROUPS: &str = "SELECT \
    hg.id AS id, \
    hg.name AS name, \
    hg.remark AS remark, \
    hg.hostIDs AS host_ids, \
    hg.createByID AS create_by_id, \
    u.name AS create_by, \
    hg.createTime AS create_time, \
    hg.updateTime AS update_time \
    FROM hostgroup AS hg, principal AS u \
    WHERE hg.createByID = u.id";

/// Filters for a host group read. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostGroupFilter {
    pub id: String,
    pub name: String,
    /// Page size; `<= 0` disables pagination and the count query
    pub limit: i64,
    pub offset: i64,
}

impl HostGroupFilter {
    pub fn by_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn by_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn page(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset,
            ..Default::default()
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.limit > 0
    }

    /// Build the count statement (paginated reads only) and the row
    /// statement. Arguments bind as id, name, then limit and offset.
    pub fn build(&self) -> (Option<BoundSql>, BoundSql) {
        let mut base = BoundSql::new(SELECT_HOSTGROUPS);
        if !self.id.is_empty() {
            base.push_text(" AND hg.id = ?", self.id.as_str());
        }
        if !self.name.is_empty() {
            base.push_text(" AND hg.name = ?", self.name.as_str());
        }

        let count = self
            .is_paginated()
            .then(|| base.wrap("SELECT COUNT(*) AS total FROM ", ""));

        let mut rows = base;
        rows.push_sql(" ORDER BY hg.createTime ASC, hg.id ASC");
        if self.is_paginated() {
            rows.push_int(" LIMIT ?", self.limit)
                .push_int(" OFFSET ?", self.offset.max(0));
        }

        (count, rows)
    }
}

/// Store for the `hostgroup` relation
#[derive(Clone)]
pub struct HostGroupStore {
    db: Database,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    time_format: Arc<str>,
}

impl HostGroupStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            time_format: Arc::from(default_time_format()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Arc::from(format.into());
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create a host group and return its id.
    ///
    /// Host ids are not checked against the host registry; stale members
    /// show up (or don't) when the group is resolved.
    pub async fn create(
        &self,
        name: &str,
        remark: &str,
        create_by_id: &str,
        host_ids: &[String],
    ) -> Result<String, HostGroupError> {
        let host_ids = encode_host_ids(host_ids)?;
        let id = self.ids.new_id();
        let now = self.clock.now().timestamp();

        let name = name.to_string();
        let remark = remark.to_string();
        let create_by_id = create_by_id.to_string();
        let new_id = id.clone();

        self.db
            .run("hostgroup.create", move |conn| {
                diesel::sql_query(
                    "INSERT INTO hostgroup (id, name, remark, createByID, hostIDs, createTime, updateTime) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind::<Text, _>(&new_id)
                .bind::<Text, _>(&name)
                .bind::<Text, _>(&remark)
                .bind::<Text, _>(&create_by_id)
                .bind::<Text, _>(&host_ids)
                .bind::<BigInt, _>(now)
                .bind::<BigInt, _>(now)
                .execute(conn)
                .map_err(|e| HostGroupError::persistence("hostgroup.create", e))?;

                info!(id = %new_id, name = %name, "Created hostgroup");
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// Replace a group's membership and remark and bump its update time.
    ///
    /// Name and creator never change. Returns `false` when no row has this
    /// id; that is not an error.
    ///
    /// Times are stored in whole seconds, so an update in the same second
    /// as the create or a previous update leaves `update_time` unchanged.
    /// It only increases strictly when the clock has moved a full second.
    pub async fn update(
        &self,
        id: &str,
        remark: &str,
        host_ids: &[String],
    ) -> Result<bool, HostGroupError> {
        let host_ids = encode_host_ids(host_ids)?;
        let now = self.clock.now().timestamp();

        let id = id.to_string();
        let remark = remark.to_string();

        self.db
            .run("hostgroup.update", move |conn| {
                let changed = diesel::sql_query(
                    "UPDATE hostgroup SET hostIDs = ?, remark = ?, updateTime = ? WHERE id = ?",
                )
                .bind::<Text, _>(&host_ids)
                .bind::<Text, _>(&remark)
                .bind::<BigInt, _>(now)
                .bind::<Text, _>(&id)
                .execute(conn)
                .map_err(|e| HostGroupError::persistence("hostgroup.update", e))?;

                if changed == 0 {
                    debug!(id = %id, "Update matched no hostgroup");
                } else {
                    info!(id = %id, "Updated hostgroup");
                }
                Ok(changed > 0)
            })
            .await
    }

    /// Hard-delete a group. Hosts it referenced are untouched.
    ///
    /// Returns `false` when no row has this id; that is not an error.
    pub async fn delete(&self, id: &str) -> Result<bool, HostGroupError> {
        let id = id.to_string();

        self.db
            .run("hostgroup.delete", move |conn| {
                let changed = diesel::sql_query("DELETE FROM hostgroup WHERE id = ?")
                    .bind::<Text, _>(&id)
                    .execute(conn)
                    .map_err(|e| HostGroupError::persistence("hostgroup.delete", e))?;

                if changed == 0 {
                    debug!(id = %id, "Delete matched no hostgroup");
                } else {
                    info!(id = %id, "Deleted hostgroup");
                }
                Ok(changed > 0)
            })
            .await
    }

    /// List host groups oldest first.
    ///
    /// With `limit > 0` returns one page and the total number of groups.
    /// With `limit <= 0` returns every group and a total of 0.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<HostGroupPage, HostGroupError> {
        self.query(HostGroupFilter::page(limit, offset)).await
    }

    /// Get a group by id; `NotFound` unless exactly one row matches
    pub async fn get_by_id(&self, id: &str) -> Result<HostGroup, HostGroupError> {
        let page = self.query(HostGroupFilter::by_id(id)).await?;
        single(page.groups).ok_or_else(|| HostGroupError::not_found_id(id))
    }

    /// Get a group by name; `NotFound` unless exactly one row matches
    pub async fn get_by_name(&self, name: &str) -> Result<HostGroup, HostGroupError> {
        let page = self.query(HostGroupFilter::by_name(name)).await?;
        single(page.groups).ok_or_else(|| HostGroupError::not_found_name(name))
    }

    /// Run a filtered read on one connection.
    ///
    /// Rows that fail to decode are logged and skipped; the rest of the
    /// result is still returned.
    pub async fn query(&self, filter: HostGroupFilter) -> Result<HostGroupPage, HostGroupError> {
        let (count_sql, rows_sql) = filter.build();
        let time_format = self.time_format.clone();

        self.db
            .run("hostgroup.query", move |conn| {
                let total = match count_sql {
                    Some(count_sql) => {
                        let row: CountRow = count_sql
                            .into_query()
                            .get_result(conn)
                            .map_err(|e| HostGroupError::persistence("hostgroup.count", e))?;
                        row.total.max(0) as u64
                    }
                    None => 0,
                };

                debug!("Executing query: {}", rows_sql.sql());

                let rows = rows_sql
                    .into_query()
                    .load_iter::<HostGroupRow, DefaultLoadingMode>(conn)
                    .map_err(|e| HostGroupError::persistence("hostgroup.query", e))?;

                let mut groups = Vec::new();
                for row in rows {
                    match row {
                        Ok(row) => groups.push(row.into_hostgroup(&time_format)),
                        Err(e) => {
                            warn!(error = %e, "Scan result failed, skipping hostgroup row");
                            continue;
                        }
                    }
                }

                Ok(HostGroupPage { groups, total })
            })
            .await
    }
}

fn single(mut groups: Vec<HostGroup>) -> Option<HostGroup> {
    if groups.len() == 1 {
        groups.pop()
    } else {
        None
    }
}
