//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::HostGroupError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection, wal: bool) -> Result<(), HostGroupError> {
    if wal {
        // WAL lets readers on other pooled connections proceed during a write
        conn.batch_execute("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| HostGroupError::persistence("schema.pragma", e))?;
    }

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, HostGroupError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| HostGroupError::persistence("schema.version", e))?;

    let row: Option<VersionRow> = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result(conn)
        .optional()
        .map_err(|e| HostGroupError::persistence("schema.version", e))?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

/// Set schema version
fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), HostGroupError> {
    diesel::sql_query("DELETE FROM schema_version")
        .execute(conn)
        .map_err(|e| HostGroupError::persistence("schema.version", e))?;
    diesel::sql_query("INSERT INTO schema_version (version) VALUES (?)")
        .bind::<Integer, _>(version)
        .execute(conn)
        .map_err(|e| HostGroupError::persistence("schema.version", e))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &mut SqliteConnection) -> Result<(), HostGroupError> {
    conn.batch_execute(PRINCIPAL_SCHEMA)
        .map_err(|e| HostGroupError::persistence("schema.principal", e))?;

    conn.batch_execute(HOSTGROUP_SCHEMA)
        .map_err(|e| HostGroupError::persistence("schema.hostgroup", e))?;

    conn.batch_execute(HOST_SCHEMA)
        .map_err(|e| HostGroupError::persistence("schema.host", e))?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| HostGroupError::persistence("schema.indexes", e))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &mut SqliteConnection, from_version: i32) -> Result<(), HostGroupError> {
    // Every table uses IF NOT EXISTS, so replaying creation covers v0 -> v1
    if from_version < 1 {
        create_tables(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Principal table schema
const PRINCIPAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS principal (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    createTime INTEGER NOT NULL
);
"#;

/// Host group table schema
///
/// `createByID` carries no foreign key. A group whose creator is gone
/// stays on disk but drops out of joined reads.
const HOSTGROUP_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS hostgroup (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    remark TEXT NOT NULL DEFAULT '',
    createByID TEXT NOT NULL,
    hostIDs TEXT NOT NULL DEFAULT '',
    createTime INTEGER NOT NULL,
    updateTime INTEGER NOT NULL
);
"#;

/// Worker host table schema
const HOST_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS host (
    id TEXT PRIMARY KEY NOT NULL,
    addr TEXT NOT NULL,
    hostname TEXT NOT NULL DEFAULT '',
    version TEXT NOT NULL DEFAULT '',
    online INTEGER NOT NULL DEFAULT 0,
    stop INTEGER NOT NULL DEFAULT 0,
    remark TEXT NOT NULL DEFAULT '',
    lastUpdateTime INTEGER NOT NULL
);
"#;

/// Index definitions
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_hostgroup_name ON hostgroup(name);
CREATE INDEX IF NOT EXISTS idx_hostgroup_created ON hostgroup(createTime, id);
CREATE INDEX IF NOT EXISTS idx_host_addr ON host(addr);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();

        init_schema(&mut conn, false).unwrap();
        init_schema(&mut conn, false).unwrap();

        assert_eq!(get_schema_version(&mut conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrates_from_unversioned() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        conn.batch_execute(PRINCIPAL_SCHEMA).unwrap();
        conn.batch_execute("CREATE TABLE schema_version (version INTEGER NOT NULL); INSERT INTO schema_version VALUES (0);")
            .unwrap();

        // version row says 0, so this takes the create path and fills in the rest
        init_schema(&mut conn, false).unwrap();

        assert_eq!(get_schema_version(&mut conn).unwrap(), SCHEMA_VERSION);
        diesel::sql_query("SELECT id FROM hostgroup").execute(&mut conn).unwrap();
        diesel::sql_query("SELECT id FROM host").execute(&mut conn).unwrap();
    }
}
