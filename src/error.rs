//! Error types for the host group store

use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by pluggable collaborators such as host registries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised by the persistence gateway.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("query: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("connection: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("blocking task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum HostGroupError {
    #[error("{op} failed: {source}")]
    Persistence {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("cannot find hostgroup {key}: {value}")]
    NotFound { key: &'static str, value: String },

    #[error("cannot find worker host in hostgroup {group}")]
    NoWorker { group: String },

    #[error("invalid host id {host_id:?}: {reason}")]
    InvalidHostId { host_id: String, reason: &'static str },

    #[error("resolving hosts for hostgroup {group_id}: {source}")]
    Registry {
        group_id: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot find principal id: {0}")]
    PrincipalNotFound(String),

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HostGroupError {
    /// Wrap a gateway failure with the name of the operation that hit it.
    pub fn persistence(op: &'static str, err: impl Into<StoreError>) -> Self {
        HostGroupError::Persistence {
            op,
            source: err.into(),
        }
    }

    pub(crate) fn not_found_id(id: &str) -> Self {
        HostGroupError::NotFound {
            key: "id",
            value: id.to_string(),
        }
    }

    pub(crate) fn not_found_name(name: &str) -> Self {
        HostGroupError::NotFound {
            key: "name",
            value: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HostGroupError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = HostGroupError::not_found_id("abc");
        assert_eq!(err.to_string(), "cannot find hostgroup id: abc");
        assert!(err.is_not_found());

        let err = HostGroupError::not_found_name("web");
        assert_eq!(err.to_string(), "cannot find hostgroup name: web");
    }

    #[test]
    fn test_persistence_keeps_operation_and_source() {
        let err = HostGroupError::persistence("hostgroup.delete", diesel::result::Error::NotFound);
        assert!(err.to_string().starts_with("hostgroup.delete failed: query:"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_not_found());
    }
}
