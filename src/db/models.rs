//! Row types and column codecs for the SQLite layer
//!
//! Membership is stored as one comma-joined column. That string exists
//! only between these codecs and the database; callers always see a
//! `Vec<String>`.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};

use crate::clock::format_unix;
use crate::error::HostGroupError;
use crate::model::{Host, HostGroup, Principal};

/// Separator used in the stored `hostIDs` column
pub const HOST_ID_SEPARATOR: char = ',';

/// Join host ids for storage.
///
/// Rejects empty ids and ids containing the separator; either would
/// change the membership on the way back out.
pub fn encode_host_ids(host_ids: &[String]) -> Result<String, HostGroupError> {
    for host_id in host_ids {
        if host_id.is_empty() {
            return Err(HostGroupError::InvalidHostId {
                host_id: host_id.clone(),
                reason: "host id must not be empty",
            });
        }
        if host_id.contains(HOST_ID_SEPARATOR) {
            return Err(HostGroupError::InvalidHostId {
                host_id: host_id.clone(),
                reason: "host id must not contain ','",
            });
        }
    }
    Ok(host_ids.join(","))
}

/// Split a stored `hostIDs` value. Empty input yields no members.
pub fn decode_host_ids(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    stored.split(HOST_ID_SEPARATOR).map(str::to_string).collect()
}

/// Joined host group row (hostgroup x principal)
#[derive(Debug, QueryableByName)]
pub struct HostGroupRow {
    #[diesel(sql_type = Text)]
    pub id: String,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub remark: String,
    #[diesel(sql_type = Text)]
    pub host_ids: String,
    #[diesel(sql_type = Text)]
    pub create_by_id: String,
    #[diesel(sql_type = Text)]
    pub create_by: String,
    #[diesel(sql_type = BigInt)]
    pub create_time: i64,
    #[diesel(sql_type = BigInt)]
    pub update_time: i64,
}

impl HostGroupRow {
    pub fn into_hostgroup(self, time_format: &str) -> HostGroup {
        HostGroup {
            id: self.id,
            name: self.name,
            remark: self.remark,
            hosts_id: decode_host_ids(&self.host_ids),
            create_by_id: self.create_by_id,
            create_by: self.create_by,
            create_time: format_unix(self.create_time, time_format),
            update_time: format_unix(self.update_time, time_format),
        }
    }
}

/// Host row
#[derive(Debug, QueryableByName)]
pub struct HostRow {
    #[diesel(sql_type = Text)]
    pub id: String,
    #[diesel(sql_type = Text)]
    pub addr: String,
    #[diesel(sql_type = Text)]
    pub hostname: String,
    #[diesel(sql_type = Text)]
    pub version: String,
    #[diesel(sql_type = Integer)]
    pub online: i32,
    #[diesel(sql_type = Integer)]
    pub stop: i32,
    #[diesel(sql_type = Text)]
    pub remark: String,
    #[diesel(sql_type = BigInt)]
    pub last_update_time: i64,
}

impl HostRow {
    pub fn into_host(self, time_format: &str) -> Host {
        Host {
            id: self.id,
            addr: self.addr,
            hostname: self.hostname,
            version: self.version,
            online: self.online != 0,
            stop: self.stop != 0,
            remark: self.remark,
            last_update_time: format_unix(self.last_update_time, time_format),
        }
    }
}

/// Principal row
#[derive(Debug, QueryableByName)]
pub struct PrincipalRow {
    #[diesel(sql_type = Text)]
    pub id: String,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = BigInt)]
    pub create_time: i64,
}

impl PrincipalRow {
    pub fn into_principal(self, time_format: &str) -> Principal {
        Principal {
            id: self.id,
            name: self.name,
            create_time: format_unix(self.create_time, time_format),
        }
    }
}

/// Row struct for count queries
#[derive(Debug, QueryableByName)]
pub struct CountRow {
    #[diesel(sql_type = BigInt)]
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_encode_keeps_order() {
        assert_eq!(encode_host_ids(&ids(&["h1", "h2", "h3"])).unwrap(), "h1,h2,h3");
        assert_eq!(decode_host_ids("h1,h2,h3"), ids(&["h1", "h2", "h3"]));
    }

    #[test]
    fn test_empty_membership() {
        assert_eq!(encode_host_ids(&[]).unwrap(), "");
        assert!(decode_host_ids("").is_empty());
    }

    #[test]
    fn test_rejects_separator_and_empty() {
        let err = encode_host_ids(&ids(&["h1", "bad,id"])).unwrap_err();
        assert!(matches!(err, HostGroupError::InvalidHostId { ref host_id, .. } if host_id == "bad,id"));

        let err = encode_host_ids(&ids(&["h1", ""])).unwrap_err();
        assert!(matches!(err, HostGroupError::InvalidHostId { .. }));
    }

    #[test]
    fn test_row_conversion() {
        let row = HostGroupRow {
            id: "g1".into(),
            name: "web".into(),
            remark: "front".into(),
            host_ids: "a,b".into(),
            create_by_id: "u1".into(),
            create_by: "alice".into(),
            create_time: 0,
            update_time: 60,
        };

        let group = row.into_hostgroup("%H:%M");
        assert_eq!(group.hosts_id, ids(&["a", "b"]));
        assert_eq!(group.create_by, "alice");
        assert_eq!(group.create_time, "00:00");
        assert_eq!(group.update_time, "00:01");
    }
}
