//! Domain types returned to callers
//!
//! Every value here is a detached copy built from a fresh read; nothing
//! holds a live reference into the store.

use serde::{Deserialize, Serialize};

/// A named pool of worker hosts that a scheduled task may run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostGroup {
    pub id: String,
    pub name: String,
    pub remark: String,
    /// Member host ids in stored order
    pub hosts_id: Vec<String>,
    pub create_by_id: String,
    /// Creator display name, joined from the principal table at read time
    pub create_by: String,
    pub create_time: String,
    pub update_time: String,
}

impl HostGroup {
    pub fn is_empty(&self) -> bool {
        self.hosts_id.is_empty()
    }
}

/// One page of host groups.
///
/// `total` is only computed for paginated listings; an unpaginated
/// listing reports 0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostGroupPage {
    pub groups: Vec<HostGroup>,
    pub total: u64,
}

/// A worker host as known to the host registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub id: String,
    pub addr: String,
    pub hostname: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub online: bool,
    /// Paused by an operator; still a member, but not expected to take work
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub last_update_time: String,
}

/// The account that created a host group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub create_time: String,
}
