//! Host group → host record resolution

use std::sync::Arc;

use tracing::debug;

use crate::db::HostGroupStore;
use crate::error::HostGroupError;
use crate::model::Host;
use crate::registry::HostRegistry;

/// Joins a group's membership against the live host registry
#[derive(Clone)]
pub struct HostGroupResolver {
    store: HostGroupStore,
    registry: Arc<dyn HostRegistry>,
}

impl HostGroupResolver {
    pub fn new(store: HostGroupStore, registry: Arc<dyn HostRegistry>) -> Self {
        Self { store, registry }
    }

    /// Host records for every member of a group.
    ///
    /// `NotFound` from the group lookup is passed through untouched. An
    /// empty group returns no hosts without asking the registry. Otherwise
    /// the registry's answer is returned as is.
    pub async fn get_hosts_by_group_id(&self, group_id: &str) -> Result<Vec<Host>, HostGroupError> {
        let group = self.store.get_by_id(group_id).await?;

        if group.hosts_id.is_empty() {
            debug!(group_id = %group_id, "Hostgroup has no members");
            return Ok(Vec::new());
        }

        self.registry
            .resolve_hosts(&group.hosts_id)
            .await
            .map_err(|source| HostGroupError::Registry {
                group_id: group_id.to_string(),
                source,
            })
    }
}
