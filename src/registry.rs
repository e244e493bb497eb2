//! Host registry seam
//!
//! The registry owns live worker records: address, liveness, operator
//! pause. The host group layer only hands it ids.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::model::Host;

#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Resolve host ids to host records. Unknown ids are simply absent
    /// from the result.
    async fn resolve_hosts(&self, host_ids: &[String]) -> Result<Vec<Host>, BoxError>;
}
