//! Capability shared by every managed-cluster adapter

use async_trait::async_trait;
use kube::Client;

use crate::Result;

/// Produces an authenticated Kubernetes client for one managed cluster.
///
/// Every call performs a fresh discovery and credential derivation; nothing
/// is cached between calls.
#[async_trait]
pub trait KubernetesClientProvider: Send + Sync {
    /// Name of the cluster this provider targets
    fn cluster_name(&self) -> &str;

    /// Discover the cluster, derive credentials and build a client
    async fn new_for_kubernetes(&self) -> Result<Client>;
}
