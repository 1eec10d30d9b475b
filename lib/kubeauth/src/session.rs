//! Provider selection

use async_trait::async_trait;
use kube::Client;
use kubeauth_core::{ConnectionConfig, KubernetesClientProvider, Result};
use kubeauth_eks::EksConfig;
use kubeauth_gke::GkeConfig;
use tracing::debug;

/// A configured managed-cluster provider
pub enum ProviderSession {
    Eks(EksConfig),
    Gke(GkeConfig),
}

/// Session for an EKS cluster using the ambient AWS configuration
pub async fn new_eks_config(cluster_name: impl Into<String>) -> Result<ProviderSession> {
    let config = EksConfig::new(cluster_name).await?;
    debug!("Configured EKS session for cluster {}", config.cluster_name());
    Ok(ProviderSession::Eks(config))
}

/// Session for a GKE cluster using Application Default Credentials
pub async fn new_gke_config(
    cluster_name: impl Into<String>,
    project: impl Into<String>,
    zone: impl Into<String>,
) -> Result<ProviderSession> {
    let config = GkeConfig::new(cluster_name, project, zone).await?;
    debug!("Configured GKE session for cluster {}", config.cluster_name());
    Ok(ProviderSession::Gke(config))
}

impl ProviderSession {
    /// Short provider name
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderSession::Eks(_) => "eks",
            ProviderSession::Gke(_) => "gke",
        }
    }

    /// Assemble the connection configuration without building a client
    pub async fn connection_config(&self) -> Result<ConnectionConfig> {
        match self {
            ProviderSession::Eks(config) => config.connection_config().await,
            ProviderSession::Gke(config) => config.connection_config().await,
        }
    }
}

impl From<EksConfig> for ProviderSession {
    fn from(config: EksConfig) -> Self {
        ProviderSession::Eks(config)
    }
}

impl From<GkeConfig> for ProviderSession {
    fn from(config: GkeConfig) -> Self {
        ProviderSession::Gke(config)
    }
}

#[async_trait]
impl KubernetesClientProvider for ProviderSession {
    fn cluster_name(&self) -> &str {
        match self {
            ProviderSession::Eks(config) => config.cluster_name(),
            ProviderSession::Gke(config) => config.cluster_name(),
        }
    }

    async fn new_for_kubernetes(&self) -> Result<Client> {
        match self {
            ProviderSession::Eks(config) => config.new_for_kubernetes().await,
            ProviderSession::Gke(config) => config.new_for_kubernetes().await,
        }
    }
}
