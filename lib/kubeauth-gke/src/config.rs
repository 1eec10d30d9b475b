//! GKE cluster configuration

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kube::config::Kubeconfig;
use kube::Client;
use kubeauth_core::{
    ClientFactory, ConnectionConfig, Error, KubeClientFactory, KubernetesClientProvider, Result,
};
use tracing::{debug, info, instrument, warn};

use crate::container::{
    AccessTokenSource, AdcTokenSource, ClusterLister, ContainerClient, ContainerError, ALL_ZONES,
};
use crate::kubeconfig::{empty_kubeconfig, realize, register_cluster};

/// Everything needed to build a Kubernetes client for one GKE cluster
pub struct GkeConfig {
    cluster_name: String,
    project: String,
    zone: String,
    lister: Arc<dyn ClusterLister>,
    factory: Arc<dyn ClientFactory>,
}

impl GkeConfig {
    /// Build the container API client from Application Default Credentials.
    ///
    /// No cluster API call is made until `new_for_kubernetes`, but credential
    /// discovery may query the GCE metadata server when nothing else is
    /// configured.
    pub async fn new(
        cluster_name: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self> {
        let tokens = AdcTokenSource::discover().await.map_err(client_error)?;
        Ok(Self::from_token_source(cluster_name, project, zone, Arc::new(tokens)))
    }

    /// Build the container API client from a service account key file
    pub fn from_service_account_file(
        cluster_name: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let tokens = AdcTokenSource::from_service_account_file(path).map_err(client_error)?;
        Ok(Self::from_token_source(cluster_name, project, zone, Arc::new(tokens)))
    }

    /// Build the container API client over an explicit token source
    pub fn from_token_source(
        cluster_name: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        let lister = Arc::new(ContainerClient::new(tokens));
        Self::from_parts(cluster_name, project, zone, lister)
    }

    /// Build from an explicit cluster lister
    pub fn from_parts(
        cluster_name: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
        lister: Arc<dyn ClusterLister>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            project: project.into(),
            zone: zone.into(),
            lister,
            factory: Arc::new(KubeClientFactory::new()),
        }
    }

    /// Replace the client factory
    pub fn with_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Find the cluster across all zones of the project and build a
    /// kubeconfig whose only context targets it
    pub async fn kubeconfig(&self) -> Result<Kubeconfig> {
        let clusters = self
            .lister
            .list_clusters(&self.project, ALL_ZONES)
            .await
            .map_err(|e| {
                Error::lookup(
                    &self.cluster_name,
                    format!(
                        "error getting container cluster in project [{}] and zone [{}] - {}",
                        self.project, self.zone, e
                    ),
                )
            })?;

        debug!("Scanning {} clusters in project {}", clusters.len(), self.project);

        // TODO: use projects.locations.clusters.get instead of scanning every cluster
        for cluster in clusters {
            if cluster.name != self.cluster_name {
                continue;
            }

            let encoded_ca = cluster
                .master_auth
                .map(|auth| auth.cluster_ca_certificate)
                .unwrap_or_default();
            if encoded_ca.is_empty() {
                return Err(Error::invalid_certificate(
                    &self.cluster_name,
                    &encoded_ca,
                    "cluster has no CA certificate",
                ));
            }

            let ca_data = STANDARD.decode(&encoded_ca).map_err(|e| {
                Error::invalid_certificate(&self.cluster_name, &encoded_ca, e.to_string())
            })?;

            let mut kubeconfig = empty_kubeconfig();
            register_cluster(&mut kubeconfig, &self.cluster_name, &cluster.endpoint, &ca_data);
            kubeconfig.current_context = Some(self.cluster_name.clone());
            return Ok(kubeconfig);
        }

        Err(Error::ClusterNotFound {
            cluster: self.cluster_name.clone(),
            project: self.project.clone(),
            zone: self.zone.clone(),
        })
    }

    /// Assemble the connection configuration without building a client
    pub async fn connection_config(&self) -> Result<ConnectionConfig> {
        let kubeconfig = self.kubeconfig().await?;
        realize(&kubeconfig, &self.cluster_name)
    }
}

fn client_error(e: ContainerError) -> Error {
    Error::configuration(format!("error creating container cluster client - {}", e))
}

#[async_trait]
impl KubernetesClientProvider for GkeConfig {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    #[instrument(skip(self), fields(cluster = %self.cluster_name, project = %self.project))]
    async fn new_for_kubernetes(&self) -> Result<Client> {
        let config = self.connection_config().await.map_err(|e| {
            warn!("Failed to prepare GKE connection: {}", e);
            e
        })?;

        let client = self.factory.produce_client(config).await?;
        info!("Connected to GKE cluster {}", self.cluster_name);
        Ok(client)
    }
}
