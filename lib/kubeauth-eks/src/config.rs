//! EKS cluster configuration

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use kube::Client;
use kubeauth_core::{
    install_crypto_provider, ClientFactory, ClusterEndpoint, ConnectionConfig, Credential, Error,
    KubeClientFactory, KubernetesClientProvider, Result,
};
use tracing::{debug, info, instrument, warn};

use crate::describe::{ClusterDescriber, EksDescriber};
use crate::token::{IdentitySigner, SignedToken, StsTokenSigner};

/// Everything needed to build a Kubernetes client for one EKS cluster.
///
/// Signing and cluster description are two views over the same resolved
/// region and credentials.
pub struct EksConfig {
    cluster_name: String,
    signer: Arc<dyn IdentitySigner>,
    describer: Arc<dyn ClusterDescriber>,
    factory: Arc<dyn ClientFactory>,
}

impl EksConfig {
    /// Load the ambient AWS configuration for `cluster_name`.
    ///
    /// Fails without touching the network when no region resolves.
    pub async fn new(cluster_name: impl Into<String>) -> Result<Self> {
        let cluster_name = cluster_name.into();
        install_crypto_provider();
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::from_sdk_config(cluster_name, &sdk_config)
    }

    /// Build from an already loaded SDK configuration
    pub fn from_sdk_config(
        cluster_name: impl Into<String>,
        sdk_config: &SdkConfig,
    ) -> Result<Self> {
        let cluster_name = cluster_name.into();

        let region = sdk_config
            .region()
            .map(|region| region.as_ref().to_string())
            .filter(|region| !region.is_empty())
            .ok_or_else(|| Error::configuration("missing region from config"))?;

        let credentials = sdk_config.credentials_provider().ok_or_else(|| {
            Error::configuration(format!(
                "error creating EKSConfig for cluster [{}] - no credentials provider",
                cluster_name
            ))
        })?;

        debug!("Loaded AWS configuration for cluster {} in {}", cluster_name, region);

        Ok(Self::from_parts(
            cluster_name,
            Arc::new(StsTokenSigner::new(region, credentials)),
            Arc::new(EksDescriber::new(aws_sdk_eks::Client::new(sdk_config))),
        ))
    }

    /// Build from explicit signing and description capabilities
    pub fn from_parts(
        cluster_name: impl Into<String>,
        signer: Arc<dyn IdentitySigner>,
        describer: Arc<dyn ClusterDescriber>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            signer,
            describer,
            factory: Arc::new(KubeClientFactory::new()),
        }
    }

    /// Replace the client factory
    pub fn with_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Mint a bearer token for this cluster
    pub async fn token(&self) -> Result<SignedToken> {
        self.signer.sign_token(&self.cluster_name).await
    }

    /// Look up the cluster endpoint and decoded CA
    pub async fn describe_endpoint(&self) -> Result<ClusterEndpoint> {
        let description = self.describer.describe_cluster(&self.cluster_name).await?;
        description.into_endpoint(&self.cluster_name)
    }

    /// Assemble the connection configuration without building a client
    pub async fn connection_config(&self) -> Result<ConnectionConfig> {
        let token = self.token().await?;
        let endpoint = self.describe_endpoint().await?;

        Ok(ConnectionConfig::new(
            self.cluster_name.clone(),
            endpoint,
            Credential::BearerToken(token.token),
        ))
    }
}

#[async_trait]
impl KubernetesClientProvider for EksConfig {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    #[instrument(skip(self), fields(cluster = %self.cluster_name))]
    async fn new_for_kubernetes(&self) -> Result<Client> {
        let config = self.connection_config().await.map_err(|e| {
            warn!("Failed to prepare EKS connection: {}", e);
            e
        })?;

        let client = self.factory.produce_client(config).await?;
        info!("Connected to EKS cluster {}", self.cluster_name);
        Ok(client)
    }
}
