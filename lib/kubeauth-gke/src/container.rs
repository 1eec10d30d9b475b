//! GKE container API client

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use kubeauth_core::install_crypto_provider;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// OAuth scope granting full platform access
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Zone selector matching every zone of a project
pub const ALL_ZONES: &str = "-";

const CONTAINER_API_URL: &str = "https://container.googleapis.com";

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("GCP authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("container API returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// A cluster entry from the list clusters response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GkeCluster {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub master_auth: Option<MasterAuth>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterAuth {
    /// Base64-encoded PEM certificate authority
    #[serde(default)]
    pub cluster_ca_certificate: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListClustersResponse {
    #[serde(default)]
    clusters: Vec<GkeCluster>,
}

/// Lists the clusters of a project
#[async_trait]
pub trait ClusterLister: Send + Sync {
    async fn list_clusters(
        &self,
        project: &str,
        zone: &str,
    ) -> Result<Vec<GkeCluster>, ContainerError>;
}

/// Source of OAuth access tokens for the container API
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ContainerError>;
}

/// Application Default Credentials scoped to the cloud platform
pub struct AdcTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl AdcTokenSource {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }

    /// Discover credentials from the environment.
    ///
    /// When neither `GOOGLE_APPLICATION_CREDENTIALS` nor gcloud user
    /// credentials are present this asks the GCE metadata server.
    pub async fn discover() -> Result<Self, ContainerError> {
        install_crypto_provider();
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| ContainerError::Auth(e.to_string()))?;
        Ok(Self::new(provider))
    }

    /// Load a service account key file without touching the network
    pub fn from_service_account_file(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        install_crypto_provider();
        let account = gcp_auth::CustomServiceAccount::from_file(path)
            .map_err(|e| ContainerError::Auth(e.to_string()))?;
        Ok(Self::new(Arc::new(account)))
    }
}

#[async_trait]
impl AccessTokenSource for AdcTokenSource {
    async fn access_token(&self) -> Result<String, ContainerError> {
        let token = self
            .provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| ContainerError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }
}

/// REST client for the `container.googleapis.com` v1 API
pub struct ContainerClient {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    base_url: String,
}

impl ContainerClient {
    pub fn new(tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
            base_url: CONTAINER_API_URL.to_string(),
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn clusters_url(&self, project: &str, zone: &str) -> String {
        format!("{}/v1/projects/{}/zones/{}/clusters", self.base_url, project, zone)
    }
}

#[async_trait]
impl ClusterLister for ContainerClient {
    async fn list_clusters(
        &self,
        project: &str,
        zone: &str,
    ) -> Result<Vec<GkeCluster>, ContainerError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.clusters_url(project, zone))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContainerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let list: ListClustersResponse = response.json().await?;
        debug!("Listed {} clusters in project {}", list.clusters.len(), project);
        Ok(list.clusters)
    }
}
