//! Kubernetes client construction from a finished connection configuration

use async_trait::async_trait;
use kube::Client;
use tracing::{debug, info};

use crate::{ConnectionConfig, Error, Result};

/// Turns a connection configuration into a client handle
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn produce_client(&self, config: ConnectionConfig) -> Result<Client>;
}

/// Factory backed by the `kube` client library.
///
/// Delegated auth providers are not run here; `kube` resolves them when the
/// client sends a request.
#[derive(Clone, Debug, Default)]
pub struct KubeClientFactory;

impl KubeClientFactory {
    pub fn new() -> Self {
        Self
    }
}

/// Select the process-level TLS crypto provider.
///
/// The cloud SDKs link a second rustls backend, after which rustls can no
/// longer pick one on its own. An already installed provider is kept.
pub fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn produce_client(&self, config: ConnectionConfig) -> Result<Client> {
        let kube_config = config.to_kube_config()?;
        debug!(
            "Creating Kubernetes client for cluster {} at {}",
            config.cluster, config.host
        );

        install_crypto_provider();
        let client = Client::try_from(kube_config)
            .map_err(|e| Error::delegation(&config.cluster, e.to_string()))?;

        info!("Created Kubernetes client for cluster {}", config.cluster);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::endpoint;
    use crate::Credential;

    #[tokio::test]
    async fn test_produce_client_with_bearer_token() {
        let config = ConnectionConfig::new(
            "prod",
            endpoint("https://10.0.0.1"),
            Credential::BearerToken("k8s-aws-v1.abc".to_string()),
        );

        let client = KubeClientFactory::new().produce_client(config).await;
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_produce_client_installs_crypto_provider() {
        let factory = KubeClientFactory::new();
        for _ in 0..2 {
            let config = ConnectionConfig::new(
                "prod",
                endpoint("https://10.0.0.1"),
                Credential::BearerToken("k8s-aws-v1.abc".to_string()),
            );
            assert!(factory.produce_client(config).await.is_ok());
        }
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }

    #[tokio::test]
    async fn test_produce_client_rejects_bad_ca() {
        let config = ConnectionConfig {
            cluster: "prod".to_string(),
            host: "https://10.0.0.1".to_string(),
            ca_data: Vec::new(),
            credential: Credential::BearerToken("token".to_string()),
        };

        match KubeClientFactory::new().produce_client(config).await {
            Err(Error::InvalidCertificate { cluster, .. }) => assert_eq!(cluster, "prod"),
            Err(other) => panic!("Expected InvalidCertificate, got {:?}", other),
            Ok(_) => panic!("Expected InvalidCertificate, got a client"),
        }
    }
}
