//! Connection configuration handed to the Kubernetes client factory

use std::collections::HashMap;
use std::fmt;
use std::io::BufReader;

use kube::config::{AuthInfo, AuthProviderConfig};
use rustls_pemfile::certs;
use secrecy::SecretString;
use tracing::debug;

use crate::{Error, Result};

/// Network location and trust anchor of a managed cluster
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterEndpoint {
    /// Control plane URL
    pub host: String,
    /// PEM-encoded CA certificate, decoded from the provider's base64 field
    pub ca_data: Vec<u8>,
}

/// Reference to an auth plugin that the Kubernetes client invokes at
/// connection time to mint its own token
#[derive(Clone, Debug, PartialEq)]
pub struct AuthProviderRef {
    pub name: String,
    pub config: HashMap<String, String>,
}

impl AuthProviderRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: HashMap::new(),
        }
    }

    /// Add a plugin setting
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

impl From<AuthProviderRef> for AuthProviderConfig {
    fn from(provider: AuthProviderRef) -> Self {
        AuthProviderConfig {
            name: provider.name,
            config: provider.config,
        }
    }
}

impl From<AuthProviderConfig> for AuthProviderRef {
    fn from(provider: AuthProviderConfig) -> Self {
        AuthProviderRef {
            name: provider.name,
            config: provider.config,
        }
    }
}

/// The single credential carried by a connection
#[derive(Clone, PartialEq)]
pub enum Credential {
    /// Static bearer token sent with every request
    BearerToken(String),
    /// Delegated auth plugin resolved by the client library
    AuthProvider(AuthProviderRef),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            Credential::AuthProvider(provider) => {
                f.debug_tuple("AuthProvider").field(provider).finish()
            }
        }
    }
}

/// Host, trust anchor and credential for one cluster
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionConfig {
    /// Name of the cluster this connection targets, used in error context
    pub cluster: String,
    pub host: String,
    pub ca_data: Vec<u8>,
    pub credential: Credential,
}

impl ConnectionConfig {
    pub fn new(
        cluster: impl Into<String>,
        endpoint: ClusterEndpoint,
        credential: Credential,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            host: endpoint.host,
            ca_data: endpoint.ca_data,
            credential,
        }
    }

    /// Bearer token, if this connection carries one
    pub fn bearer_token(&self) -> Option<&str> {
        match &self.credential {
            Credential::BearerToken(token) => Some(token),
            Credential::AuthProvider(_) => None,
        }
    }

    /// Delegated auth provider, if this connection carries one
    pub fn auth_provider(&self) -> Option<&AuthProviderRef> {
        match &self.credential {
            Credential::BearerToken(_) => None,
            Credential::AuthProvider(provider) => Some(provider),
        }
    }

    /// Parse the CA data into DER certificates
    pub fn root_certificates(&self) -> Result<Vec<Vec<u8>>> {
        let mut reader = BufReader::new(self.ca_data.as_slice());
        let parsed = certs(&mut reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                Error::invalid_certificate(
                    &self.cluster,
                    &String::from_utf8_lossy(&self.ca_data),
                    format!("failed to parse certificates: {}", e),
                )
            })?;

        if parsed.is_empty() {
            return Err(Error::invalid_certificate(
                &self.cluster,
                &String::from_utf8_lossy(&self.ca_data),
                "no certificates found in CA data",
            ));
        }

        debug!("Loaded {} CA certificate(s) for cluster {}", parsed.len(), self.cluster);
        Ok(parsed.into_iter().map(|cert| cert.as_ref().to_vec()).collect())
    }

    /// Build the `kube` client configuration for this connection
    pub fn to_kube_config(&self) -> Result<kube::Config> {
        let cluster_url: http::Uri = self.host.parse().map_err(|e| {
            Error::delegation(&self.cluster, format!("invalid host [{}]: {}", self.host, e))
        })?;

        let mut config = kube::Config::new(cluster_url);
        config.root_cert = Some(self.root_certificates()?);
        config.auth_info = match &self.credential {
            Credential::BearerToken(token) => AuthInfo {
                token: Some(SecretString::new(token.clone())),
                ..Default::default()
            },
            Credential::AuthProvider(provider) => AuthInfo {
                auth_provider: Some(provider.clone().into()),
                ..Default::default()
            },
        };

        Ok(config)
    }
}
