//! Cluster endpoint discovery through the EKS DescribeCluster API

use async_trait::async_trait;
use aws_sdk_eks::error::DisplayErrorContext;
use aws_sdk_eks::operation::describe_cluster::DescribeClusterOutput;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kubeauth_core::{ClusterEndpoint, Error, Result};
use tracing::debug;

/// Raw cluster details as reported by EKS
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterDescription {
    pub endpoint: String,
    /// Base64-encoded PEM certificate authority
    pub certificate_authority_data: String,
}

impl ClusterDescription {
    /// Extract the endpoint and CA from a DescribeCluster response.
    ///
    /// A response without a cluster, an endpoint or CA data is a lookup
    /// failure.
    pub fn from_output(cluster_name: &str, output: &DescribeClusterOutput) -> Result<Self> {
        let cluster = output
            .cluster()
            .ok_or_else(|| Error::lookup(cluster_name, "describe cluster returned no cluster"))?;

        let endpoint = cluster
            .endpoint()
            .ok_or_else(|| Error::lookup(cluster_name, "cluster has no endpoint"))?;

        let certificate_authority_data = cluster
            .certificate_authority()
            .and_then(|ca| ca.data())
            .ok_or_else(|| {
                Error::lookup(cluster_name, "cluster has no certificate authority data")
            })?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            certificate_authority_data: certificate_authority_data.to_string(),
        })
    }

    /// Decode the CA and pair it with the endpoint
    pub fn into_endpoint(self, cluster_name: &str) -> Result<ClusterEndpoint> {
        let ca_data = STANDARD.decode(&self.certificate_authority_data).map_err(|e| {
            Error::invalid_certificate(
                cluster_name,
                &self.certificate_authority_data,
                format!("error retrieving certificate authority data - {}", e),
            )
        })?;

        Ok(ClusterEndpoint {
            host: self.endpoint,
            ca_data,
        })
    }
}

/// Looks up a single cluster by name
#[async_trait]
pub trait ClusterDescriber: Send + Sync {
    async fn describe_cluster(&self, cluster_name: &str) -> Result<ClusterDescription>;
}

/// DescribeCluster over the AWS SDK
pub struct EksDescriber {
    client: aws_sdk_eks::Client,
}

impl EksDescriber {
    pub fn new(client: aws_sdk_eks::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterDescriber for EksDescriber {
    async fn describe_cluster(&self, cluster_name: &str) -> Result<ClusterDescription> {
        let output = self
            .client
            .describe_cluster()
            .name(cluster_name)
            .send()
            .await
            .map_err(|e| {
                Error::lookup(
                    cluster_name,
                    format!("error describing cluster - {}", DisplayErrorContext(&e)),
                )
            })?;

        let description = ClusterDescription::from_output(cluster_name, &output)?;
        debug!("Described cluster {} at {}", cluster_name, description.endpoint);
        Ok(description)
    }
}
