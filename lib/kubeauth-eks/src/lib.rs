//! Kubernetes clients for Amazon EKS clusters
//!
//! Authentication uses a presigned STS GetCallerIdentity URL as the bearer
//! token; the endpoint and CA come from DescribeCluster.

pub mod config;
pub mod describe;
pub mod token;

pub use config::EksConfig;
pub use describe::{ClusterDescriber, ClusterDescription, EksDescriber};
pub use token::{IdentitySigner, SignedToken, StsTokenSigner};
