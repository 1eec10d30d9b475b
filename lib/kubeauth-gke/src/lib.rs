//! Kubernetes clients for Google GKE clusters
//!
//! The cluster is found by listing every cluster of the project; the client
//! authenticates through the `gcp` auth provider rather than a static token.

pub mod config;
pub mod container;
pub mod kubeconfig;

pub use config::GkeConfig;
pub use container::{
    AccessTokenSource, AdcTokenSource, ClusterLister, ContainerClient, ContainerError, GkeCluster,
    MasterAuth,
};
