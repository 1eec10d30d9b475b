//! Authenticated Kubernetes clients for managed EKS and GKE clusters
//!
//! Callers pick a provider by constructor and then ask the session for a
//! client:
//!
//! ```no_run
//! # async fn run() -> kubeauth::Result<()> {
//! use kubeauth::KubernetesClientProvider;
//!
//! let session = kubeauth::new_eks_config("prod").await?;
//! let client = session.new_for_kubernetes().await?;
//! # drop(client);
//! # Ok(())
//! # }
//! ```

pub mod session;

pub use kubeauth_core::{
    AuthProviderRef, ClientFactory, ClusterEndpoint, ConnectionConfig, Credential, Error,
    KubeClientFactory, KubernetesClientProvider, Result,
};
pub use kubeauth_eks::EksConfig;
pub use kubeauth_gke::GkeConfig;
pub use session::{new_eks_config, new_gke_config, ProviderSession};
