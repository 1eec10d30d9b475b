//! Shared contract for managed-cluster Kubernetes clients
//!
//! This library provides:
//! - The error taxonomy used by every provider adapter
//! - Connection configuration types handed to the client factory
//! - The `KubernetesClientProvider` capability each adapter implements
//! - A `kube`-backed client factory

pub mod connection;
pub mod error;
pub mod factory;
pub mod provider;

pub use connection::{AuthProviderRef, ClusterEndpoint, ConnectionConfig, Credential};
pub use error::{Error, Result};
pub use factory::{install_crypto_provider, ClientFactory, KubeClientFactory};
pub use provider::KubernetesClientProvider;
