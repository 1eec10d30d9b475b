//! Named kubeconfig assembly for GKE clusters
//!
//! GKE has no signable identity header, so the kubeconfig carries a `gcp`
//! auth-provider entry instead of a token. The Kubernetes client mints an
//! OAuth token through that provider when it connects.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kube::config::{
    AuthInfo, AuthProviderConfig, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use kubeauth_core::{AuthProviderRef, ConnectionConfig, Credential, Error, Result};

use crate::container::CLOUD_PLATFORM_SCOPE;

/// Auth provider plugin name understood by Kubernetes clients
pub const AUTH_PROVIDER_NAME: &str = "gcp";

/// An empty `v1` kubeconfig
pub fn empty_kubeconfig() -> Kubeconfig {
    Kubeconfig {
        api_version: Some("v1".to_string()),
        kind: Some("Config".to_string()),
        ..Default::default()
    }
}

/// The delegated auth provider for GKE
pub fn gcp_auth_provider() -> AuthProviderRef {
    AuthProviderRef::new(AUTH_PROVIDER_NAME).with_config("scopes", CLOUD_PLATFORM_SCOPE)
}

/// Register cluster, context and auth-info entries for `name`.
///
/// Existing entries with the same name are replaced.
pub fn register_cluster(kubeconfig: &mut Kubeconfig, name: &str, endpoint: &str, ca_data: &[u8]) {
    let cluster = NamedCluster {
        name: name.to_string(),
        cluster: Some(Cluster {
            server: Some(format!("https://{}", endpoint)),
            certificate_authority_data: Some(STANDARD.encode(ca_data)),
            ..Default::default()
        }),
    };
    kubeconfig.clusters.retain(|entry| entry.name != name);
    kubeconfig.clusters.push(cluster);

    let context = NamedContext {
        name: name.to_string(),
        context: Some(Context {
            cluster: name.to_string(),
            user: name.to_string(),
            ..Default::default()
        }),
    };
    kubeconfig.contexts.retain(|entry| entry.name != name);
    kubeconfig.contexts.push(context);

    let auth_info = NamedAuthInfo {
        name: name.to_string(),
        auth_info: Some(AuthInfo {
            auth_provider: Some(AuthProviderConfig::from(gcp_auth_provider())),
            ..Default::default()
        }),
    };
    kubeconfig.auth_infos.retain(|entry| entry.name != name);
    kubeconfig.auth_infos.push(auth_info);
}

/// Resolve `context_name` into a connection configuration.
///
/// Nothing is prompted for and nothing is read from disk; every entry must
/// already be present in `kubeconfig`.
pub fn realize(kubeconfig: &Kubeconfig, context_name: &str) -> Result<ConnectionConfig> {
    let context = kubeconfig
        .contexts
        .iter()
        .find(|entry| entry.name == context_name)
        .and_then(|entry| entry.context.as_ref())
        .ok_or_else(|| {
            Error::configuration(format!("context [{}] not found in kubeconfig", context_name))
        })?;

    let cluster = kubeconfig
        .clusters
        .iter()
        .find(|entry| entry.name == context.cluster)
        .and_then(|entry| entry.cluster.as_ref())
        .ok_or_else(|| {
            Error::configuration(format!(
                "cluster [{}] referenced by context [{}] not found in kubeconfig",
                context.cluster, context_name
            ))
        })?;

    let server = cluster.server.clone().ok_or_else(|| {
        Error::configuration(format!("cluster [{}] has no server", context.cluster))
    })?;

    let encoded_ca = cluster.certificate_authority_data.as_deref().unwrap_or_default();
    let ca_data = STANDARD
        .decode(encoded_ca)
        .map_err(|e| Error::invalid_certificate(context_name, encoded_ca, e.to_string()))?;

    let auth_provider = kubeconfig
        .auth_infos
        .iter()
        .find(|entry| entry.name == context.user)
        .and_then(|entry| entry.auth_info.as_ref())
        .and_then(|auth_info| auth_info.auth_provider.clone())
        .ok_or_else(|| {
            Error::configuration(format!(
                "user [{}] referenced by context [{}] has no auth provider",
                context.user, context_name
            ))
        })?;

    Ok(ConnectionConfig {
        cluster: context_name.to_string(),
        host: server,
        ca_data,
        credential: Credential::AuthProvider(auth_provider.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_kubeconfig() {
        let kubeconfig = empty_kubeconfig();
        assert_eq!(kubeconfig.api_version.as_deref(), Some("v1"));
        assert_eq!(kubeconfig.kind.as_deref(), Some("Config"));
        assert!(kubeconfig.clusters.is_empty());
        assert!(kubeconfig.contexts.is_empty());
        assert!(kubeconfig.auth_infos.is_empty());
    }

    #[test]
    fn test_register_cluster_links_entries() {
        let mut kubeconfig = empty_kubeconfig();
        register_cluster(&mut kubeconfig, "target", "34.1.2.3", b"pem");

        assert_eq!(kubeconfig.clusters.len(), 1);
        let cluster = kubeconfig.clusters[0].cluster.as_ref().expect("cluster entry");
        assert_eq!(cluster.server.as_deref(), Some("https://34.1.2.3"));
        assert_eq!(cluster.certificate_authority_data.as_deref(), Some("cGVt"));

        let context = kubeconfig.contexts[0].context.as_ref().expect("context entry");
        assert_eq!(context.cluster, "target");
        assert_eq!(context.user, "target");

        let auth_info = kubeconfig.auth_infos[0].auth_info.as_ref().expect("auth info entry");
        assert!(auth_info.token.is_none());
        let provider = auth_info.auth_provider.as_ref().expect("auth provider");
        assert_eq!(provider.name, "gcp");
        assert_eq!(provider.config.get("scopes").map(String::as_str), Some(CLOUD_PLATFORM_SCOPE));
    }

    #[test]
    fn test_register_cluster_replaces_existing_entry() {
        let mut kubeconfig = empty_kubeconfig();
        register_cluster(&mut kubeconfig, "target", "34.1.2.3", b"old");
        register_cluster(&mut kubeconfig, "target", "34.1.2.4", b"new");

        assert_eq!(kubeconfig.clusters.len(), 1);
        assert_eq!(kubeconfig.contexts.len(), 1);
        assert_eq!(kubeconfig.auth_infos.len(), 1);
        let cluster = kubeconfig.clusters[0].cluster.as_ref().expect("cluster entry");
        assert_eq!(cluster.server.as_deref(), Some("https://34.1.2.4"));
    }

    #[test]
    fn test_realize_selects_context() {
        let mut kubeconfig = empty_kubeconfig();
        register_cluster(&mut kubeconfig, "other", "10.0.0.1", b"other-pem");
        register_cluster(&mut kubeconfig, "target", "34.1.2.3", b"target-pem");

        let connection = realize(&kubeconfig, "target").expect("context should realize");
        assert_eq!(connection.cluster, "target");
        assert_eq!(connection.host, "https://34.1.2.3");
        assert_eq!(connection.ca_data, b"target-pem".to_vec());
        assert_eq!(connection.auth_provider(), Some(&gcp_auth_provider()));
        assert!(connection.bearer_token().is_none());
    }

    #[test]
    fn test_realize_missing_context() {
        let kubeconfig = empty_kubeconfig();

        match realize(&kubeconfig, "target") {
            Err(Error::Configuration { message }) => assert!(message.contains("target")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_realize_requires_auth_provider() {
        let mut kubeconfig = empty_kubeconfig();
        register_cluster(&mut kubeconfig, "target", "34.1.2.3", b"pem");
        kubeconfig.auth_infos.clear();

        match realize(&kubeconfig, "target") {
            Err(Error::Configuration { message }) => assert!(message.contains("auth provider")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }
}
