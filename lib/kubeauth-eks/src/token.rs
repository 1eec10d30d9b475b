//! EKS bearer tokens built from presigned STS GetCallerIdentity URLs
//!
//! The token is never sent to STS by this crate. The cluster's authenticator
//! replays the presigned URL against STS to learn the caller's identity. The
//! `x-k8s-aws-id` header is covered by the signature, so a token minted for
//! one cluster is rejected by every other cluster.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SignatureLocation, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use kubeauth_core::{Error, Result};
use tracing::debug;
use url::Url;

/// Header binding the signature to a cluster name
pub const CLUSTER_HEADER: &str = "x-k8s-aws-id";

/// Marker the EKS authenticator expects in front of the encoded URL
pub const TOKEN_PREFIX: &str = "k8s-aws-v1.";

/// Validity window of the presigned URL
pub const PRESIGN_VALIDITY: Duration = Duration::from_secs(60);

const STS_SERVICE: &str = "sts";
const STS_QUERY: &str = "Action=GetCallerIdentity&Version=2011-06-15";

/// A bearer token for one EKS cluster
#[derive(Clone)]
pub struct SignedToken {
    pub token: String,
    /// End of the presign validity window
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints cluster-scoped identity tokens
#[async_trait]
pub trait IdentitySigner: Send + Sync {
    async fn sign_token(&self, cluster_name: &str) -> Result<SignedToken>;
}

/// Signs GetCallerIdentity requests with the ambient AWS credentials
pub struct StsTokenSigner {
    region: String,
    credentials: SharedCredentialsProvider,
}

impl StsTokenSigner {
    pub fn new(region: impl Into<String>, credentials: SharedCredentialsProvider) -> Self {
        Self {
            region: region.into(),
            credentials,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl IdentitySigner for StsTokenSigner {
    async fn sign_token(&self, cluster_name: &str) -> Result<SignedToken> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| {
                Error::signing(cluster_name, format!("unable to resolve credentials - {}", e))
            })?;

        presign_token(&credentials, &self.region, cluster_name, SystemTime::now())
    }
}

/// Regional STS endpoint for an unsigned GetCallerIdentity request
pub fn sts_url(region: &str) -> Result<Url> {
    Url::parse(&format!("https://sts.{}.amazonaws.com/?{}", region, STS_QUERY)).map_err(|e| {
        Error::configuration(format!(
            "invalid STS endpoint for region [{}] - {}",
            region, e
        ))
    })
}

/// Presign GetCallerIdentity for `cluster_name` at `time` and encode it as a token
pub fn presign_token(
    credentials: &Credentials,
    region: &str,
    cluster_name: &str,
    time: SystemTime,
) -> Result<SignedToken> {
    let presigned = presign_url(credentials, region, cluster_name, time)?;

    Ok(SignedToken {
        token: encode_token(presigned.as_str()),
        expires_at: DateTime::<Utc>::from(time + PRESIGN_VALIDITY),
    })
}

/// Presign GetCallerIdentity with the cluster header in the signature
pub fn presign_url(
    credentials: &Credentials,
    region: &str,
    cluster_name: &str,
    time: SystemTime,
) -> Result<Url> {
    let identity: Identity = credentials.clone().into();

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(PRESIGN_VALIDITY);

    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(STS_SERVICE)
        .time(time)
        .settings(settings)
        .build()
        .map_err(|e| Error::signing(cluster_name, format!("invalid signing parameters - {}", e)))?
        .into();

    let url = sts_url(region)?;
    let request = SignableRequest::new(
        "GET",
        url.as_str(),
        std::iter::once((CLUSTER_HEADER, cluster_name)),
        SignableBody::Bytes(&[]),
    )
    .map_err(|e| Error::signing(cluster_name, format!("error building request - {}", e)))?;

    let (instructions, _signature) = sign(request, &params)
        .map_err(|e| Error::signing(cluster_name, format!("error pre-signing request - {}", e)))?
        .into_parts();

    let mut presigned = url;
    {
        let mut query = presigned.query_pairs_mut();
        for (name, value) in instructions.params() {
            query.append_pair(name, value);
        }
    }

    debug!("Presigned STS request for cluster {} in {}", cluster_name, region);
    Ok(presigned)
}

/// Prefix the base64url (unpadded) URL with the EKS token marker
pub fn encode_token(presigned_url: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(presigned_url))
}

/// Recover the presigned URL from a token
pub fn decode_token(token: &str) -> Option<String> {
    let encoded = token.strip_prefix(TOKEN_PREFIX)?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
            None,
            "test",
        )
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn test_token_has_prefix_and_unpadded_base64url() {
        let signed = presign_token(&credentials(), "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");

        assert!(signed.token.starts_with(TOKEN_PREFIX));
        let encoded = &signed.token[TOKEN_PREFIX.len()..];
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(URL_SAFE_NO_PAD.decode(encoded).is_ok());
    }

    #[test]
    fn test_decoded_token_is_presigned_sts_url() {
        let signed = presign_token(&credentials(), "eu-west-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");
        let decoded = decode_token(&signed.token).expect("token should decode");
        let url = Url::parse(&decoded).expect("decoded token should be a URL");

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("sts.eu-west-1.amazonaws.com"));
        assert_eq!(query_value(&url, "Action").as_deref(), Some("GetCallerIdentity"));
        assert_eq!(query_value(&url, "Version").as_deref(), Some("2011-06-15"));
        assert_eq!(query_value(&url, "X-Amz-Expires").as_deref(), Some("60"));
        assert_eq!(query_value(&url, "X-Amz-Algorithm").as_deref(), Some("AWS4-HMAC-SHA256"));

        let signed_headers = query_value(&url, "X-Amz-SignedHeaders").expect("signed headers");
        assert!(signed_headers.split(';').any(|h| h == CLUSTER_HEADER));

        let credential = query_value(&url, "X-Amz-Credential").expect("credential scope");
        assert!(credential.starts_with("AKIDEXAMPLE/"));
        assert!(credential.ends_with("/eu-west-1/sts/aws4_request"));
        assert!(query_value(&url, "X-Amz-Signature").is_some());
    }

    #[test]
    fn test_tokens_differ_across_validity_windows() {
        let first = presign_token(&credentials(), "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");
        let second = presign_token(&credentials(), "us-east-1", "prod", at(1_700_000_061))
            .expect("presign should succeed");

        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_signature_is_bound_to_cluster_name() {
        let prod = presign_url(&credentials(), "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");
        let staging = presign_url(&credentials(), "us-east-1", "staging", at(1_700_000_000))
            .expect("presign should succeed");

        assert_eq!(query_value(&prod, "X-Amz-Date"), query_value(&staging, "X-Amz-Date"));
        assert_ne!(
            query_value(&prod, "X-Amz-Signature"),
            query_value(&staging, "X-Amz-Signature")
        );
    }

    #[test]
    fn test_signing_is_deterministic_for_fixed_inputs() {
        let first = presign_token(&credentials(), "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");
        let second = presign_token(&credentials(), "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");

        assert_eq!(first.token, second.token);
    }

    #[test]
    fn test_session_token_is_carried_in_url() {
        let credentials = Credentials::new(
            "ASIAEXAMPLE",
            "secret",
            Some("session/token+value=".to_string()),
            None,
            "test",
        );
        let url = presign_url(&credentials, "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");

        assert_eq!(
            query_value(&url, "X-Amz-Security-Token").as_deref(),
            Some("session/token+value=")
        );
    }

    #[test]
    fn test_expiry_is_sixty_seconds_after_signing() {
        let signed = presign_token(&credentials(), "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");

        assert_eq!(signed.expires_at.timestamp(), 1_700_000_060);
    }

    #[test]
    fn test_decode_token_rejects_foreign_prefix() {
        assert_eq!(decode_token("k8s-gcp-v1.aGVsbG8"), None);
        assert_eq!(
            decode_token(&encode_token("https://example.com")).as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let signed = presign_token(&credentials(), "us-east-1", "prod", at(1_700_000_000))
            .expect("presign should succeed");

        assert!(!format!("{:?}", signed).contains(TOKEN_PREFIX));
    }
}
