use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Error looking up cluster [{cluster}]: {message}")]
    Lookup { cluster: String, message: String },

    #[error("Cluster [{cluster}] not found in project [{project}] and zone [{zone}]")]
    ClusterNotFound {
        cluster: String,
        project: String,
        zone: String,
    },

    #[error("Invalid certificate for cluster [{cluster}] cert [{value}]: {message}")]
    InvalidCertificate {
        cluster: String,
        value: String,
        message: String,
    },

    #[error("Error signing token for cluster [{cluster}]: {message}")]
    Signing { cluster: String, message: String },

    #[error("Error creating Kubernetes client for cluster [{cluster}]: {message}")]
    Delegation { cluster: String, message: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn lookup(cluster: &str, message: impl Into<String>) -> Self {
        Error::Lookup {
            cluster: cluster.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_certificate(cluster: &str, value: &str, message: impl Into<String>) -> Self {
        Error::InvalidCertificate {
            cluster: cluster.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }

    pub fn signing(cluster: &str, message: impl Into<String>) -> Self {
        Error::Signing {
            cluster: cluster.to_string(),
            message: message.into(),
        }
    }

    pub fn delegation(cluster: &str, message: impl Into<String>) -> Self {
        Error::Delegation {
            cluster: cluster.to_string(),
            message: message.into(),
        }
    }

    /// Whether the error means the named cluster does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ClusterNotFound { .. })
    }
}
