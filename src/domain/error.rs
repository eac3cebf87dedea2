use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unsupported endpoint: {endpoint}")]
    UnsupportedEndpoint { endpoint: String },
    #[error("endpoint `{endpoint}` requires `{parameter}`")]
    MissingParameter {
        endpoint: &'static str,
        parameter: &'static str,
    },
    #[error("invalid `{parameter}`: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

impl DomainError {
    pub fn unsupported_endpoint(endpoint: impl Into<String>) -> Self {
        Self::UnsupportedEndpoint {
            endpoint: endpoint.into(),
        }
    }

    pub fn missing(endpoint: &'static str, parameter: &'static str) -> Self {
        Self::MissingParameter {
            endpoint,
            parameter,
        }
    }

    pub fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }
}
