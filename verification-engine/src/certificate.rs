//! Hand-off to the external certificate issuance service.
//!
//! The registry never computes certificate hashes or renders documents; it
//! passes the finalized credits over and stores the identifier it gets back.

use async_trait::async_trait;

use registry_types::{CertificateRequest, WorkflowError};

/// Error types for certificate issuance.
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    /// Issuer could not be reached
    #[error("issuer unavailable: {0}")]
    Unavailable(String),

    /// Issuer refused the request
    #[error("issuer refused request: {0}")]
    Refused(String),
}

impl From<IssuanceError> for WorkflowError {
    fn from(err: IssuanceError) -> Self {
        WorkflowError::CertificateIssuance(err.to_string())
    }
}

/// External certificate issuance collaborator.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Issue a certificate and return its identifier.
    async fn issue(&self, request: &CertificateRequest) -> Result<String, IssuanceError>;
}

/// Placeholder used when no issuer has been wired in.
pub struct UnconfiguredIssuer;

#[async_trait]
impl CertificateIssuer for UnconfiguredIssuer {
    async fn issue(&self, request: &CertificateRequest) -> Result<String, IssuanceError> {
        Err(IssuanceError::Unavailable(format!(
            "no certificate issuer configured for project {}",
            request.project_id
        )))
    }
}
