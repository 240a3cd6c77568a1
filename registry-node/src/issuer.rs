//! Local stand-in for the external certificate issuance service.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use registry_types::CertificateRequest;
use verification_engine::{CertificateIssuer, IssuanceError};

/// Derives certificate identifiers from a digest of the request.
pub struct LocalIssuer {
    registry_id: String,
}

impl LocalIssuer {
    pub fn new(registry_id: impl Into<String>) -> Self {
        Self {
            registry_id: registry_id.into(),
        }
    }

    fn fingerprint(&self, request: &CertificateRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.registry_id.as_bytes());
        hasher.update(request.project_id.as_bytes());
        hasher.update(request.credits_generated.to_be_bytes());
        hasher.update(request.methodology.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl CertificateIssuer for LocalIssuer {
    async fn issue(&self, request: &CertificateRequest) -> Result<String, IssuanceError> {
        if request.credits_generated == 0 {
            return Err(IssuanceError::Refused(format!(
                "project {} generated no credits",
                request.project_id
            )));
        }
        let digest = self.fingerprint(request);
        Ok(format!("{}-{}", request.project_id, &digest[..16]))
    }
}
