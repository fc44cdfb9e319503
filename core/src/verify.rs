//! Verification collaborator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;
use crate::report::CitationFlag;

/// A clean citation handed to the verifier, in document positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCitation {
    pub text: String,
    pub position: usize,
    pub end_position: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub citations: Vec<VerificationCitation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    #[serde(default)]
    pub flags: Vec<CitationFlag>,
}

/// Remote service that checks clean citations against external sources.
/// Called at most once per audit; failures never abort the audit.
#[async_trait]
pub trait CitationVerifier: Send + Sync {
    async fn verify(&self, request: VerificationRequest)
        -> Result<VerificationResponse, VerifyError>;
}
