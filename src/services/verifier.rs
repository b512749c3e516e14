use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::{
    config::{VerifierConfig, VerifierMode},
    error::{PurchaseError, Result},
    models::VerificationData,
    platform::PurchaseVerifier,
};

/// Verifier with a fixed answer, for development builds and tests
pub struct StubVerifier {
    accepts: bool,
}

impl StubVerifier {
    pub fn new(accepts: bool) -> Self {
        Self { accepts }
    }
}

#[async_trait]
impl PurchaseVerifier for StubVerifier {
    async fn verify(&self, data: &VerificationData) -> Result<bool> {
        info!(
            payload_hash = %hash_payload(&data.server_verification_data),
            accepts = self.accepts,
            "Stub verification"
        );
        Ok(self.accepts)
    }
}

/// Verifier backed by a remote attestation endpoint.
///
/// Posts `{"payload", "source", "sharedSecret"}` as JSON and expects
/// `{"status": 0}` for a genuine purchase; any other status is a rejection
/// with an optional `message`.
pub struct RemoteVerifier {
    endpoint: String,
    shared_secret: Option<String>,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    status: i32,
    #[serde(default)]
    message: Option<String>,
}

impl RemoteVerifier {
    pub fn new(config: &VerifierConfig) -> Result<Self> {
        let endpoint = config.endpoint().ok_or_else(|| {
            PurchaseError::Verification(format!(
                "No attestation endpoint configured for environment {}",
                config.environment
            ))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PurchaseError::Internal(e.into()))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            shared_secret: config.shared_secret.clone(),
            http_client,
        })
    }

    fn request_body(&self, data: &VerificationData) -> serde_json::Value {
        serde_json::json!({
            "payload": data.server_verification_data,
            "source": data.source,
            "sharedSecret": self.shared_secret,
        })
    }
}

#[async_trait]
impl PurchaseVerifier for RemoteVerifier {
    #[instrument(skip(self, data), fields(payload_hash = %hash_payload(&data.server_verification_data)))]
    async fn verify(&self, data: &VerificationData) -> Result<bool> {
        let request_body = self.request_body(data);

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| PurchaseError::Verification(format!("Attestation request failed: {}", e)))?;

        let attestation: AttestationResponse = response
            .json()
            .await
            .map_err(|e| PurchaseError::Verification(format!("Invalid response format: {}", e)))?;

        // Status 0 is the only accepted answer
        if attestation.status != 0 {
            warn!(
                status = attestation.status,
                message = ?attestation.message,
                "Attestation rejected purchase"
            );
            return Ok(false);
        }

        info!("Attestation accepted purchase");
        Ok(true)
    }
}

/// Build the verifier selected by configuration
pub fn build_verifier(config: &VerifierConfig) -> Result<Arc<dyn PurchaseVerifier>> {
    match config.mode {
        VerifierMode::Stub => Ok(Arc::new(StubVerifier::new(config.stub_accepts))),
        VerifierMode::Remote => Ok(Arc::new(RemoteVerifier::new(config)?)),
    }
}

/// Fingerprint of a verification payload, safe to log
pub fn hash_payload(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}
