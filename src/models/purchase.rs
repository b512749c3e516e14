use serde::{Deserialize, Serialize};

/// Purchase status reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Purchased,
    Restored,
    Error,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Purchased => "purchased",
            Self::Restored => "restored",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Error descriptor attached to a failed purchase record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreError {
    pub source: String,
    pub code: String,
    pub message: String,
}

/// Opaque proof of purchase handed to the verifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationData {
    pub local_verification_data: String,
    pub server_verification_data: String,
    pub source: String,
}

/// One purchase status update delivered on the store's update stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub purchase_id: Option<String>,
    pub product_id: String,
    pub status: PurchaseStatus,
    #[serde(default)]
    pub error: Option<StoreError>,
    #[serde(default)]
    pub verification_data: VerificationData,
    #[serde(default)]
    pub transaction_date: Option<String>,
    /// Set by the store when it expects `complete_purchase` for this record
    #[serde(default)]
    pub pending_complete_purchase: bool,
}

impl PurchaseRecord {
    pub fn new(product_id: impl Into<String>, status: PurchaseStatus) -> Self {
        Self {
            purchase_id: None,
            product_id: product_id.into(),
            status,
            error: None,
            verification_data: VerificationData::default(),
            transaction_date: None,
            pending_complete_purchase: false,
        }
    }

    pub fn with_purchase_id(mut self, purchase_id: impl Into<String>) -> Self {
        self.purchase_id = Some(purchase_id.into());
        self
    }

    pub fn with_error(mut self, error: StoreError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_verification_data(mut self, data: VerificationData) -> Self {
        self.verification_data = data;
        self
    }

    pub fn needing_completion(mut self) -> Self {
        self.pending_complete_purchase = true;
        self
    }

    /// Message to show when the store reports this purchase as failed
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "The store reported an unknown purchase error".to_string())
    }
}
