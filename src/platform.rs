//! Collaborators the purchase core talks to but does not implement.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::{Result, StreamFault},
    models::{ProductDetailsResponse, PurchaseParam, PurchaseRecord, VerificationData},
};

/// One item of the purchase update stream: a batch of records, or a fault of the stream itself.
pub type PurchaseUpdate = std::result::Result<Vec<PurchaseRecord>, StreamFault>;

pub type PurchaseUpdateSender = mpsc::UnboundedSender<PurchaseUpdate>;

/// Receiving end of the store's purchase update stream.
pub type PurchaseUpdates = mpsc::UnboundedReceiver<PurchaseUpdate>;

/// Store commerce API.
#[async_trait]
pub trait CommercePlatform: Send + Sync {
    /// Whether the store can be reached at all.
    async fn is_available(&self) -> bool;

    /// Look up catalog entries for the given product ids.
    async fn query_product_details(&self, product_ids: &[String]) -> ProductDetailsResponse;

    /// Start a non-consumable purchase flow. `Ok(true)` means the request was accepted;
    /// the outcome arrives later on the update stream.
    async fn buy_non_consumable(&self, param: PurchaseParam) -> Result<bool>;

    /// Tell the store the record has been fully processed.
    async fn complete_purchase(&self, purchase: &PurchaseRecord) -> Result<()>;

    /// Ask the store to replay owned purchases as `restored` records.
    async fn restore_purchases(&self) -> Result<()>;
}

/// Validates purchase proofs before the entitlement is trusted.
///
/// A proof that does not check out is `Ok(false)`; `Err` is reserved for
/// infrastructure failures.
#[async_trait]
pub trait PurchaseVerifier: Send + Sync {
    async fn verify(&self, data: &VerificationData) -> Result<bool>;
}

/// Best-effort user-facing message sink (toast, snack bar, ...).
pub trait UserNotifier: Send + Sync {
    fn show(&self, message: &str);
}
