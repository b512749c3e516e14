use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::{SandboxConfig, SandboxOutcome},
    error::{PurchaseError, Result, StreamFault},
    models::{
        ProductDetails, ProductDetailsResponse, PurchaseParam, PurchaseRecord, PurchaseStatus,
        StoreError, VerificationData,
    },
    platform::{CommercePlatform, PurchaseUpdate, PurchaseUpdateSender, PurchaseUpdates},
};

const SANDBOX_SOURCE: &str = "sandbox";

/// In-memory store that echoes buy requests back on its update stream.
///
/// Every call is counted so tests can assert on what the purchase core asked for.
pub struct SandboxStore {
    available: AtomicBool,
    outcome: Mutex<SandboxOutcome>,
    catalog: Mutex<Vec<ProductDetails>>,
    query_error: Mutex<Option<StoreError>>,
    owned: Mutex<Vec<String>>,
    updates: Mutex<Option<PurchaseUpdateSender>>,
    completed: Mutex<Vec<PurchaseRecord>>,
    query_calls: AtomicUsize,
    buy_calls: AtomicUsize,
    restore_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SandboxStore {
    /// Create the store together with the receiving end of its update stream.
    pub fn new(config: &SandboxConfig) -> (Arc<Self>, PurchaseUpdates) {
        let (tx, rx) = mpsc::unbounded_channel();
        let catalog = config
            .products
            .iter()
            .map(|p| ProductDetails {
                id: p.id.clone(),
                title: p.title.clone(),
                description: p.description.clone(),
                price: p.price.clone(),
            })
            .collect();

        let store = Self {
            available: AtomicBool::new(config.available),
            outcome: Mutex::new(config.outcome),
            catalog: Mutex::new(catalog),
            query_error: Mutex::new(None),
            owned: Mutex::new(Vec::new()),
            updates: Mutex::new(Some(tx)),
            completed: Mutex::new(Vec::new()),
            query_calls: AtomicUsize::new(0),
            buy_calls: AtomicUsize::new(0),
            restore_calls: AtomicUsize::new(0),
        };
        (Arc::new(store), rx)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_outcome(&self, outcome: SandboxOutcome) {
        *lock(&self.outcome) = outcome;
    }

    pub fn set_catalog(&self, products: Vec<ProductDetails>) {
        *lock(&self.catalog) = products;
    }

    /// Make catalog lookups fail with `error` until cleared.
    pub fn set_query_error(&self, error: Option<StoreError>) {
        *lock(&self.query_error) = error;
    }

    /// Deliver a batch of records on the update stream.
    pub fn push_batch(&self, batch: Vec<PurchaseRecord>) -> bool {
        self.send(Ok(batch))
    }

    /// Deliver a stream-level fault.
    pub fn push_fault(&self, message: impl Into<String>) -> bool {
        self.send(Err(StreamFault(message.into())))
    }

    /// End the update stream; later pushes are dropped.
    pub fn close_stream(&self) {
        if lock(&self.updates).take().is_some() {
            info!("Sandbox update stream closed");
        }
    }

    /// Whether the consuming side of the stream has gone away.
    pub fn is_unsubscribed(&self) -> bool {
        lock(&self.updates)
            .as_ref()
            .map_or(true, |tx| tx.is_closed())
    }

    pub fn completed_purchases(&self) -> Vec<PurchaseRecord> {
        lock(&self.completed).clone()
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn buy_calls(&self) -> usize {
        self.buy_calls.load(Ordering::SeqCst)
    }

    pub fn restore_calls(&self) -> usize {
        self.restore_calls.load(Ordering::SeqCst)
    }

    /// Record a sandbox purchase with a proof the stub verifier can log.
    pub fn sandbox_record(product_id: &str, status: PurchaseStatus) -> PurchaseRecord {
        let purchase_id = Uuid::new_v4().to_string();
        let now_ms = time::OffsetDateTime::now_utc().unix_timestamp() * 1000;

        let mut record = PurchaseRecord::new(product_id, status)
            .with_purchase_id(purchase_id.clone())
            .with_verification_data(VerificationData {
                local_verification_data: format!("{}:{}", product_id, purchase_id),
                server_verification_data: format!("sandbox-receipt-{}", purchase_id),
                source: SANDBOX_SOURCE.to_string(),
            });
        record.transaction_date = Some(now_ms.to_string());
        record
    }

    fn send(&self, update: PurchaseUpdate) -> bool {
        match lock(&self.updates).as_ref() {
            Some(tx) => tx.send(update).is_ok(),
            None => {
                warn!("Sandbox update stream already closed");
                false
            }
        }
    }
}

#[async_trait]
impl CommercePlatform for SandboxStore {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn query_product_details(&self, product_ids: &[String]) -> ProductDetailsResponse {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.query_error).clone() {
            return ProductDetailsResponse {
                not_found_ids: product_ids.to_vec(),
                error: Some(error),
                ..ProductDetailsResponse::default()
            };
        }

        let catalog = lock(&self.catalog);

        let product_details: Vec<ProductDetails> = catalog
            .iter()
            .filter(|p| product_ids.contains(&p.id))
            .cloned()
            .collect();
        let not_found_ids = product_ids
            .iter()
            .filter(|id| !catalog.iter().any(|p| &p.id == *id))
            .cloned()
            .collect();

        ProductDetailsResponse {
            product_details,
            not_found_ids,
            error: None,
        }
    }

    #[instrument(skip(self, param), fields(product_id = %param.product_details.id))]
    async fn buy_non_consumable(&self, param: PurchaseParam) -> Result<bool> {
        self.buy_calls.fetch_add(1, Ordering::SeqCst);
        let product_id = param.product_details.id;

        let pending = Self::sandbox_record(&product_id, PurchaseStatus::Pending);
        let outcome = *lock(&self.outcome);
        let terminal = match outcome {
            SandboxOutcome::Purchased => {
                lock(&self.owned).push(product_id.clone());
                Self::sandbox_record(&product_id, PurchaseStatus::Purchased)
            }
            SandboxOutcome::Error => Self::sandbox_record(&product_id, PurchaseStatus::Error)
                .with_error(StoreError {
                    source: SANDBOX_SOURCE.to_string(),
                    code: "purchase_error".to_string(),
                    message: "Sandbox purchase failed".to_string(),
                }),
            SandboxOutcome::Cancelled => {
                Self::sandbox_record(&product_id, PurchaseStatus::Cancelled)
            }
        }
        .needing_completion();

        if !self.push_batch(vec![pending]) || !self.push_batch(vec![terminal]) {
            return Err(PurchaseError::PurchaseRequest(
                "Sandbox update stream is closed".to_string(),
            ));
        }

        debug!(?outcome, "Sandbox purchase echoed");
        Ok(true)
    }

    async fn complete_purchase(&self, purchase: &PurchaseRecord) -> Result<()> {
        debug!(purchase_id = ?purchase.purchase_id, "Sandbox purchase completed");
        lock(&self.completed).push(purchase.clone());
        Ok(())
    }

    async fn restore_purchases(&self) -> Result<()> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        let restored: Vec<PurchaseRecord> = lock(&self.owned)
            .iter()
            .map(|id| Self::sandbox_record(id, PurchaseStatus::Restored).needing_completion())
            .collect();

        if restored.is_empty() {
            info!("Nothing to restore");
            return Ok(());
        }

        if !self.push_batch(restored) {
            return Err(PurchaseError::Platform(
                "Sandbox update stream is closed".to_string(),
            ));
        }
        Ok(())
    }
}
