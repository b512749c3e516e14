use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    models::{PurchaseRecord, PurchaseState, PurchaseStatus},
    platform::{CommercePlatform, PurchaseUpdates, PurchaseVerifier},
    services::{
        state_hub::{ListenerId, StateHub},
        verifier::hash_payload,
    },
};

/// Reason stored when a purchase proof is rejected or cannot be checked
pub const VERIFICATION_FAILED: &str = "purchase could not be verified";

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub product_id: String,
    pub purchase_thanks: String,
}

/// Sole consumer of the store's purchase update stream.
///
/// Records are handled one at a time in stream order; the next record is not
/// looked at until the previous one, acknowledgment included, is done.
pub struct PurchaseReconciler {
    hub: Arc<StateHub>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Per-record handling, owned by the stream task
struct RecordHandler {
    hub: Arc<StateHub>,
    platform: Arc<dyn CommercePlatform>,
    verifier: Arc<dyn PurchaseVerifier>,
    settings: ReconcilerSettings,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PurchaseReconciler {
    /// Subscribe to `updates`. Never blocks; the stream is consumed on a
    /// spawned task. Without a tokio runtime the subscription failure is
    /// logged and the reconciler stays idle.
    pub fn new(
        updates: PurchaseUpdates,
        hub: Arc<StateHub>,
        platform: Arc<dyn CommercePlatform>,
        verifier: Arc<dyn PurchaseVerifier>,
        settings: ReconcilerSettings,
    ) -> Self {
        let handler = RecordHandler {
            hub: hub.clone(),
            platform,
            verifier,
            settings,
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let (shutdown, task) = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(handler.run(updates, shutdown_rx));
                (Some(shutdown_tx), Some(task))
            }
            Err(e) => {
                error!(error = %e, "Cannot subscribe to purchase updates without a runtime");
                (None, None)
            }
        };

        Self {
            hub,
            shutdown: Mutex::new(shutdown),
            task: Mutex::new(task),
        }
    }

    pub fn current_state(&self) -> PurchaseState {
        self.hub.current()
    }

    pub fn observe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PurchaseState) + Send + Sync + 'static,
    {
        self.hub.observe(listener)
    }

    pub fn unobserve(&self, id: ListenerId) -> bool {
        self.hub.unobserve(id)
    }

    /// Cancel the stream subscription. Safe to call repeatedly.
    ///
    /// A record already being handled runs to completion, but its state
    /// changes are discarded and it is not acknowledged. Records after it in
    /// the same batch are not handled.
    pub fn teardown(&self) {
        let Some(shutdown) = lock(&self.shutdown).take() else {
            debug!("Purchase reconciler already torn down");
            return;
        };

        self.hub.close();
        // The task may have exited on its own if the stream closed.
        let _ = shutdown.send(());
        info!("Purchase update subscription cancelled");
    }

    pub fn is_torn_down(&self) -> bool {
        lock(&self.shutdown).is_none()
    }

    /// Wait until the stream task has exited, either because the stream
    /// ended or after [`teardown`](Self::teardown).
    pub async fn stopped(&self) {
        let task = lock(&self.task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Purchase update task failed");
            }
        }
    }
}

impl Drop for PurchaseReconciler {
    fn drop(&mut self) {
        if !self.is_torn_down() {
            warn!("Purchase reconciler dropped without teardown");
            self.teardown();
        }
    }
}

impl RecordHandler {
    async fn run(self, mut updates: PurchaseUpdates, mut shutdown: oneshot::Receiver<()>) {
        info!(product_id = %self.settings.product_id, "Listening for purchase updates");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Purchase update task received shutdown signal");
                    break;
                }
                update = updates.recv() => match update {
                    Some(Ok(batch)) => self.handle_batch(batch).await,
                    // No resubscription; the stream may still recover on its own.
                    Some(Err(fault)) => error!(error = %fault, "Purchase update stream error"),
                    None => {
                        info!("Purchase update stream closed");
                        break;
                    }
                },
            }
        }

        info!("Purchase update task stopped");
    }

    async fn handle_batch(&self, batch: Vec<PurchaseRecord>) {
        debug!(records = batch.len(), "Received purchase update batch");
        let total = batch.len();
        for (handled, record) in batch.into_iter().enumerate() {
            if self.hub.is_closed() {
                info!(
                    skipped = total - handled,
                    "Reconciler torn down, leaving remaining records for redelivery"
                );
                break;
            }
            self.handle_record(record).await;
        }
    }

    #[instrument(
        skip(self, record),
        fields(
            product_id = %record.product_id,
            purchase_id = ?record.purchase_id,
            status = record.status.as_str(),
        )
    )]
    async fn handle_record(&self, record: PurchaseRecord) {
        if record.product_id != self.settings.product_id {
            info!("Ignoring purchase update for unknown product");
            return;
        }

        match record.status {
            PurchaseStatus::Pending => {
                self.hub.transition(PurchaseState::Pending);
                // Not complete yet, nothing to acknowledge
                return;
            }
            PurchaseStatus::Error => {
                self.hub.report_error(record.error_message());
            }
            PurchaseStatus::Purchased | PurchaseStatus::Restored => {
                if self.verify(&record).await {
                    let activated = self.hub.transition(PurchaseState::Active);
                    if activated && record.status == PurchaseStatus::Purchased {
                        self.hub.show_message(&self.settings.purchase_thanks);
                    }
                } else {
                    self.hub.report_error(VERIFICATION_FAILED);
                }
            }
            PurchaseStatus::Cancelled => {
                let reset = self.hub.transition_if(
                    |state| matches!(state, PurchaseState::Pending),
                    PurchaseState::NotStarted,
                );
                info!(reset, "Purchase cancelled by the user");
            }
        }

        if !record.pending_complete_purchase {
            return;
        }
        // A record whose state change was discarded stays unacknowledged so
        // the store delivers it again on the next subscription.
        if self.hub.is_closed() {
            info!("Reconciler torn down, purchase left unacknowledged");
            return;
        }
        self.acknowledge(&record).await;
    }

    /// Fail closed: an unreachable verifier counts as a rejection.
    async fn verify(&self, record: &PurchaseRecord) -> bool {
        let payload_hash = hash_payload(&record.verification_data.server_verification_data);
        match self.verifier.verify(&record.verification_data).await {
            Ok(true) => {
                info!(payload_hash = %payload_hash, "Purchase verified");
                true
            }
            Ok(false) => {
                warn!(payload_hash = %payload_hash, "Purchase verification rejected");
                false
            }
            Err(e) => {
                error!(payload_hash = %payload_hash, error = %e, "Purchase verification failed");
                false
            }
        }
    }

    async fn acknowledge(&self, record: &PurchaseRecord) {
        match self.platform.complete_purchase(record).await {
            Ok(()) => info!("Purchase acknowledged"),
            Err(e) => error!(error = %e, "Failed to acknowledge purchase"),
        }
    }
}
