// Shared fakes and harness for the integration tests

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use adfree::{
    config::SandboxConfig,
    models::{PurchaseRecord, PurchaseState, PurchaseStatus, StoreError, VerificationData},
    platform::{PurchaseVerifier, UserNotifier},
    services::{PurchaseInitiator, PurchaseReconciler, ReconcilerSettings, SandboxStore, StateHub},
    PurchaseError,
};
use async_trait::async_trait;
use tokio::sync::Notify;

pub const PRODUCT_ID: &str = "remove_ads";
pub const THANKS: &str = "Thanks for removing ads!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
    Fail,
}

/// Verifier with a fixed verdict that counts its calls
pub struct ScriptedVerifier {
    verdict: Verdict,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PurchaseVerifier for ScriptedVerifier {
    async fn verify(&self, _data: &VerificationData) -> adfree::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            Verdict::Accept => Ok(true),
            Verdict::Reject => Ok(false),
            Verdict::Fail => Err(PurchaseError::Verification(
                "attestation service unreachable".to_string(),
            )),
        }
    }
}

/// Verifier that parks until released, to hold a record mid-flight
#[derive(Default)]
pub struct GatedVerifier {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl PurchaseVerifier for GatedVerifier {
    async fn verify(&self, _data: &VerificationData) -> adfree::Result<bool> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(true)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl UserNotifier for RecordingNotifier {
    fn show(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub struct Harness {
    pub store: Arc<SandboxStore>,
    pub reconciler: PurchaseReconciler,
    pub initiator: PurchaseInitiator,
    pub notifier: Arc<RecordingNotifier>,
    pub states: Arc<Mutex<Vec<PurchaseState>>>,
}

impl Harness {
    pub fn new(verifier: Arc<dyn PurchaseVerifier>) -> Self {
        let (store, updates) = SandboxStore::new(&SandboxConfig::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let hub = Arc::new(StateHub::new(notifier.clone()));

        let reconciler = PurchaseReconciler::new(
            updates,
            hub.clone(),
            store.clone(),
            verifier,
            ReconcilerSettings {
                product_id: PRODUCT_ID.to_string(),
                purchase_thanks: THANKS.to_string(),
            },
        );
        let initiator = PurchaseInitiator::new(hub, store.clone(), PRODUCT_ID);

        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        reconciler.observe(move |state| sink.lock().unwrap().push(state.clone()));

        Self {
            store,
            reconciler,
            initiator,
            notifier,
            states,
        }
    }

    pub fn with_verdict(verdict: Verdict) -> (Self, Arc<ScriptedVerifier>) {
        let verifier = Arc::new(ScriptedVerifier::new(verdict));
        (Self::new(verifier.clone()), verifier)
    }

    /// Close the stream and wait until every queued batch is handled.
    pub async fn drain(&self) {
        self.store.close_stream();
        tokio::time::timeout(Duration::from_secs(5), self.reconciler.stopped())
            .await
            .expect("reconciler did not stop");
    }

    pub fn states(&self) -> Vec<PurchaseState> {
        self.states.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.store.completed_purchases().len()
    }
}

pub fn record(status: PurchaseStatus) -> PurchaseRecord {
    SandboxStore::sandbox_record(PRODUCT_ID, status)
}

pub fn store_error(message: &str) -> StoreError {
    StoreError {
        source: "app_store".to_string(),
        code: "store_kit_error".to_string(),
        message: message.to_string(),
    }
}
