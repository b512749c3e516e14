use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use adfree::{
    config::SandboxConfig,
    models::{PurchaseState, PurchaseStatus},
    services::{PurchaseReconciler, ReconcilerSettings, SandboxStore, StateHub, StubVerifier},
};

use crate::support::{record, GatedVerifier, Harness, RecordingNotifier, Verdict, PRODUCT_ID, THANKS};

async fn wait_for_unsubscribe(store: &SandboxStore) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !store.is_unsubscribed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("stream subscription was not released");
}

#[tokio::test]
async fn test_teardown_twice_is_safe() {
    let (harness, _) = Harness::with_verdict(Verdict::Accept);

    harness.reconciler.teardown();
    harness.reconciler.teardown();
    harness.reconciler.stopped().await;

    assert!(harness.reconciler.is_torn_down());
    assert!(harness.store.is_unsubscribed());
    assert_eq!(harness.reconciler.current_state(), PurchaseState::NotStarted);
}

#[tokio::test]
async fn test_updates_after_teardown_are_ignored() {
    let (harness, verifier) = Harness::with_verdict(Verdict::Accept);

    harness.reconciler.teardown();
    harness.reconciler.stopped().await;

    assert!(!harness.store.push_batch(vec![record(PurchaseStatus::Purchased)]));
    assert_eq!(harness.reconciler.current_state(), PurchaseState::NotStarted);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn test_in_flight_record_result_discarded_after_teardown() {
    let verifier = Arc::new(GatedVerifier::default());
    let harness = Harness::new(verifier.clone());

    harness.store.push_batch(vec![
        record(PurchaseStatus::Pending),
        record(PurchaseStatus::Purchased).needing_completion(),
    ]);

    // Wait until the purchased record is parked inside verification.
    verifier.entered.notified().await;
    harness.reconciler.teardown();
    verifier.release.notify_one();
    harness.reconciler.stopped().await;

    assert_eq!(harness.reconciler.current_state(), PurchaseState::Pending);
    assert_eq!(harness.states(), vec![PurchaseState::Pending]);
    assert!(
        !harness.notifier.messages().contains(&THANKS.to_string()),
        "No thank-you message after teardown"
    );
    // Left unacknowledged so the store redelivers it on the next subscription.
    assert_eq!(harness.completed(), 0);
}

#[tokio::test]
async fn test_teardown_mid_batch_leaves_records_for_redelivery() {
    let verifier = Arc::new(GatedVerifier::default());
    let harness = Harness::new(verifier.clone());

    harness.store.push_batch(vec![
        record(PurchaseStatus::Purchased).needing_completion(),
        record(PurchaseStatus::Purchased).needing_completion(),
    ]);

    verifier.entered.notified().await;
    harness.reconciler.teardown();
    verifier.release.notify_one();
    harness.reconciler.stopped().await;

    assert_eq!(harness.reconciler.current_state(), PurchaseState::NotStarted);
    assert!(harness.states().is_empty());
    assert_eq!(
        harness.completed(),
        0,
        "Neither purchase may be acknowledged once its state change is dropped"
    );
}

#[tokio::test]
async fn test_drop_releases_subscription() {
    let (harness, _) = Harness::with_verdict(Verdict::Accept);
    let store = harness.store.clone();

    drop(harness);
    wait_for_unsubscribe(&store).await;
}

#[tokio::test]
async fn test_unobserve_stops_callbacks() {
    let (harness, _) = Harness::with_verdict(Verdict::Accept);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = harness
        .reconciler
        .observe(move |state| sink.lock().unwrap().push(state.clone()));

    harness.store.push_batch(vec![record(PurchaseStatus::Pending)]);
    tokio::time::timeout(Duration::from_secs(5), async {
        while seen.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert!(harness.reconciler.unobserve(id));
    harness.store.push_batch(vec![record(PurchaseStatus::Purchased)]);
    harness.drain().await;

    assert_eq!(*seen.lock().unwrap(), vec![PurchaseState::Pending]);
    assert_eq!(
        harness.states(),
        vec![PurchaseState::Pending, PurchaseState::Active]
    );
}

#[test]
fn test_construct_without_runtime_stays_idle() {
    let (store, updates) = SandboxStore::new(&SandboxConfig::default());
    let hub = Arc::new(StateHub::new(Arc::new(RecordingNotifier::default())));

    let reconciler = PurchaseReconciler::new(
        updates,
        hub,
        store.clone(),
        Arc::new(StubVerifier::new(true)),
        ReconcilerSettings {
            product_id: PRODUCT_ID.to_string(),
            purchase_thanks: THANKS.to_string(),
        },
    );

    assert_eq!(reconciler.current_state(), PurchaseState::NotStarted);
    reconciler.teardown();
    drop(reconciler);
    assert!(store.is_unsubscribed());
}
