use std::{sync::Arc, time::Duration};

use adfree::{
    config::{SandboxOutcome, VerifierMode},
    models::PurchaseState,
    services::SandboxStore,
    AppState, Config,
};

use crate::support::{RecordingNotifier, THANKS};

#[tokio::test]
async fn test_app_state_wires_buy_through_reconciler() {
    let mut config = Config::default();
    config.messages.purchase_thanks = THANKS.to_string();
    let (store, updates) = SandboxStore::new(&config.store.sandbox);
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState::new(&config, store.clone(), updates, notifier.clone()).unwrap();

    state.initiator.buy().await;
    store.close_stream();
    tokio::time::timeout(Duration::from_secs(5), state.reconciler.stopped())
        .await
        .expect("reconciler did not stop");

    assert_eq!(state.reconciler.current_state(), PurchaseState::Active);
    assert_eq!(notifier.messages(), vec![THANKS.to_string()]);
    assert_eq!(store.completed_purchases().len(), 1);
}

#[tokio::test]
async fn test_app_state_uses_configured_verifier() {
    let mut config = Config::default();
    config.verifier.stub_accepts = false;
    config.store.sandbox.outcome = SandboxOutcome::Purchased;
    let (store, updates) = SandboxStore::new(&config.store.sandbox);

    let state = AppState::new(
        &config,
        store.clone(),
        updates,
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    state.initiator.buy().await;
    store.close_stream();
    state.reconciler.stopped().await;

    assert!(matches!(
        state.reconciler.current_state(),
        PurchaseState::Error(_)
    ));
}

#[tokio::test]
async fn test_app_state_rejects_remote_verifier_without_endpoint() {
    let mut config = Config::default();
    config.verifier.mode = VerifierMode::Remote;
    let (store, updates) = SandboxStore::new(&config.store.sandbox);

    let result = AppState::new(
        &config,
        store,
        updates,
        Arc::new(RecordingNotifier::default()),
    );

    assert!(result.is_err());
}
