use std::sync::Arc;

use adfree::{
    services::{SandboxStore, TracingNotifier},
    AppState, Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,adfree=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    tracing::info!(
        "Loaded configuration - product: {}, verifier: {:?}, sandbox outcome: {:?}",
        config.store.ad_removal_product_id,
        config.verifier.mode,
        config.store.sandbox.outcome
    );

    let (store, updates) = SandboxStore::new(&config.store.sandbox);
    let state = AppState::new(&config, store.clone(), updates, Arc::new(TracingNotifier))?;

    state.reconciler.observe(|purchase_state| {
        tracing::info!(state = %purchase_state, "Purchase state changed");
    });

    state.initiator.buy().await;
    state.initiator.restore().await;

    // Let the reconciler drain everything the sandbox echoed, then stop.
    store.close_stream();
    state.reconciler.stopped().await;

    tracing::info!(
        state = %state.reconciler.current_state(),
        acknowledged = store.completed_purchases().len(),
        "Purchase session finished"
    );

    state.reconciler.teardown();
    Ok(())
}
