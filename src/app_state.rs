use crate::{
    config::Config,
    platform::{CommercePlatform, PurchaseUpdates, UserNotifier},
    services::{
        build_verifier, PurchaseInitiator, PurchaseReconciler, ReconcilerSettings, StateHub,
    },
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<PurchaseReconciler>,
    pub initiator: Arc<PurchaseInitiator>,
}

impl AppState {
    pub fn new(
        config: &Config,
        platform: Arc<dyn CommercePlatform>,
        updates: PurchaseUpdates,
        notifier: Arc<dyn UserNotifier>,
    ) -> Result<Self, anyhow::Error> {
        let verifier = build_verifier(&config.verifier)?;
        let product_id = config.store.ad_removal_product_id.clone();

        // Initialize services
        let hub = Arc::new(StateHub::new(notifier));
        let reconciler = Arc::new(PurchaseReconciler::new(
            updates,
            hub.clone(),
            platform.clone(),
            verifier,
            ReconcilerSettings {
                product_id: product_id.clone(),
                purchase_thanks: config.messages.purchase_thanks.clone(),
            },
        ));
        let initiator = Arc::new(PurchaseInitiator::new(hub, platform, product_id));

        Ok(Self {
            reconciler,
            initiator,
        })
    }
}
