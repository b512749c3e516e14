use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::{
    error::{PurchaseError, Result},
    models::PurchaseParam,
    platform::CommercePlatform,
    services::state_hub::StateHub,
};

/// Starts purchase flows. Never sets the purchase state on success: the
/// outcome is reported later on the update stream and handled by the
/// reconciler.
pub struct PurchaseInitiator {
    hub: Arc<StateHub>,
    platform: Arc<dyn CommercePlatform>,
    product_id: String,
}

impl PurchaseInitiator {
    pub fn new(
        hub: Arc<StateHub>,
        platform: Arc<dyn CommercePlatform>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            hub,
            platform,
            product_id: product_id.into(),
        }
    }

    /// Submit a buy request for the ad-removal product.
    ///
    /// Returns once the request is submitted. Failures end up as
    /// `PurchaseState::Error` rather than being returned.
    #[instrument(skip(self), fields(product_id = %self.product_id))]
    pub async fn buy(&self) {
        match self.submit_purchase().await {
            Ok(true) => info!("Purchase request submitted"),
            Ok(false) => warn!("Store did not accept the purchase request"),
            Err(e) => self.hub.report_error(e.to_string()),
        }
    }

    /// Ask the store to replay owned purchases onto the update stream.
    #[instrument(skip(self), fields(product_id = %self.product_id))]
    pub async fn restore(&self) {
        let result = async {
            if !self.platform.is_available().await {
                return Err(PurchaseError::StoreUnavailable);
            }
            self.platform.restore_purchases().await
        }
        .await;

        match result {
            Ok(()) => info!("Restore request submitted"),
            Err(e) => self.hub.report_error(e.to_string()),
        }
    }

    async fn submit_purchase(&self) -> Result<bool> {
        if !self.platform.is_available().await {
            return Err(PurchaseError::StoreUnavailable);
        }

        let response = self
            .platform
            .query_product_details(std::slice::from_ref(&self.product_id))
            .await;

        if let Some(store_error) = response.error {
            return Err(PurchaseError::ProductQuery(store_error.message));
        }

        if response.product_details.len() != 1 {
            let candidates: Vec<&str> = response
                .product_details
                .iter()
                .map(|product| product.id.as_str())
                .collect();
            error!(
                ?candidates,
                not_found = ?response.not_found_ids,
                "Catalog does not match the expected product"
            );
            return Err(PurchaseError::CatalogMismatch {
                product_id: self.product_id.clone(),
                found: response.product_details.len(),
            });
        }

        let mut products = response.product_details;
        let product = products.remove(0);
        info!(price = %product.price, "Requesting purchase");

        self.platform
            .buy_non_consumable(PurchaseParam::new(product))
            .await
    }
}
