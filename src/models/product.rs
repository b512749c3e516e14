use serde::{Deserialize, Serialize};

use super::purchase::StoreError;

/// Product as listed in the store catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: String,
}

/// Result of a catalog lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDetailsResponse {
    pub product_details: Vec<ProductDetails>,
    pub not_found_ids: Vec<String>,
    pub error: Option<StoreError>,
}

/// Parameters of a buy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseParam {
    pub product_details: ProductDetails,
    pub application_user_name: Option<String>,
}

impl PurchaseParam {
    pub fn new(product_details: ProductDetails) -> Self {
        Self {
            product_details,
            application_user_name: None,
        }
    }
}
