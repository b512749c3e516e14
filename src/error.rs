#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    #[error("Store is not available")]
    StoreUnavailable,

    #[error("Product query failed: {0}")]
    ProductQuery(String),

    #[error("Expected exactly one product for {product_id}, store returned {found}")]
    CatalogMismatch { product_id: String, found: usize },

    #[error("Purchase request failed: {0}")]
    PurchaseRequest(String),

    #[error("Verification service error: {0}")]
    Verification(String),

    #[error("Store error: {0}")]
    Platform(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

/// Fault raised by the purchase update stream itself, as opposed to a
/// failed purchase carried inside a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Purchase stream fault: {0}")]
pub struct StreamFault(pub String);

// Helper type for results
pub type Result<T> = std::result::Result<T, PurchaseError>;
