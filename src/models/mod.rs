pub mod product;
pub mod purchase;
pub mod state;

pub use product::{ProductDetails, ProductDetailsResponse, PurchaseParam};
pub use purchase::{PurchaseRecord, PurchaseStatus, StoreError, VerificationData};
pub use state::PurchaseState;
