// Service modules
pub mod initiator;
pub mod notifier;
pub mod reconciler;
pub mod sandbox_store;
pub mod state_hub;
pub mod verifier;

pub use initiator::PurchaseInitiator;
pub use notifier::TracingNotifier;
pub use reconciler::{PurchaseReconciler, ReconcilerSettings, VERIFICATION_FAILED};
pub use sandbox_store::SandboxStore;
pub use state_hub::{ListenerId, StateHub};
pub use verifier::{build_verifier, hash_payload, RemoteVerifier, StubVerifier};
