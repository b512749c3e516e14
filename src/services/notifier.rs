use tracing::info;

use crate::platform::UserNotifier;

/// Writes user-facing messages to the log; used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl UserNotifier for TracingNotifier {
    fn show(&self, message: &str) {
        info!(target: "adfree::user", "{}", message);
    }
}
