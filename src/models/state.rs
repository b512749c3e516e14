use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the ad-removal entitlement as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum PurchaseState {
    /// No purchase attempted yet this session
    #[default]
    NotStarted,
    /// A purchase is in flight at the store
    Pending,
    /// Entitlement confirmed and verified
    Active,
    /// The current attempt failed; the reason is a human-readable diagnostic
    Error(String),
}

impl PurchaseState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(reason) => write!(f, "error: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}
