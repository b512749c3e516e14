use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub verifier: VerifierConfig,
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub ad_removal_product_id: String,
    pub sandbox: SandboxConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ad_removal_product_id: "remove_ads".to_string(),
            sandbox: SandboxConfig::default(),
        }
    }
}

/// Behavior of the in-memory sandbox store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub available: bool,
    pub outcome: SandboxOutcome,
    pub products: Vec<SandboxProduct>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            available: true,
            outcome: SandboxOutcome::Purchased,
            products: vec![SandboxProduct {
                id: "remove_ads".to_string(),
                title: "Remove ads".to_string(),
                description: "Hide all advertisements".to_string(),
                price: "$1.99".to_string(),
            }],
        }
    }
}

/// Terminal status the sandbox store reports after a buy request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxOutcome {
    #[default]
    Purchased,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifierMode {
    #[default]
    Stub,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub mode: VerifierMode,
    /// Answer given by the stub verifier
    pub stub_accepts: bool,
    /// "production" selects `production_url`, anything else `sandbox_url`
    pub environment: String,
    pub production_url: Option<String>,
    pub sandbox_url: Option<String>,
    pub shared_secret: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mode: VerifierMode::Stub,
            stub_accepts: true,
            environment: "sandbox".to_string(),
            production_url: None,
            sandbox_url: None,
            shared_secret: None,
            request_timeout_ms: 15_000,
        }
    }
}

impl VerifierConfig {
    pub fn endpoint(&self) -> Option<&str> {
        match self.environment.as_str() {
            "production" => self.production_url.as_deref(),
            _ => self.sandbox_url.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub purchase_thanks: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            purchase_thanks: "Thank you for your support!".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("ADFREE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
