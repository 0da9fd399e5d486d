//! AI provider abstraction
//!
//! Every vision backend implements [`Provider`]: it takes the screen image and
//! the rendered prompt, speaks its own wire protocol, and hands back the
//! model's reply text untouched. Parsing that text is the normalizer's job.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ProvidersConfig;
use crate::model::ProviderCredential;
use crate::{Error, Result};

mod anthropic;
mod chat;
mod cloudflare;
mod cohere;
mod gemini;
mod huggingface;
mod replicate;

pub use anthropic::AnthropicProvider;
pub use chat::{ChatCompletionsProvider, ImageUrlStyle};
pub use cloudflare::CloudflareProvider;
pub use cohere::CohereProvider;
pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;
pub use replicate::ReplicateProvider;

/// HTTP client type the providers are built on
pub use reqwest::Client as HttpClient;

/// Trait for AI vision backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry identifier (lowercase)
    fn name(&self) -> &'static str;

    /// Human-readable name used in error messages
    fn label(&self) -> &'static str;

    /// Whether the image bytes are sent to the backend
    fn sends_image(&self) -> bool {
        true
    }

    /// Send one analysis request and return the raw reply text
    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String>;
}

/// Generation and polling knobs shared by all providers
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::from(&ProvidersConfig::default())
    }
}

impl From<&ProvidersConfig> for ProviderSettings {
    fn from(config: &ProvidersConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            poll_interval: config.poll_interval,
            poll_timeout: config.poll_timeout,
        }
    }
}

/// Registry of available providers, keyed by lowercase identifier
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn Provider>>,
    aliases: HashMap<String, String>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Create a registry with every built-in provider sharing one HTTP client
    pub fn with_client(client: Client, settings: ProviderSettings) -> Self {
        let mut registry = Self::new();
        for provider in ChatCompletionsProvider::all(&client, &settings) {
            registry.register(Box::new(provider));
        }
        registry.register(Box::new(AnthropicProvider::new(client.clone(), settings.clone())));
        registry.register(Box::new(GeminiProvider::new(client.clone(), settings.clone())));
        registry.register(Box::new(HuggingFaceProvider::new(client.clone(), settings.clone())));
        registry.register(Box::new(CloudflareProvider::new(client.clone(), settings.clone())));
        registry.register(Box::new(ReplicateProvider::new(client.clone(), settings.clone())));
        registry.register(Box::new(CohereProvider::new(client, settings)));
        registry.alias("google", "gemini");
        registry
    }

    /// Create the default registry from configuration
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, ProviderSettings::from(config)))
    }

    /// Register a provider under its own name
    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Make `alias` resolve to the provider registered as `target`
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases
            .insert(alias.to_lowercase(), target.to_lowercase());
    }

    /// Resolve a provider identifier, case-insensitively
    pub fn route(&self, provider_id: &str) -> Result<&dyn Provider> {
        let key = provider_id.trim().to_lowercase();
        let key = self.aliases.get(&key).cloned().unwrap_or(key);
        self.providers
            .get(&key)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::UnsupportedProvider(provider_id.to_string()))
    }

    /// List all registered providers, sorted by name
    pub fn list_registered(&self) -> Vec<&dyn Provider> {
        let mut providers: Vec<&dyn Provider> =
            self.providers.values().map(|p| p.as_ref()).collect();
        providers.sort_by_key(|p| p.name());
        providers
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_client(Client::new(), ProviderSettings::default())
    }
}

/// Encode PNG bytes as a data URI
pub(crate) fn data_uri(image: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(image))
}

/// Encode PNG bytes as bare base64
pub(crate) fn base64_image(image: &[u8]) -> String {
    BASE64.encode(image)
}

/// Check the status and decode a provider response envelope
pub(crate) async fn read_json<T: DeserializeOwned>(
    label: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response unavailable>".to_string());
        return Err(Error::provider(label, status.as_u16(), body));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        Error::provider(
            label,
            status.as_u16(),
            format!("unexpected response shape: {}", e),
        )
    })
}

/// Error for a success envelope that carries no reply text
pub(crate) fn empty_reply(label: &str) -> Error {
    Error::provider(label, 200, "response contained no reply text")
}
