//! Cohere chat backend (text only)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ProviderCredential;
use crate::Result;

use super::{empty_reply, read_json, Provider, ProviderSettings};

const TEXT_ONLY_NOTE: &str = "\n\nNote: Image analysis not available with this provider. \
Base your critique on the screen structure, text content and interactive elements above.";

/// Cohere has no vision input; it critiques from the prompt's structural context
#[derive(Debug, Clone)]
pub struct CohereProvider {
    base_url: String,
    model: String,
    client: Client,
    settings: ProviderSettings,
}

impl CohereProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self {
            base_url: "https://api.cohere.ai".to_string(),
            model: "command-r-plus".to_string(),
            client,
            settings,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    message: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Provider for CohereProvider {
    fn name(&self) -> &'static str {
        "cohere"
    }

    fn label(&self) -> &'static str {
        "Cohere"
    }

    fn sends_image(&self) -> bool {
        false
    }

    async fn analyze(
        &self,
        _image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String> {
        let url = format!("{}/v1/chat", self.base_url.trim_end_matches('/'));
        debug!(provider = "cohere", model = %self.model, "Sending text-only chat request");

        let body = ChatRequest {
            model: self.model.clone(),
            message: format!("{}{}", prompt, TEXT_ONLY_NOTE),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.secret)
            .json(&body)
            .send()
            .await?;

        let response: ChatResponse = read_json(self.label(), response).await?;
        response.text.ok_or_else(|| empty_reply(self.label()))
    }
}
