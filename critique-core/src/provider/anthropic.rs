//! Anthropic Messages API backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ProviderCredential;
use crate::Result;

use super::{base64_image, empty_reply, read_json, Provider, ProviderSettings};

const API_VERSION: &str = "2023-06-01";

/// Claude via the Messages API; image sent as an inline base64 source block
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    base_url: String,
    model: String,
    client: Client,
    settings: ProviderSettings,
}

impl AnthropicProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            client,
            settings,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_body(&self, image: &[u8], prompt: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![Message {
                role: "user",
                content: vec![
                    Block::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: "image/png",
                            data: base64_image(image),
                        },
                    },
                    Block::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<Block>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Block {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ReplyBlock>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn label(&self) -> &'static str {
        "Claude"
    }

    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        debug!(provider = "anthropic", model = %self.model, image_bytes = image.len(), "Sending messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &credential.secret)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_body(image, prompt))
            .send()
            .await?;

        let response: MessagesResponse = read_json(self.label(), response).await?;
        response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| empty_reply(self.label()))
    }
}
