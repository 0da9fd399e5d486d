//! OpenAI-compatible chat completions backends
//!
//! AIML, OpenAI, Groq, OpenRouter, Together and Mistral all accept the same
//! `messages[].content[]` body with an `image_url` part and answer with
//! `choices[0].message.content`. They differ in endpoint, model, extra
//! headers and how the image URL is wrapped.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ProviderCredential;
use crate::Result;

use super::{data_uri, empty_reply, read_json, Provider, ProviderSettings};

/// How the data URI is placed in an `image_url` content part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageUrlStyle {
    /// `{"image_url": {"url": "data:..."}}`
    Object,
    /// `{"image_url": "data:..."}`
    Plain,
}

/// Chat completions backend
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    name: &'static str,
    label: &'static str,
    base_url: String,
    model: String,
    image_style: ImageUrlStyle,
    top_p: Option<f32>,
    extra_headers: Vec<(&'static str, String)>,
    client: Client,
    settings: ProviderSettings,
}

impl ChatCompletionsProvider {
    fn base(
        name: &'static str,
        label: &'static str,
        base_url: &str,
        model: &str,
        client: Client,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            name,
            label,
            base_url: base_url.to_string(),
            model: model.to_string(),
            image_style: ImageUrlStyle::Object,
            top_p: None,
            extra_headers: Vec::new(),
            client,
            settings,
        }
    }

    /// AIML API, the free default (GPT-4o-mini vision)
    pub fn aiml(client: Client, settings: ProviderSettings) -> Self {
        let mut provider = Self::base(
            "aiml",
            "AIML",
            "https://api.aimlapi.com/v1",
            "gpt-4o-mini",
            client,
            settings,
        );
        provider.top_p = Some(1.0);
        provider
    }

    pub fn openai(client: Client, settings: ProviderSettings) -> Self {
        Self::base(
            "openai",
            "OpenAI",
            "https://api.openai.com/v1",
            "gpt-4o-mini",
            client,
            settings,
        )
    }

    pub fn groq(client: Client, settings: ProviderSettings) -> Self {
        Self::base(
            "groq",
            "Groq",
            "https://api.groq.com/openai/v1",
            "llama-3.2-90b-vision-preview",
            client,
            settings,
        )
    }

    pub fn openrouter(client: Client, settings: ProviderSettings) -> Self {
        let mut provider = Self::base(
            "openrouter",
            "OpenRouter",
            "https://openrouter.ai/api/v1",
            "openai/gpt-4o-mini",
            client,
            settings,
        );
        provider.extra_headers = vec![
            ("HTTP-Referer", env!("CARGO_PKG_REPOSITORY").to_string()),
            ("X-Title", "UX Analysis for feedback".to_string()),
        ];
        provider
    }

    pub fn together(client: Client, settings: ProviderSettings) -> Self {
        Self::base(
            "together",
            "Together AI",
            "https://api.together.xyz/v1",
            "meta-llama/Llama-3.2-11B-Vision-Instruct-Turbo",
            client,
            settings,
        )
    }

    pub fn mistral(client: Client, settings: ProviderSettings) -> Self {
        let mut provider = Self::base(
            "mistral",
            "Mistral",
            "https://api.mistral.ai/v1",
            "pixtral-12b-2409",
            client,
            settings,
        );
        provider.image_style = ImageUrlStyle::Plain;
        provider
    }

    /// Every chat-completions backend
    pub fn all(client: &Client, settings: &ProviderSettings) -> Vec<Self> {
        vec![
            Self::aiml(client.clone(), settings.clone()),
            Self::openai(client.clone(), settings.clone()),
            Self::groq(client.clone(), settings.clone()),
            Self::openrouter(client.clone(), settings.clone()),
            Self::together(client.clone(), settings.clone()),
            Self::mistral(client.clone(), settings.clone()),
        ]
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_body(&self, image: &[u8], prompt: &str) -> ChatRequest {
        let uri = data_uri(image);
        let image_url = match self.image_style {
            ImageUrlStyle::Object => ImageUrl::Object { url: uri },
            ImageUrlStyle::Plain => ImageUrl::Plain(uri),
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl { image_url },
                ],
            }],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            top_p: self.top_p,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ImageUrl {
    Object { url: String },
    Plain(String),
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn label(&self) -> &'static str {
        self.label
    }

    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(provider = self.name, model = %self.model, image_bytes = image.len(), "Sending chat completion");

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&credential.secret)
            .json(&self.build_body(image, prompt));
        for (header, value) in &self.extra_headers {
            request = request.header(*header, value);
        }

        let response: ChatResponse = read_json(self.label, request.send().await?).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| empty_reply(self.label))
    }
}
