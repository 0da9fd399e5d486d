//! Hugging Face Inference API backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ProviderCredential;
use crate::Result;

use super::{data_uri, empty_reply, read_json, Provider, ProviderSettings};

/// Hosted LLaVA through the inference API; one structured `inputs` object
#[derive(Debug, Clone)]
pub struct HuggingFaceProvider {
    base_url: String,
    model: String,
    client: Client,
    settings: ProviderSettings,
}

impl HuggingFaceProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            model: "llava-hf/llava-1.5-7b-hf".to_string(),
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
}

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: Inputs,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Inputs {
    image: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct Parameters {
    max_new_tokens: u32,
    temperature: f32,
}

/// The API answers with either a list of generations or a single one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Many(Vec<Generation>),
    One(Generation),
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    generated_text: Option<String>,
}

impl InferenceResponse {
    fn into_text(self) -> Option<String> {
        match self {
            InferenceResponse::Many(items) => items.into_iter().next()?.generated_text,
            InferenceResponse::One(item) => item.generated_text,
        }
    }
}

#[async_trait]
impl Provider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    fn label(&self) -> &'static str {
        "Hugging Face"
    }

    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String> {
        let url = format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model);
        debug!(provider = "huggingface", model = %self.model, image_bytes = image.len(), "Sending inference request");

        let body = InferenceRequest {
            inputs: Inputs {
                image: data_uri(image),
                text: prompt.to_string(),
            },
            parameters: Parameters {
                max_new_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.secret)
            .json(&body)
            .send()
            .await?;

        let response: InferenceResponse = read_json(self.label(), response).await?;
        response.into_text().ok_or_else(|| empty_reply(self.label()))
    }
}
