//! Google Gemini generateContent backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ProviderCredential;
use crate::Result;

use super::{base64_image, empty_reply, read_json, Provider, ProviderSettings};

/// Gemini; the key travels as a query parameter and the image as `inline_data`
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
    model: String,
    client: Client,
    settings: ProviderSettings,
}

impl GeminiProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
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

    fn build_body(&self, image: &[u8], prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: base64_image(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn label(&self) -> &'static str {
        "Gemini"
    }

    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        debug!(provider = "gemini", model = %self.model, image_bytes = image.len(), "Sending generateContent");

        let response = self
            .client
            .post(&url)
            .query(&[("key", credential.secret.as_str())])
            .json(&self.build_body(image, prompt))
            .send()
            .await?;

        let response: GenerateResponse = read_json(self.label(), response).await?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| empty_reply(self.label()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_body_shape() {
        let provider = GeminiProvider::new(Client::new(), ProviderSettings::default());
        let body = serde_json::to_value(provider.build_body(b"png", "analyze")).unwrap();
        assert_eq!(
            body["contents"][0]["parts"],
            json!([
                {"text": "analyze"},
                {"inline_data": {"mime_type": "image/png", "data": "cG5n"}}
            ])
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[tokio::test]
    async fn test_analyze_uses_query_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "g-key".into()))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"[]"}],"role":"model"}}]}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new(Client::new(), ProviderSettings::default())
            .with_base_url(server.url());
        let text = provider
            .analyze(b"png", "prompt", &ProviderCredential::new("gemini", "g-key"))
            .await
            .unwrap();

        assert_eq!(text, "[]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new(Client::new(), ProviderSettings::default())
            .with_base_url(server.url());
        let result = provider
            .analyze(b"png", "prompt", &ProviderCredential::new("gemini", "g-key"))
            .await;
        assert!(result.is_err());
    }
}
