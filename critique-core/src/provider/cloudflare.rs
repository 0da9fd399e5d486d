//! Cloudflare Workers AI backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ProviderCredential;
use crate::{Error, Result};

use super::{empty_reply, read_json, Provider, ProviderSettings};

/// Workers AI LLaVA; needs an account id alongside the token
#[derive(Debug, Clone)]
pub struct CloudflareProvider {
    base_url: String,
    model: String,
    client: Client,
    settings: ProviderSettings,
}

impl CloudflareProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self {
            base_url: "https://api.cloudflare.com".to_string(),
            model: "@cf/llava-hf/llava-1.5-7b-hf".to_string(),
            client,
            settings,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Split a credential into `(account_id, api_key)`.
///
/// An explicit account id wins; otherwise the secret must read `accountId:apiKey`.
fn split_credential(credential: &ProviderCredential) -> Result<(&str, &str)> {
    if let Some(account) = credential.account_id.as_deref().filter(|a| !a.is_empty()) {
        return Ok((account, credential.secret.as_str()));
    }
    match credential.secret.split_once(':') {
        Some((account, key)) if !account.is_empty() && !key.is_empty() => Ok((account, key)),
        _ => Err(Error::ProviderAuth(
            "Cloudflare API key must be in format: accountId:apiKey".to_string(),
        )),
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    prompt: &'a str,
    image: &'a [u8],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    result: Option<RunResult>,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    #[serde(default)]
    response: Option<String>,
}

#[async_trait]
impl Provider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    fn label(&self) -> &'static str {
        "Cloudflare"
    }

    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String> {
        let (account, key) = split_credential(credential)?;
        let url = format!(
            "{}/client/v4/accounts/{}/ai/run/{}",
            self.base_url.trim_end_matches('/'),
            account,
            self.model
        );
        debug!(provider = "cloudflare", model = %self.model, image_bytes = image.len(), "Running Workers AI model");

        let body = RunRequest {
            prompt,
            image,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let response: RunResponse = read_json(self.label(), response).await?;
        response
            .result
            .and_then(|r| r.response)
            .ok_or_else(|| empty_reply(self.label()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_split_combined_secret() {
        let cred = ProviderCredential::new("cloudflare", "acct123:token456");
        assert_eq!(split_credential(&cred).unwrap(), ("acct123", "token456"));
    }

    #[test]
    fn test_split_explicit_account() {
        let cred = ProviderCredential::new("cloudflare", "token456").with_account_id("acct123");
        assert_eq!(split_credential(&cred).unwrap(), ("acct123", "token456"));
    }

    #[test]
    fn test_split_rejects_bare_key() {
        let cred = ProviderCredential::new("cloudflare", "token456");
        let err = split_credential(&cred).unwrap_err();
        assert!(matches!(err, Error::ProviderAuth(_)));
        assert!(err.to_string().contains("accountId:apiKey"));
    }

    #[tokio::test]
    async fn test_analyze_posts_byte_array() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/client/v4/accounts/acct/ai/run/@cf/llava-hf/llava-1.5-7b-hf")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::PartialJson(json!({"prompt": "prompt", "image": [1, 2, 3]})))
            .with_status(200)
            .with_body(r#"{"result":{"response":"[]"},"success":true}"#)
            .create_async()
            .await;

        let provider = CloudflareProvider::new(Client::new(), ProviderSettings::default())
            .with_base_url(server.url());
        let text = provider
            .analyze(&[1, 2, 3], "prompt", &ProviderCredential::new("cloudflare", "acct:tok"))
            .await
            .unwrap();

        assert_eq!(text, "[]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_credential_makes_no_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let provider = CloudflareProvider::new(Client::new(), ProviderSettings::default())
            .with_base_url(server.url());
        let result = provider
            .analyze(b"png", "prompt", &ProviderCredential::new("cloudflare", "no-colon"))
            .await;

        assert!(matches!(result, Err(Error::ProviderAuth(_))));
        mock.assert_async().await;
    }
}
