//! Replicate predictions backend
//!
//! Replicate is asynchronous: creating a prediction returns an id, and the
//! result has to be polled until the prediction reaches a terminal state.
//! Polling is bounded by `ProviderSettings::poll_timeout`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::model::ProviderCredential;
use crate::{Error, Result};

use super::{data_uri, empty_reply, read_json, Provider, ProviderSettings};

const DEFAULT_VERSION: &str = "80537f9eead1a5bfa72d5ac6ea6414379be41d4d4f6679fd776e9535d1eb58bb";

/// LLaVA on Replicate
#[derive(Debug, Clone)]
pub struct ReplicateProvider {
    base_url: String,
    version: String,
    client: Client,
    settings: ProviderSettings,
}

impl ReplicateProvider {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self {
            base_url: "https://api.replicate.com".to_string(),
            version: DEFAULT_VERSION.to_string(),
            client,
            settings,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Pin a different model version hash
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.settings.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.settings.poll_timeout = timeout;
        self
    }

    fn auth_header(credential: &ProviderCredential) -> String {
        format!("Token {}", credential.secret)
    }

    /// Wait `poll_interval` before every status check until the prediction
    /// settles or `poll_timeout` would be exceeded
    async fn poll(
        &self,
        id: &str,
        mut status: String,
        credential: &ProviderCredential,
    ) -> Result<Prediction> {
        let url = format!(
            "{}/v1/predictions/{}",
            self.base_url.trim_end_matches('/'),
            id
        );
        let deadline = Instant::now() + self.settings.poll_timeout;

        loop {
            if Instant::now() + self.settings.poll_interval > deadline {
                warn!(prediction = %id, timeout = ?self.settings.poll_timeout, "Prediction did not finish in time");
                return Err(Error::provider(
                    self.label(),
                    408,
                    format!(
                        "prediction {} still {} after {:?}",
                        id, status, self.settings.poll_timeout
                    ),
                ));
            }
            sleep(self.settings.poll_interval).await;

            let response = self
                .client
                .get(&url)
                .header("Authorization", Self::auth_header(credential))
                .send()
                .await?;
            let prediction: Prediction = read_json(self.label(), response).await?;
            debug!(prediction = %id, status = %prediction.status, "Polled prediction");

            if prediction.is_terminal() {
                return Ok(prediction);
            }
            status = prediction.status;
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatePrediction {
    version: String,
    input: PredictionInput,
}

#[derive(Debug, Serialize)]
struct PredictionInput {
    image: String,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Output>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

/// Language models stream tokens, so output is usually a list of fragments
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Output {
    Fragments(Vec<String>),
    Text(String),
}

impl Output {
    fn into_text(self) -> String {
        match self {
            Output::Fragments(parts) => parts.concat(),
            Output::Text(text) => text,
        }
    }
}

#[async_trait]
impl Provider for ReplicateProvider {
    fn name(&self) -> &'static str {
        "replicate"
    }

    fn label(&self) -> &'static str {
        "Replicate"
    }

    async fn analyze(
        &self,
        image: &[u8],
        prompt: &str,
        credential: &ProviderCredential,
    ) -> Result<String> {
        let url = format!("{}/v1/predictions", self.base_url.trim_end_matches('/'));
        debug!(provider = "replicate", version = %self.version, image_bytes = image.len(), "Creating prediction");

        let body = CreatePrediction {
            version: self.version.clone(),
            input: PredictionInput {
                image: data_uri(image),
                prompt: prompt.to_string(),
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", Self::auth_header(credential))
            .json(&body)
            .send()
            .await?;
        let created: Prediction = read_json(self.label(), response).await?;

        let prediction = if created.is_terminal() {
            created
        } else {
            self.poll(&created.id, created.status.clone(), credential).await?
        };

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .map(|e| match e {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| format!("prediction {}", prediction.status));
            return Err(Error::provider(self.label(), 500, reason));
        }

        prediction
            .output
            .map(Output::into_text)
            .ok_or_else(|| empty_reply(self.label()))
    }
}
