//! Inbound request and response shapes for the analysis endpoint
//!
//! The design-tool plugin posts one [`AnalyzePayload`] per user action. The
//! shape of `frameData` depends on the [`AnalysisMode`]; [`AnalyzePayload::screens`]
//! flattens all three into the ordered list the coordinator consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::warn;

use crate::batch::BatchReport;
use crate::layout::LayoutMode;
use crate::model::{AnalysisConfig, AnalysisRequest, ProviderCredential, ScreenResult};
use crate::{Error, Result};

/// How the selected screens relate to each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Single,
    Variant,
    Flow,
}

impl AnalysisMode {
    /// Number of screens the plugin UI allows for this mode
    pub fn screen_range(&self) -> RangeInclusive<usize> {
        match self {
            AnalysisMode::Single => 1..=1,
            AnalysisMode::Variant => 2..=10,
            AnalysisMode::Flow => 3..=20,
        }
    }

    pub fn layout(&self) -> LayoutMode {
        match self {
            AnalysisMode::Flow => LayoutMode::Flow,
            AnalysisMode::Single | AnalysisMode::Variant => LayoutMode::Clustered,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisMode::Single => "single",
            AnalysisMode::Variant => "variant",
            AnalysisMode::Flow => "flow",
        }
    }
}

/// User-selected provider and key
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VariantFrames {
    #[serde(default)]
    variants: Vec<AnalysisRequest>,
}

#[derive(Debug, Deserialize)]
struct FlowFrames {
    #[serde(default)]
    screens: Vec<AnalysisRequest>,
}

/// Body of `POST /analyze`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePayload {
    /// Connection probe; nothing is analyzed
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub mode: AnalysisMode,
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub frame_data: serde_json::Value,
    #[serde(default)]
    pub user_context: Option<String>,
    #[serde(default)]
    pub config: AnalysisConfig,
    #[serde(default)]
    pub ai_config: Option<AiConfig>,
}

impl AnalyzePayload {
    /// The file key, or a precondition error when it is missing
    pub fn require_file_key(&self) -> Result<&str> {
        self.file_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Precondition(
                    "File key is required. Please ensure your file is saved to Figma.".to_string(),
                )
            })
    }

    /// Screens to analyze, in the order the plugin sent them
    pub fn screens(&self) -> Result<Vec<AnalysisRequest>> {
        let screens = match self.mode {
            AnalysisMode::Single => {
                if self.frame_data.is_null() {
                    Vec::new()
                } else {
                    vec![serde_json::from_value(self.frame_data.clone())?]
                }
            }
            AnalysisMode::Variant => {
                serde_json::from_value::<VariantFrames>(self.frame_data.clone())?.variants
            }
            AnalysisMode::Flow => {
                serde_json::from_value::<FlowFrames>(self.frame_data.clone())?.screens
            }
        };

        if screens.is_empty() {
            return Err(Error::Precondition(format!(
                "No frames provided for {} mode.",
                self.mode.name()
            )));
        }

        let range = self.mode.screen_range();
        if !range.contains(&screens.len()) {
            warn!(
                mode = self.mode.name(),
                screens = screens.len(),
                min = range.start(),
                max = range.end(),
                "Screen count outside the range the plugin allows"
            );
        }
        Ok(screens)
    }

    /// Analysis config with the top-level user context folded in
    pub fn analysis_config(&self) -> AnalysisConfig {
        let mut config = self.config.clone();
        if config.user_context.trim().is_empty() {
            if let Some(context) = &self.user_context {
                config.user_context = context.clone();
            }
        }
        config
    }

    /// Provider id requested by the user, or `default_provider`
    pub fn provider_id(&self, default_provider: &str) -> String {
        self.ai_config
            .as_ref()
            .and_then(|c| c.provider.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(default_provider)
            .to_lowercase()
    }

    /// Resolve the credential for this request.
    ///
    /// A user-supplied key always wins. The server's own key is only used
    /// when the request targets the server's default provider, so it is never
    /// sent to a third-party backend.
    pub fn resolve_credential(
        &self,
        default_provider: &str,
        default_key: Option<&str>,
    ) -> Result<ProviderCredential> {
        let provider = self.provider_id(default_provider);
        let ai = self.ai_config.clone().unwrap_or_default();

        let user_key = ai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        let secret = match user_key {
            Some(key) => key.to_string(),
            None if provider.eq_ignore_ascii_case(default_provider) => default_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .ok_or_else(no_api_key)?,
            None => return Err(no_api_key()),
        };

        let mut credential = ProviderCredential::new(provider, secret);
        if let Some(account) = ai.account_id.filter(|a| !a.trim().is_empty()) {
            credential = credential.with_account_id(account);
        }
        Ok(credential)
    }
}

fn no_api_key() -> Error {
    Error::Precondition(
        "No API key available. Please provide your API key in the plugin.".to_string(),
    )
}

/// Reply to a `test: true` probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResponse {
    pub fn now() -> Self {
        Self {
            status: "ok",
            message: "Connection successful!",
            timestamp: Utc::now(),
        }
    }
}

/// Successful batch reply
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analyzed: usize,
    pub failed: usize,
    pub results: Vec<ScreenResult>,
    pub message: String,
}

impl From<BatchReport> for AnalyzeResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            success: true,
            analyzed: report.analyzed(),
            failed: report.failed(),
            message: report.message(),
            results: report.results,
        }
    }
}

/// Whole-request failure reply
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
