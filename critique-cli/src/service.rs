//! Request handling shared by the HTTP endpoint and the `analyze` command

use critique_core::{
    AnalyzePayload, AnalyzeResponse, Batch, BatchCoordinator, CommentLayout, Config, Error,
    PromptBuilder, ProviderRegistry, Secrets,
};
use critique_figma::{parse_file_key, FigmaClient};
use tracing::info;

/// Everything needed to serve analysis requests
pub struct AnalysisService {
    config: Config,
    secrets: Secrets,
    providers: ProviderRegistry,
    prompts: PromptBuilder,
}

impl AnalysisService {
    /// Build the service with the built-in provider registry
    pub fn from_config(config: Config, secrets: Secrets) -> critique_core::Result<Self> {
        let providers = ProviderRegistry::from_config(&config.providers)?;
        let prompts = PromptBuilder::from_config(&config.prompt)?;
        Ok(Self::new(config, secrets, providers, prompts))
    }

    pub fn new(
        config: Config,
        secrets: Secrets,
        providers: ProviderRegistry,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            config,
            secrets,
            providers,
            prompts,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Run one analysis request end to end.
    ///
    /// Returns an error only for whole-request failures; per-screen failures
    /// are reported inside the response.
    pub async fn handle(&self, payload: &AnalyzePayload) -> critique_core::Result<AnalyzeResponse> {
        let default_provider = self.config.providers.default.as_str();
        let default_key = self.secrets.default_ai_key();
        let credential = payload.resolve_credential(default_provider, default_key.as_deref())?;

        let token = self.secrets.figma_token().ok_or_else(|| {
            Error::Precondition(
                "Missing FIGMA_ACCESS_TOKEN. Set it in the environment or the secrets file."
                    .to_string(),
            )
        })?;

        let file_key = parse_file_key(payload.require_file_key()?)
            .map_err(|e| Error::Precondition(e.to_string()))?;
        let screens = payload.screens()?;
        let config = payload.analysis_config();
        let provider_id = payload.provider_id(default_provider);

        info!(
            mode = payload.mode.name(),
            screens = screens.len(),
            file = payload.file_name.as_deref().unwrap_or("(unnamed)"),
            provider = %provider_id,
            "Analyzing screens"
        );

        let figma = FigmaClient::new(token, file_key)
            .with_api_base(self.config.figma.api_base.clone())
            .with_image_scale(self.config.figma.image_scale);

        let report = BatchCoordinator::new(&self.providers, &figma, &figma)
            .with_prompts(self.prompts.clone())
            .with_layout(CommentLayout::new(self.config.comments.delay))
            .run_batch(Batch {
                screens: &screens,
                config: &config,
                provider_id: &provider_id,
                credential: &credential,
                mode: payload.mode.layout(),
            })
            .await?;

        Ok(AnalyzeResponse::from(report))
    }
}
