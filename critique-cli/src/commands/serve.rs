//! Serve command - run the HTTP endpoint for the design-tool plugin

use std::sync::Arc;

use clap::Args;
use critique_core::{Config, Secrets};

use crate::server;
use crate::service::AnalysisService;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides config and env)
    #[arg(short, long, env = "CRITIQUE_BIND")]
    pub bind: Option<String>,
}

impl ServeArgs {
    /// Execute the serve command
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let config = config.with_cli_overrides(None, self.bind.clone());
        let secrets = Secrets::load()?;

        if secrets.figma_token().is_none() {
            tracing::warn!("No Figma token configured; analysis requests will be rejected");
        }

        let bind = config.server.bind.clone();
        tracing::info!(
            bind = %bind,
            provider = %config.providers.default,
            "Starting critique server"
        );

        let service = Arc::new(AnalysisService::from_config(config, secrets)?);
        server::serve(service, &bind).await
    }
}
