//! Analyze command - run one plugin payload from a file

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use critique_core::{AnalyzePayload, Config, ErrorResponse, ProbeResponse, Secrets};

use crate::service::AnalysisService;

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// JSON payload in the same shape the plugin posts
    #[arg(required = true)]
    pub payload: PathBuf,

    /// Render the prompt for each screen and exit without calling any API
    #[arg(long)]
    pub print_prompts: bool,
}

impl AnalyzeArgs {
    /// Execute the analyze command
    pub async fn execute(&self, verbose: bool, config: Config) -> anyhow::Result<()> {
        let raw = std::fs::read_to_string(&self.payload)
            .with_context(|| format!("Failed to read {}", self.payload.display()))?;
        let payload: AnalyzePayload = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid payload in {}", self.payload.display()))?;

        if verbose {
            tracing::info!(
                payload = %self.payload.display(),
                mode = payload.mode.name(),
                "Loaded payload"
            );
        }

        if payload.test {
            println!("{}", serde_json::to_string_pretty(&ProbeResponse::now())?);
            return Ok(());
        }

        let service = AnalysisService::from_config(config, Secrets::load()?)?;

        if self.print_prompts {
            let analysis = payload.analysis_config();
            for screen in payload.screens()? {
                println!("===== {} ({}) =====", screen.screen_name, screen.screen_id);
                println!("{}", service.prompts().build(&screen, &analysis));
                println!();
            }
            return Ok(());
        }

        match service.handle(&payload).await {
            Ok(response) => {
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
            Err(e) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ErrorResponse::new(e.to_string()))?
                );
                Err(e.into())
            }
        }
    }
}
