//! Providers command - list the registered AI backends

use clap::Args;
use critique_core::{Config, ProviderRegistry};

/// Arguments for the providers command
#[derive(Args, Debug)]
pub struct ProvidersArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ProvidersArgs {
    /// Execute the providers command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let registry = ProviderRegistry::from_config(&config.providers)?;
        let providers = registry.list_registered();

        if self.json {
            let list: Vec<serde_json::Value> = providers
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "id": p.name(),
                        "name": p.label(),
                        "sendsImage": p.sends_image(),
                        "default": p.name() == config.providers.default,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
            return Ok(());
        }

        println!("AI Providers");
        println!("============");
        println!();
        for provider in providers {
            let input = if provider.sends_image() {
                "image + text"
            } else {
                "text only"
            };
            let marker = if provider.name() == config.providers.default {
                " (default)"
            } else {
                ""
            };
            println!(
                "  {:<12} {:<14} {}{}",
                provider.name(),
                provider.label(),
                input,
                marker
            );
        }
        Ok(())
    }
}
