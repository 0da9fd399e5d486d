//! Critique CLI - Command line interface and HTTP endpoint for screen critique
//!
//! Automated UX critique of design screens, posted back as review comments.

mod commands;
mod server;
mod service;

use clap::{Parser, Subcommand};
use critique_core::{Config, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{AnalyzeArgs, ProvidersArgs, ServeArgs};

/// Critique: automated UX critique for design screens
#[derive(Parser, Debug)]
#[command(name = "critique")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Default AI provider (overrides config and env)
    #[arg(long, global = true, env = "CRITIQUE_PROVIDER")]
    provider: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Serve the analysis endpoint
    #[command(visible_alias = "s")]
    Serve(ServeArgs),

    /// Analyze a payload file
    #[command(visible_alias = "a")]
    Analyze(AnalyzeArgs),

    /// List available AI providers
    Providers(ProvidersArgs),

    /// Show current configuration
    Config,

    /// Create a secrets file template at the default location
    InitSecrets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let config = Config::load_with_overrides(cli.provider.clone(), None)?;

    if cli.verbose {
        tracing::info!(
            provider = %config.providers.default,
            bind = %config.server.bind,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("critique {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve(args)) => {
            args.execute(config).await?;
        }
        Some(Commands::Analyze(args)) => {
            args.execute(cli.verbose, config).await?;
        }
        Some(Commands::Providers(args)) => {
            args.execute(&config)?;
        }
        Some(Commands::Config) => {
            println!("Critique Configuration");
            println!("======================");
            println!();
            println!("Server:");
            println!("  bind: {}", config.server.bind);
            println!();
            println!("Providers:");
            println!("  default: {}", config.providers.default);
            println!("  request_timeout: {:?}", config.providers.request_timeout);
            println!("  poll_interval: {:?}", config.providers.poll_interval);
            println!("  poll_timeout: {:?}", config.providers.poll_timeout);
            println!("  max_tokens: {}", config.providers.max_tokens);
            println!("  temperature: {}", config.providers.temperature);
            println!();
            println!("Comments:");
            println!("  delay: {:?}", config.comments.delay);
            println!();
            println!("Figma:");
            println!("  api_base: {}", config.figma.api_base);
            println!("  image_scale: {}", config.figma.image_scale);
            println!();
            println!(
                "Prompt template: {}",
                config
                    .prompt
                    .template_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(embedded)".to_string())
            );
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
            if let Some(path) = Secrets::default_secrets_path() {
                println!("Secrets file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using environment only)");
                }
            }
        }
        Some(Commands::InitSecrets) => {
            let path = Secrets::create_template()?;
            println!("Secrets template written to {}", path.display());
            println!("Fill in the Figma token and, optionally, the default AI key.");
        }
        None => {
            println!("Critique - automated UX critique for design screens");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
