//! Configuration management for critique
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (CRITIQUE_*)
//! 3. Config file (~/.config/critique/config.toml)
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// HTTP endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the `serve` command binds to
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

/// AI provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider used when the request does not name one
    pub default: String,

    /// Timeout applied to every provider HTTP request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Delay between status polls for job-style providers
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Upper bound on the total polling time for job-style providers
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,

    /// Maximum tokens requested from the model
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: "aiml".to_string(),
            request_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(120),
            max_tokens: 4096,
            temperature: 0.4,
        }
    }
}

/// Comment posting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentsConfig {
    /// Pause between consecutive comment writes on one screen
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(150),
        }
    }
}

/// Figma REST configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FigmaConfig {
    /// Base URL of the REST API
    pub api_base: String,

    /// Export scale for screen images
    pub image_scale: u32,
}

impl Default for FigmaConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.figma.com/v1".to_string(),
            image_scale: 2,
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Template file replacing the embedded analysis prompt
    pub template_path: Option<PathBuf>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub comments: CommentsConfig,
    pub figma: FigmaConfig,
    pub prompt: PromptConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/critique/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("critique").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - CRITIQUE_BIND: Address for the HTTP endpoint
    /// - CRITIQUE_PROVIDER: Default AI provider
    /// - CRITIQUE_FIGMA_API: Figma REST base URL
    /// - CRITIQUE_PROMPT_TEMPLATE: Prompt template file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(bind) = std::env::var("CRITIQUE_BIND") {
            self.server.bind = bind;
        }

        if let Ok(provider) = std::env::var("CRITIQUE_PROVIDER") {
            self.providers.default = provider;
        }

        if let Ok(api_base) = std::env::var("CRITIQUE_FIGMA_API") {
            self.figma.api_base = api_base;
        }

        if let Ok(template) = std::env::var("CRITIQUE_PROMPT_TEMPLATE") {
            self.prompt.template_path = Some(PathBuf::from(template));
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, provider: Option<String>, bind: Option<String>) -> Self {
        if let Some(p) = provider {
            self.providers.default = p;
        }

        if let Some(b) = bind {
            self.server.bind = b;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(provider: Option<String>, bind: Option<String>) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(provider, bind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.providers.default, "aiml");
        assert_eq!(config.comments.delay, Duration::from_millis(150));
        assert_eq!(config.providers.poll_interval, Duration::from_secs(1));
        assert_eq!(config.figma.image_scale, 2);
        assert!(config.prompt.template_path.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default()
            .with_cli_overrides(Some("anthropic".to_string()), Some("0.0.0.0:9000".to_string()));

        assert_eq!(config.providers.default, "anthropic");
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[providers]
default = "gemini"
poll_timeout = "5m"
temperature = 0.2

[comments]
delay = "250ms"

[prompt]
template_path = "/etc/critique/prompt.md"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.providers.default, "gemini");
        assert_eq!(config.providers.poll_timeout, Duration::from_secs(300));
        assert_eq!(config.comments.delay, Duration::from_millis(250));
        assert_eq!(
            config.prompt.template_path,
            Some(PathBuf::from("/etc/critique/prompt.md"))
        );
        // untouched fields keep defaults
        assert_eq!(config.providers.max_tokens, 4096);
        assert_eq!(config.server.bind, "127.0.0.1:8787");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[figma]\napi_base = \"http://localhost:1234\"").unwrap();

        let config = Config::load_from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.figma.api_base, "http://localhost:1234");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[providers]\npoll_timeout = \"soon\"").unwrap();

        let err = Config::load_from_file(&file.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
