//! Secrets management for critique
//!
//! Secrets are stored separately from configuration to avoid accidental sharing.
//! The secrets file is located at `~/.config/critique/secrets.toml` and must have
//! restrictive permissions (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variables (FIGMA_ACCESS_TOKEN, AIML_API_KEY)
//! 2. Secrets file (~/.config/critique/secrets.toml)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Secrets structure
#[derive(Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// Figma configuration
    pub figma: FigmaSecrets,

    /// Server-side AI key used for the default provider
    pub ai: AiSecrets,
}

/// Figma-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FigmaSecrets {
    /// Figma personal access token
    pub token: Option<String>,
}

/// AI provider secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AiSecrets {
    /// Key for the default (free) provider
    pub default_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("figma_token", &self.figma.token.is_some())
            .field("ai_default_key", &self.ai.default_key.is_some())
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        let secrets_path = Self::default_secrets_path();

        if let Some(path) = secrets_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = std::fs::metadata(path).map_err(Error::Io)?;
            let mode = metadata.permissions().mode();

            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), mode = format!("{:o}", mode & 0o777), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        trim_in_place(&mut secrets.figma.token);
        trim_in_place(&mut secrets.ai.default_key);

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/critique/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("critique").join("secrets.toml"))
    }

    /// Figma token, FIGMA_ACCESS_TOKEN taking priority over the file
    pub fn figma_token(&self) -> Option<String> {
        from_env_or("FIGMA_ACCESS_TOKEN", self.figma.token.as_deref())
    }

    /// Default provider key, AIML_API_KEY taking priority over the file
    pub fn default_ai_key(&self) -> Option<String> {
        from_env_or("AIML_API_KEY", self.ai.default_key.as_deref())
    }

    /// Create a template secrets file at the default location
    ///
    /// Creates parent directories if needed and sets secure permissions
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        let template = r#"# Critique Secrets
# This file contains sensitive credentials - do not share or commit to version control
#
# IMPORTANT: This file must have restrictive permissions (chmod 600)

[figma]
# Figma personal access token (needs file read + comment write)
token = ""

[ai]
# Key for the default provider, used when a request carries no key
default_key = ""
"#;

        std::fs::write(&path, template).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms).map_err(Error::Io)?;
        }

        warn!(path = %path.display(), "Created secrets template - please edit and add your tokens");

        Ok(path)
    }
}

fn trim_in_place(value: &mut Option<String>) {
    if let Some(ref mut v) = value {
        *v = v.trim().to_string();
    }
}

fn from_env_or(var: &str, file_value: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(var) {
        let value = value.trim().to_string();
        if !value.is_empty() {
            debug!(var, "Using secret from environment variable");
            return Some(value);
        }
    }

    match file_value {
        Some(value) if !value.is_empty() => {
            debug!(var, "Using secret from secrets file");
            Some(value.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_secrets() {
        let secrets = Secrets::default();
        assert!(secrets.figma.token.is_none());
        assert!(secrets.ai.default_key.is_none());
    }

    #[test]
    fn test_parse_secrets() {
        let toml = r#"
[figma]
token = "figd_xxxxxxxx"

[ai]
default_key = "aiml-123"
"#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.figma.token, Some("figd_xxxxxxxx".to_string()));
        assert_eq!(secrets.ai.default_key, Some("aiml-123".to_string()));
    }

    #[test]
    fn test_debug_hides_values() {
        let secrets: Secrets = toml::from_str("[figma]\ntoken = \"figd_secret\"").unwrap();
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("figd_secret"));
        assert!(debug.contains("figma_token: true"));
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[figma]\ntoken = \"test\"").unwrap();

        let perms = std::fs::Permissions::from_mode(0o644);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let result = Secrets::load_from_file(&file.path().to_path_buf());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("insecure permissions"));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_permissions_accepted_and_trimmed() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[figma]\ntoken = \"  figd_test  \"").unwrap();

        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let secrets = Secrets::load_from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(secrets.figma.token, Some("figd_test".to_string()));
    }

    #[test]
    fn test_empty_file_value_is_none() {
        assert_eq!(from_env_or("CRITIQUE_TEST_UNSET_VAR", Some("")), None);
        assert_eq!(
            from_env_or("CRITIQUE_TEST_UNSET_VAR", Some("value")),
            Some("value".to_string())
        );
    }
}
