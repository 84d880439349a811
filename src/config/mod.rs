//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::auth::{StoredToken, TokenStore};

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Stored Todoist access token (from the OAuth code exchange)
    pub access_token: Option<StoredToken>,
    /// Stored refresh token, if the token endpoint issued one
    pub refresh_token: Option<String>,
    /// OAuth app client ID (overridable via TODOIST_CLIENT_ID)
    pub oauth_client_id: Option<String>,
    /// OAuth app client secret (overridable via TODOIST_CLIENT_SECRET)
    pub oauth_client_secret: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "todoist-cli", "todoist-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// OAuth app credentials, env vars taking precedence over the config file.
    ///
    /// Credentials are injected here explicitly; the OAuth flow itself never
    /// reads ambient state.
    pub fn oauth_credentials(&self) -> Result<(String, String)> {
        let client_id = std::env::var("TODOIST_CLIENT_ID")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.oauth_client_id.clone())
            .context(
                "No OAuth client ID. Set TODOIST_CLIENT_ID or oauth_client_id in the config file.",
            )?;
        let client_secret = std::env::var("TODOIST_CLIENT_SECRET")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.oauth_client_secret.clone())
            .context(
                "No OAuth client secret. Set TODOIST_CLIENT_SECRET or oauth_client_secret in the config file.",
            )?;
        Ok((client_id, client_secret))
    }
}

impl TokenStore for Config {
    fn get_access_token(&self) -> Option<StoredToken> {
        self.access_token.clone()
    }

    fn set_access_token(&mut self, token: String, expires_in: Option<u64>) {
        self.access_token = Some(StoredToken::new(token, expires_in));
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
    }

    fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
    }
}
