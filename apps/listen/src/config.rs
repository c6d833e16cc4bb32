//! Listener configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/eadms/listen.toml`
//! - Windows: `%APPDATA%/eadms/listen.toml`
//!
//! `EADMS_TOKEN` overrides the stored token.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use eadms_protocol::messaging::UserId;

/// Environment variable overriding [`ListenConfig::token`].
pub const TOKEN_ENV: &str = "EADMS_TOKEN";

/// Listener configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Portal base URL. Falls back to `EADMS_WS_URL` or the default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// JWT sent as `Authorization: Bearer <token>` on CONNECT.
    #[serde(default)]
    pub token: String,

    /// User whose personal queues are followed.
    #[serde(default)]
    pub user_id: UserId,
}

impl ListenConfig {
    /// Loads configuration from `path`, or from the platform path when `None`.
    ///
    /// A missing file is created with the defaults so it can be filled in.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(),
        };

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: ListenConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            config
        } else {
            let config = ListenConfig::default();
            config.save(&path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            config
        };

        config.apply_token_override(std::env::var(TOKEN_ENV).ok());
        Ok(config)
    }

    /// Saves the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds a bearer token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.token = token;
        }
    }

    /// Checks that the fields needed to connect are present.
    pub fn ensure_complete(&self) -> anyhow::Result<()> {
        if self.token.trim().is_empty() {
            anyhow::bail!("no token configured (set `token` or {TOKEN_ENV})");
        }
        if self.user_id <= 0 {
            anyhow::bail!("no user_id configured");
        }
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("eadms")
            .join("listen.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("eadms").join("listen.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/eadms/listen.toml")
    }
}
