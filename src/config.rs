use std::path::{Path, PathBuf};

use color_eyre::{eyre::WrapErr, Result};
use serde::Deserialize;

/// Service configuration, read from a JSON file (`.config.json` by default).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// sqlx SQLite URL, e.g. `sqlite://coursework.db`.
    pub database_url: String,
    /// Public base URL of this API, used to build download links.
    pub api: String,
    /// Root folder for answer attachments.
    pub file_storage_path: PathBuf,
    /// Append-only plain-text log, in addition to stdout.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(default = "default_email_endpoint")]
    pub endpoint: String,
    /// Empty disables outgoing mail.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_email_from")]
    pub from: String,
}

fn default_email_endpoint() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_email_from() -> String {
    "Coursework <noreply@localhost>".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: default_email_endpoint(),
            api_key: String::new(),
            from: default_email_from(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("could not read config file {}", path.display()))?;
        Self::from_json(&raw).wrap_err_with(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        if config.database_url.trim().is_empty() {
            color_eyre::eyre::bail!("databaseUrl must not be empty");
        }
        if config.file_storage_path.as_os_str().is_empty() {
            color_eyre::eyre::bail!("fileStoragePath must not be empty");
        }
        Ok(config)
    }

    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_disables_email() {
        let config = Config::from_json(
            r#"{
                "databaseUrl": "sqlite://coursework.db",
                "api": "http://localhost:8080/",
                "fileStoragePath": "/var/lib/coursework/uploads"
            }"#,
        )
        .unwrap();

        assert_eq!(config.api_base(), "http://localhost:8080");
        assert!(config.email.api_key.is_empty());
        assert!(config.log_file.is_none());
    }

    #[test]
    fn empty_storage_path_is_refused() {
        let result = Config::from_json(
            r#"{"databaseUrl": "sqlite://x.db", "api": "", "fileStoragePath": ""}"#,
        );
        assert!(result.is_err());
    }
}
