//! # Configuration
//!
//! `LegionnConfig` is read from a JSON file and then patched from the
//! environment. A missing file yields the defaults.
//!
//! ```json
//! {
//!   "server": { "host": "127.0.0.1", "port": 5000, "url_prefix": "api/1" },
//!   "jabber": { "id": "bot@jabber.example.org", "password": "secret" },
//!   "cleverbot": { "api_key": "..." }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "legionn.json";

pub const ENV_CONFIG_PATH: &str = "LEGIONN_CONFIG";
pub const ENV_JABBER_ID: &str = "LEGIONN_JABBER_ID";
pub const ENV_JABBER_PASSWORD: &str = "LEGIONN_JABBER_PASSWORD";
pub const ENV_CLEVERBOT_KEY: &str = "CLEVERBOT_API_KEY";
pub const ENV_CLEVERBOT_URL: &str = "CLEVERBOT_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LegionnConfig {
    pub server: ServerConfig,
    /// Jabber bot account; the bot is not started without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jabber: Option<JabberConfig>,
    pub cleverbot: CleverbotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix of every API route, without leading slash.
    pub url_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            url_prefix: "api/1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JabberConfig {
    /// Bare JID of the bot account (`name@domain`).
    pub id: String,
    pub password: String,
    #[serde(default = "default_bot_name")]
    pub name: String,
    #[serde(default = "default_bot_description")]
    pub description: String,
    /// Number of remembered commands.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl JabberConfig {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
            name: default_bot_name(),
            description: default_bot_description(),
            history_len: default_history_len(),
        }
    }

    /// Check the JID has the `local@domain` shape the bot relies on.
    pub fn validate(&self) -> Result<()> {
        match self.id.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(Error::Config(format!(
                "jabber id '{}' is not of the form name@domain",
                self.id
            ))),
        }
    }
}

fn default_bot_name() -> String {
    "cleverbot".to_string()
}

fn default_bot_description() -> String {
    "API for www.cleverbot.com".to_string()
}

fn default_history_len() -> usize {
    255
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleverbotConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for CleverbotConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.cleverbot.com".to_string(),
        }
    }
}

impl LegionnConfig {
    /// Resolve the config path: explicit argument, then `LEGIONN_CONFIG`, then
    /// `legionn.json` in the working directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load the file at `path` (defaults when absent) and apply env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Overlay values found through `lookup` (normally the process env).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(ENV_JABBER_ID) {
            match self.jabber.as_mut() {
                Some(jabber) => jabber.id = id,
                None => {
                    let password = lookup(ENV_JABBER_PASSWORD).unwrap_or_default();
                    self.jabber = Some(JabberConfig::new(id, password));
                }
            }
        }
        if let (Some(jabber), Some(password)) = (self.jabber.as_mut(), lookup(ENV_JABBER_PASSWORD)) {
            jabber.password = password;
        }
        if let Some(key) = lookup(ENV_CLEVERBOT_KEY) {
            self.cleverbot.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_CLEVERBOT_URL) {
            self.cleverbot.base_url = url;
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
