use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    /// Any JSON API answering `?url=...&hd=1` with `data.hdplay` / `data.play`.
    #[serde(default = "default_resolver_base_url")]
    pub base_url: String,
    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    #[serde(default = "default_transfer_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Directory for fallback downloads; the system temp dir when unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    #[serde(default = "default_true")]
    pub delete_in_groups: bool,
    #[serde(default = "default_true")]
    pub notify_on_download_failure: bool,
}

fn default_resolver_base_url() -> String {
    "https://www.tikwm.com/api/".to_string()
}

fn default_resolver_timeout_secs() -> u64 {
    30
}

fn default_transfer_timeout_secs() -> u64 {
    120
}

fn default_chunk_size() -> usize {
    128 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: default_resolver_base_url(),
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_transfer_timeout_secs(),
            chunk_size: default_chunk_size(),
            temp_dir: None,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            delete_in_groups: true,
            notify_on_download_failure: true,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TransferConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load the config file (if present), then apply `BOT_TOKEN` and
    /// `TIKTOK_API_BASE` from the environment or a `.env` file.
    pub fn load(path: &Path) -> Result<Self> {
        // A missing .env is the normal case in deployments
        dotenvy::dotenv().ok();

        Self::load_with_overrides(
            path,
            std::env::var("BOT_TOKEN").ok(),
            std::env::var("TIKTOK_API_BASE").ok(),
        )
    }

    fn load_with_overrides(
        path: &Path,
        bot_token: Option<String>,
        api_base: Option<String>,
    ) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::from_toml_str("")?
        };

        config.apply_overrides(bot_token, api_base);
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    fn apply_overrides(&mut self, bot_token: Option<String>, api_base: Option<String>) {
        if let Some(token) = bot_token.filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(base) = api_base.filter(|b| !b.trim().is_empty()) {
            self.resolver.base_url = base;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Bot token is not set: add [telegram] bot_token or BOT_TOKEN to .env");
        }
        if self.transfer.chunk_size == 0 {
            anyhow::bail!("transfer.chunk_size must be greater than zero");
        }
        reqwest::Url::parse(&self.resolver.base_url).with_context(|| {
            format!("Invalid resolver base_url: {}", self.resolver.base_url)
        })?;
        Ok(())
    }
}
