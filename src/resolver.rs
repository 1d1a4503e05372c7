use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ResolverConfig;

/// Fields of `data` holding a playable URL, best first.
const MEDIA_URL_FIELDS: &[&str] = &["hdplay", "play", "wmplay"];

/// Client for the JSON lookup API that turns a TikTok page URL into a direct
/// MP4 URL.
pub struct ResolverClient {
    config: ResolverConfig,
}

impl ResolverClient {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve `source_url` to a direct media URL.
    /// Every failure is logged and reported as `None`.
    pub async fn resolve(&self, http: &reqwest::Client, source_url: &str) -> Option<String> {
        match self.lookup(http, source_url).await {
            Ok(body) => {
                let media = extract_media_url(&body);
                if media.is_none() {
                    warn!("Resolver returned no media URL for {}", source_url);
                }
                media
            }
            Err(e) => {
                warn!("Resolver error for {}: {:#}", source_url, e);
                None
            }
        }
    }

    async fn lookup(&self, http: &reqwest::Client, source_url: &str) -> Result<Value> {
        debug!("Resolving {} via {}", source_url, self.config.base_url);

        let response = http
            .get(&self.config.base_url)
            .query(&[("url", source_url), ("hd", "1")])
            .timeout(self.config.timeout())
            .send()
            .await
            .context("Failed to send request to resolver")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Resolver API status {}", status);
        }

        response
            .json()
            .await
            .context("Failed to parse resolver response")
    }
}

/// Pick the first non-empty URL from `data.hdplay`, `data.play`, `data.wmplay`.
fn extract_media_url(body: &Value) -> Option<String> {
    let data = body.get("data")?.as_object()?;
    MEDIA_URL_FIELDS
        .iter()
        .filter_map(|field| data.get(*field).and_then(Value::as_str))
        .find(|url| !url.is_empty())
        .map(str::to_string)
}
