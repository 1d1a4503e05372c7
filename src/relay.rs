use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Config, DeliveryConfig};
use crate::identity;
use crate::links;
use crate::platform::{ChatPlatform, IncomingMessage, VideoSource};
use crate::resolver::ResolverClient;
use crate::transfer::TransferManager;

pub const UNRESOLVED_NOTICE: &str = "Couldn't resolve that TikTok link. Try a different one?";
pub const DOWNLOAD_FAILED_NOTICE: &str = "Couldn't fetch that TikTok video. Try again later?";

/// How a message's handling ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No TikTok link; nothing was sent
    Discarded,
    /// The platform accepted the direct URL
    ReferenceSent,
    /// Reference delivery was rejected; the bytes were uploaded instead
    UploadSent,
    /// The link could not be resolved and the user was told so
    UserNotified,
}

/// Result of handing the direct URL to the platform
#[derive(Debug)]
enum DeliveryAttempt {
    Delivered,
    Rejected(anyhow::Error),
}

/// Per-message pipeline: match, moderate, resolve, deliver.
pub struct Relay {
    resolver: ResolverClient,
    transfer: TransferManager,
    delivery: DeliveryConfig,
}

impl Relay {
    pub fn new(config: &Config) -> Self {
        Self {
            resolver: ResolverClient::new(config.resolver.clone()),
            transfer: TransferManager::new(config.transfer.clone()),
            delivery: config.delivery.clone(),
        }
    }

    /// Handle one inbound message. Download and upload failures in the
    /// fallback path are returned as errors after the temp file is removed.
    pub async fn handle(
        &self,
        platform: &dyn ChatPlatform,
        msg: &IncomingMessage,
    ) -> Result<Outcome> {
        let Some(link) = links::extract_tiktok_url(msg.text.as_deref()) else {
            return Ok(Outcome::Discarded);
        };

        let chat_id = msg.chat_id;
        let sender = identity::display_name(msg.sender.as_ref());
        let caption = format!("Sent by: {}", sender);
        info!("TikTok link from {} in chat {}: {}", sender, chat_id, link);

        if msg.chat_kind.is_multi_party() && self.delivery.delete_in_groups {
            if let Err(e) = platform.delete_message(chat_id, msg.message_id).await {
                warn!("Couldn't delete message {}: {:#}", msg.message_id, e);
            }
        }

        platform.send_upload_action(chat_id).await.ok();

        // One HTTP session per message, dropped when handling ends
        let http = new_session()?;

        let Some(direct_url) = self.resolver.resolve(&http, link).await else {
            platform
                .send_text(chat_id, UNRESOLVED_NOTICE)
                .await
                .context("Failed to send resolve failure notice")?;
            return Ok(Outcome::UserNotified);
        };

        match deliver_by_reference(platform, chat_id, &direct_url, &caption).await {
            DeliveryAttempt::Delivered => return Ok(Outcome::ReferenceSent),
            DeliveryAttempt::Rejected(e) => {
                warn!("Direct send failed, will try uploading: {:#}", e);
            }
        }

        let asset = match self.transfer.download(&http, &direct_url).await {
            Ok(asset) => asset,
            Err(e) => {
                if self.delivery.notify_on_download_failure {
                    platform.send_text(chat_id, DOWNLOAD_FAILED_NOTICE).await.ok();
                }
                return Err(e.context(format!("Fallback download failed for {}", link)));
            }
        };

        let upload = platform
            .send_video(chat_id, VideoSource::File(asset.path()), &caption)
            .await;

        let path = asset.path().to_path_buf();
        if let Err(e) = asset.close() {
            warn!("Failed to remove temp file {}: {}", path.display(), e);
        }

        upload.context("Failed to upload video")?;
        Ok(Outcome::UploadSent)
    }
}

async fn deliver_by_reference(
    platform: &dyn ChatPlatform,
    chat_id: i64,
    direct_url: &str,
    caption: &str,
) -> DeliveryAttempt {
    match platform
        .send_video(chat_id, VideoSource::Url(direct_url), caption)
        .await
    {
        Ok(()) => DeliveryAttempt::Delivered,
        Err(e) => DeliveryAttempt::Rejected(e),
    }
}

fn new_session() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
