use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageEntity, MessageEntityKind, MessageId};
use tracing::{debug, error, info, warn};

use crate::platform::{ChatKind, ChatPlatform, IncomingMessage, Sender, VideoSource};
use crate::relay::{Outcome, Relay};

const START_TEXT: &str = "Send me a TikTok link and I'll fetch the video.\n\
                          I only respond to TikTok URLs (tiktok.com, vm/vt short links).";

/// `ChatPlatform` backed by the Telegram Bot API
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .context("deleteMessage failed")?;
        Ok(())
    }

    async fn send_upload_action(&self, chat_id: i64) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::UploadVideo)
            .await
            .context("sendChatAction failed")?;
        Ok(())
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .context("sendMessage failed")?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, video: VideoSource<'_>, caption: &str) -> Result<()> {
        let file = match video {
            VideoSource::Url(url) => {
                let url = reqwest::Url::parse(url)
                    .with_context(|| format!("Invalid media URL: {}", url))?;
                InputFile::url(url)
            }
            VideoSource::File(path) => InputFile::file(path.to_path_buf()),
        };

        self.bot
            .send_video(ChatId(chat_id), file)
            .caption(caption)
            .await
            .context("sendVideo failed")?;
        Ok(())
    }
}

/// Run the Telegram dispatcher until interrupted
pub async fn run(relay: Arc<Relay>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(is_start_command))
                .endpoint(handle_start),
        )
        .branch(
            dptree::filter(|msg: Message| {
                msg.text().is_some() && !starts_with_bot_command(msg.entities())
            })
            .endpoint(handle_message),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        // Handle every update concurrently, even within one chat
        .distribution_function(|_| None::<Infallible>)
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_start(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, START_TEXT).await?;
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    let incoming = to_incoming(&msg);
    let platform = TelegramPlatform::new(bot);

    match relay.handle(&platform, &incoming).await {
        Ok(outcome) => {
            if outcome != Outcome::Discarded {
                info!("Message {} in chat {}: {:?}", incoming.message_id, incoming.chat_id, outcome);
            }
        }
        Err(e) => {
            error!(
                "Relay failed for message {} in chat {}: {:#}",
                incoming.message_id, incoming.chat_id, e
            );
        }
    }

    Ok(())
}

fn to_incoming(msg: &Message) -> IncomingMessage {
    let chat_kind = if msg.chat.is_group() {
        ChatKind::Group
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Private
    };

    let sender = msg.from.as_ref().map(|user| Sender {
        id: user.id.0,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    });

    if sender.is_none() {
        warn!("Message {} has no sender", msg.id.0);
    }

    IncomingMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        chat_kind,
        sender,
        text: msg.text().map(str::to_string),
    }
}

/// `/start`, optionally addressed to a specific bot (`/start@my_bot`)
fn is_start_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .and_then(|cmd| cmd.split('@').next())
        .is_some_and(|cmd| cmd == "/start")
}

/// Telegram marks commands with a `bot_command` entity at offset 0; a bare
/// leading `/` is ordinary text.
fn starts_with_bot_command(entities: Option<&[MessageEntity]>) -> bool {
    entities.is_some_and(|entities| {
        entities
            .iter()
            .any(|e| e.offset == 0 && matches!(e.kind, MessageEntityKind::BotCommand))
    })
}
