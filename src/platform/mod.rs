pub mod telegram;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Kind of chat a message arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Group and supergroup chats, where the original link gets cleaned up
    pub fn is_multi_party(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// Identity fields of the user who sent a message
#[derive(Debug, Clone, Default)]
pub struct Sender {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A message received from the platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub chat_kind: ChatKind,
    pub sender: Option<Sender>,
    /// The message text, absent for media-only messages
    pub text: Option<String>,
}

/// What to hand to the platform's send-video call
#[derive(Debug, Clone, Copy)]
pub enum VideoSource<'a> {
    /// Remote URL the platform fetches itself
    Url(&'a str),
    /// Local file uploaded as raw bytes
    File(&'a Path),
}

/// Outbound operations the relay needs from a chat platform.
/// All sends are chat-scoped; the original message may already be deleted.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;

    /// Show the "uploading video" indicator
    async fn send_upload_action(&self, chat_id: i64) -> Result<()>;

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn send_video(&self, chat_id: i64, video: VideoSource<'_>, caption: &str) -> Result<()>;
}
