use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use banter_core::{ChannelId, GuildId, MessageId, Result, UserId};

/// A file attached to a message. Attachments are referenced by URL; the
/// bytes are only downloaded when a vision turn needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub filename: String,
    pub media_type: String,
    pub url: String,
}

impl AttachmentRef {
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// A message as returned by a history fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub timestamp: DateTime<Utc>,
}

/// An inbound message event. The gateway forwards every MESSAGE_CREATE,
/// including the bot's own messages — filtering is the engagement gate's
/// responsibility, not the adapter's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: MessageId,
    /// None for direct messages.
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    /// Whether the bot user appears in the message's mentions.
    pub mentions_bot: bool,
    /// Whether this message replies to a message authored by the bot.
    pub is_reply_to_bot: bool,
}

/// Events emitted by a gateway connection.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// The gateway connected and identified successfully.
    Connected,
    /// The gateway disconnected.
    Disconnected(Option<String>),
    /// A new message arrived.
    Message(MessageEvent),
    /// The bot was added to a guild it had not seen before.
    GuildJoin(GuildId),
}

/// Trait implemented by each messaging gateway.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetch up to `limit` recent messages from a channel, newest first —
    /// the order the platform returns them in. Callers that need
    /// chronological order reverse the result themselves.
    async fn fetch_history(&self, channel: ChannelId, limit: u8) -> Result<Vec<RawMessage>>;

    /// Send a plain message to a channel.
    async fn send(&self, channel: ChannelId, text: &str) -> Result<()>;

    /// Send a message as a reply to an existing message.
    async fn reply(&self, channel: ChannelId, message: MessageId, text: &str) -> Result<()>;

    /// Fire one typing indicator. Platforms expire these after a few
    /// seconds; use [`typing_scope`] to hold one across a longer span.
    async fn send_typing(&self, channel: ChannelId) -> Result<()>;

    /// Download an attachment's bytes.
    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>>;

    /// All guilds this connection currently knows, ascending by id.
    fn known_guilds(&self) -> Vec<GuildId>;
}

/// Keeps a typing indicator alive until dropped.
///
/// Discord's indicator expires after roughly ten seconds, so the guard
/// re-fires it every eight until the owning engagement completes.
pub struct TypingGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Show a typing indicator in `channel` for as long as the guard lives.
pub fn typing_scope(gateway: Arc<dyn Gateway>, channel: ChannelId) -> TypingGuard {
    let handle = tokio::spawn(async move {
        loop {
            let _ = gateway.send_typing(channel).await;
            tokio::time::sleep(Duration::from_secs(8)).await;
        }
    });
    TypingGuard { handle }
}
