//! Mock gateway for deterministic engine tests.
//!
//! Records every outbound call and serves queued histories without touching
//! the network.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::adapter::{Gateway, RawMessage};
use banter_core::{BanterError, ChannelId, GuildId, MessageId, Result, UserId};

/// A recording mock gateway. Histories are stored newest-first, exactly as
/// the real gateway returns them.
#[derive(Default)]
pub struct MockGateway {
    history: Mutex<HashMap<ChannelId, Vec<RawMessage>>>,
    attachments: Mutex<HashMap<String, Vec<u8>>>,
    guilds: Mutex<BTreeSet<GuildId>>,
    failing_channels: Mutex<BTreeSet<ChannelId>>,

    /// Every `send` call: (channel, text).
    pub sent: Mutex<Vec<(ChannelId, String)>>,
    /// Every `reply` call: (channel, replied-to message, text).
    pub replies: Mutex<Vec<(ChannelId, MessageId, String)>>,
    history_fetches: AtomicUsize,
    typing_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a newest-first history for a channel.
    pub fn set_history(&self, channel: ChannelId, messages: Vec<RawMessage>) {
        self.history.lock().unwrap().insert(channel, messages);
    }

    /// Register an attachment body by URL.
    pub fn set_attachment(&self, url: &str, bytes: Vec<u8>) {
        self.attachments
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes);
    }

    /// Set the known-guild set.
    pub fn set_guilds(&self, guilds: impl IntoIterator<Item = GuildId>) {
        *self.guilds.lock().unwrap() = guilds.into_iter().collect();
    }

    /// Make history fetches for this channel fail.
    pub fn fail_history(&self, channel: ChannelId) {
        self.failing_channels.lock().unwrap().insert(channel);
    }

    pub fn history_fetch_count(&self) -> usize {
        self.history_fetches.load(Ordering::SeqCst)
    }

    pub fn typing_call_count(&self) -> usize {
        self.typing_calls.load(Ordering::SeqCst)
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn reply_texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, text)| text.clone())
            .collect()
    }

    /// Convenience: a plain user message for history setup.
    pub fn message(
        id: u64,
        channel: ChannelId,
        author: &str,
        content: &str,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> RawMessage {
        RawMessage {
            id: MessageId(id),
            channel_id: channel,
            author_id: UserId(id),
            author_name: author.to_string(),
            author_is_bot: false,
            content: content.to_string(),
            attachments: vec![],
            timestamp,
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn fetch_history(&self, channel: ChannelId, limit: u8) -> Result<Vec<RawMessage>> {
        self.history_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_channels.lock().unwrap().contains(&channel) {
            return Err(BanterError::gateway(
                "fetch_history",
                format!("injected failure for channel {channel}"),
            ));
        }
        let history = self.history.lock().unwrap();
        let messages = history.get(&channel).cloned().unwrap_or_default();
        Ok(messages.into_iter().take(limit as usize).collect())
    }

    async fn send(&self, channel: ChannelId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((channel, text.to_string()));
        Ok(())
    }

    async fn reply(&self, channel: ChannelId, message: MessageId, text: &str) -> Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push((channel, message, text.to_string()));
        Ok(())
    }

    async fn send_typing(&self, _channel: ChannelId) -> Result<()> {
        self.typing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>> {
        self.attachments
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| BanterError::gateway("fetch_attachment", format!("unknown url {url}")))
    }

    fn known_guilds(&self) -> Vec<GuildId> {
        self.guilds.lock().unwrap().iter().copied().collect()
    }
}
