use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::adapter::*;
use banter_core::{BanterError, ChannelId, GuildId, MessageId, Result, UserId};

/// Discord Gateway opcodes.
const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

const DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Shared connection state the gateway loop and the REST surface both see.
struct GatewayState {
    bot_user_id: RwLock<Option<UserId>>,
    guilds: RwLock<BTreeSet<GuildId>>,
}

/// Discord gateway using the Gateway WebSocket for receiving and the REST
/// API for sending. Requires the Message Content privileged intent.
pub struct DiscordGateway {
    token: String,
    client: reqwest::Client,
    connected: Arc<AtomicBool>,
    shutdown_tx: RwLock<Option<tokio::sync::watch::Sender<bool>>>,
    state: Arc<GatewayState>,
}

impl DiscordGateway {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown_tx: RwLock::new(None),
            state: Arc::new(GatewayState {
                bot_user_id: RwLock::new(None),
                guilds: RwLock::new(BTreeSet::new()),
            }),
        }
    }

    /// Start the WebSocket loop. Returns a receiver for gateway events.
    pub fn start(&self) -> mpsc::Receiver<GatewayEvent> {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        *self.shutdown_tx.write() = Some(shutdown_tx);

        let token = self.token.clone();
        let connected = self.connected.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            gateway_loop(token, event_tx, shutdown_rx, connected, state).await;
        });

        event_rx
    }

    /// Stop the WebSocket loop gracefully.
    pub fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.write().take() {
            let _ = tx.send(true);
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("Discord gateway stopped");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn post_message(&self, channel: ChannelId, body: Value, op: &str) -> Result<()> {
        let url = format!("{DISCORD_API_BASE}/channels/{channel}/messages");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BanterError::Dispatch(format!("{op}: HTTP error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "Discord API error sending message");
            return Err(BanterError::Dispatch(format!(
                "{op}: Discord API {status}: {text}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn fetch_history(&self, channel: ChannelId, limit: u8) -> Result<Vec<RawMessage>> {
        let url = format!("{DISCORD_API_BASE}/channels/{channel}/messages");

        let resp = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string())])
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| BanterError::gateway("fetch_history", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BanterError::gateway(
                "fetch_history",
                format!("Discord API {status}: {text}"),
            ));
        }

        let data: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| BanterError::gateway("fetch_history", e))?;

        // Discord returns newest-first; keep that order per the trait contract.
        Ok(data
            .iter()
            .filter_map(|m| parse_raw_message(m, channel))
            .collect())
    }

    async fn send(&self, channel: ChannelId, text: &str) -> Result<()> {
        self.post_message(channel, json!({ "content": text }), "send")
            .await
    }

    async fn reply(&self, channel: ChannelId, message: MessageId, text: &str) -> Result<()> {
        let body = json!({
            "content": text,
            "message_reference": { "message_id": message.to_string() },
        });
        self.post_message(channel, body, "reply").await
    }

    async fn send_typing(&self, channel: ChannelId) -> Result<()> {
        let url = format!("{DISCORD_API_BASE}/channels/{channel}/typing");

        let _ = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await;

        Ok(())
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>> {
        // Attachment CDN URLs are pre-signed; no auth header needed.
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BanterError::gateway("fetch_attachment", e))?;

        if !resp.status().is_success() {
            return Err(BanterError::gateway(
                "fetch_attachment",
                format!("HTTP {}", resp.status()),
            ));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BanterError::gateway("fetch_attachment", e))?;
        Ok(bytes.to_vec())
    }

    fn known_guilds(&self) -> Vec<GuildId> {
        self.state.guilds.read().iter().copied().collect()
    }
}

/// Main gateway loop: connects to the Discord WebSocket, handles
/// heartbeats, dispatches events, reconnects with capped backoff.
async fn gateway_loop(
    token: String,
    event_tx: mpsc::Sender<GatewayEvent>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    connected: Arc<AtomicBool>,
    state: Arc<GatewayState>,
) {
    let mut backoff = 1u64;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        info!("Discord: connecting to Gateway...");

        let ws_result = tokio_tungstenite::connect_async(DISCORD_GATEWAY_URL).await;

        let ws_stream = match ws_result {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!(error = %e, "Discord Gateway connection failed");
                tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(60);
                continue;
            }
        };

        backoff = 1;
        let (mut write, mut read) = ws_stream.split();

        // Wait for HELLO to get heartbeat interval
        let heartbeat_interval = match read.next().await {
            Some(Ok(msg)) => {
                let text = msg.to_text().unwrap_or("{}");
                let payload: Value = serde_json::from_str(text).unwrap_or_default();
                if payload["op"].as_u64() == Some(OP_HELLO) {
                    payload["d"]["heartbeat_interval"].as_u64().unwrap_or(41250)
                } else {
                    warn!("Discord: expected HELLO, got op={}", payload["op"]);
                    41250
                }
            }
            _ => {
                error!("Discord: no HELLO received");
                continue;
            }
        };

        // Send IDENTIFY
        let identify = json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": token,
                "intents": 33281, // GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT | DIRECT_MESSAGES
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "banter",
                    "device": "banter"
                }
            }
        });

        if let Err(e) = write
            .send(tokio_tungstenite::tungstenite::Message::Text(
                identify.to_string().into(),
            ))
            .await
        {
            error!(error = %e, "Discord: failed to send IDENTIFY");
            continue;
        }

        connected.store(true, Ordering::SeqCst);
        let _ = event_tx.send(GatewayEvent::Connected).await;
        info!(
            heartbeat_ms = heartbeat_interval,
            "Discord Gateway connected"
        );

        let mut sequence: Option<u64> = None;
        let mut heartbeat_timer =
            tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval));
        heartbeat_timer.tick().await; // consume initial tick

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Discord: shutdown signal received");
                        let _ = write.close().await;
                        return;
                    }
                }
                _ = heartbeat_timer.tick() => {
                    let hb = json!({ "op": OP_HEARTBEAT, "d": sequence });
                    if let Err(e) = write.send(
                        tokio_tungstenite::tungstenite::Message::Text(hb.to_string().into())
                    ).await {
                        warn!(error = %e, "Discord: heartbeat send failed");
                        break;
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(ws_msg)) => {
                            if ws_msg.is_close() {
                                info!("Discord: server closed connection");
                                break;
                            }
                            let text = match ws_msg.to_text() {
                                Ok(t) => t,
                                Err(_) => continue,
                            };
                            let payload: Value = match serde_json::from_str(text) {
                                Ok(v) => v,
                                Err(_) => continue,
                            };

                            let op = payload["op"].as_u64().unwrap_or(999);

                            if let Some(s) = payload["s"].as_u64() {
                                sequence = Some(s);
                            }

                            match op {
                                OP_DISPATCH => {
                                    let event_name = payload["t"].as_str().unwrap_or("");
                                    let data = &payload["d"];
                                    handle_dispatch(event_name, data, &event_tx, &state).await;
                                }
                                OP_HEARTBEAT_ACK => {
                                    debug!("Discord: heartbeat ACK");
                                }
                                OP_HEARTBEAT => {
                                    let hb = json!({ "op": OP_HEARTBEAT, "d": sequence });
                                    let _ = write.send(
                                        tokio_tungstenite::tungstenite::Message::Text(hb.to_string().into())
                                    ).await;
                                }
                                _ => {
                                    debug!(op = op, "Discord: unhandled opcode");
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Discord WebSocket error");
                            break;
                        }
                        None => {
                            info!("Discord: WebSocket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
        let _ = event_tx
            .send(GatewayEvent::Disconnected(Some(
                "Gateway connection lost".into(),
            )))
            .await;

        if *shutdown_rx.borrow() {
            break;
        }

        info!(retry_in = backoff, "Discord: reconnecting...");
        tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
        backoff = (backoff * 2).min(60);
    }
}

/// Handle a Discord DISPATCH event (op=0).
async fn handle_dispatch(
    event_name: &str,
    data: &Value,
    event_tx: &mpsc::Sender<GatewayEvent>,
    state: &Arc<GatewayState>,
) {
    match event_name {
        "READY" => {
            if let Some(user_id) = parse_snowflake(&data["user"]["id"]) {
                *state.bot_user_id.write() = Some(UserId(user_id));
                info!(bot_id = user_id, "Discord bot ready");
            }
            // READY lists the guilds this session will receive GUILD_CREATE
            // for; seed the set so those don't look like fresh joins.
            if let Some(guilds) = data["guilds"].as_array() {
                let mut known = state.guilds.write();
                for g in guilds {
                    if let Some(id) = parse_snowflake(&g["id"]) {
                        known.insert(GuildId(id));
                    }
                }
            }
        }
        "GUILD_CREATE" => {
            let Some(id) = parse_snowflake(&data["id"]) else {
                return;
            };
            let guild = GuildId(id);
            let is_new = state.guilds.write().insert(guild);
            if is_new {
                info!(%guild, "joined new guild");
                let _ = event_tx.send(GatewayEvent::GuildJoin(guild)).await;
            }
        }
        "MESSAGE_CREATE" => {
            // Forward everything, including our own messages — the
            // engagement gate owns author filtering.
            let Some(event) = parse_message_event(data, state) else {
                return;
            };

            debug!(
                sender = %event.author_name,
                channel = %event.channel_id,
                mention = event.mentions_bot,
                "Discord message received"
            );

            if event_tx
                .send(GatewayEvent::Message(event))
                .await
                .is_err()
            {
                warn!("Discord: event channel closed");
            }
        }
        _ => {
            debug!(event = %event_name, "Discord: unhandled dispatch event");
        }
    }
}

fn parse_snowflake(value: &Value) -> Option<u64> {
    value.as_str().and_then(|s| s.parse::<u64>().ok())
}

fn parse_attachments(data: &Value) -> Vec<AttachmentRef> {
    let mut result = Vec::new();
    if let Some(attachments) = data["attachments"].as_array() {
        for att in attachments {
            let filename = att["filename"].as_str().unwrap_or("file").to_string();
            let media_type = att["content_type"]
                .as_str()
                .unwrap_or("application/octet-stream")
                .to_string();
            let url = att["url"].as_str().unwrap_or("").to_string();
            if !url.is_empty() {
                result.push(AttachmentRef {
                    filename,
                    media_type,
                    url,
                });
            }
        }
    }
    result
}

fn parse_message_event(data: &Value, state: &GatewayState) -> Option<MessageEvent> {
    let id = MessageId(parse_snowflake(&data["id"])?);
    let channel_id = ChannelId(parse_snowflake(&data["channel_id"])?);
    let author_id = UserId(parse_snowflake(&data["author"]["id"])?);
    let guild_id = parse_snowflake(&data["guild_id"]).map(GuildId);

    let bot_user_id = *state.bot_user_id.read();
    let author_is_bot =
        data["author"]["bot"].as_bool().unwrap_or(false) || Some(author_id) == bot_user_id;

    let mentions_bot = bot_user_id
        .map(|my_id| {
            data["mentions"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .any(|m| parse_snowflake(&m["id"]) == Some(my_id.0))
                })
                .unwrap_or(false)
        })
        .unwrap_or(false);

    let is_reply_to_bot = bot_user_id
        .map(|my_id| {
            parse_snowflake(&data["referenced_message"]["author"]["id"]) == Some(my_id.0)
        })
        .unwrap_or(false);

    Some(MessageEvent {
        id,
        guild_id,
        channel_id,
        author_id,
        author_name: data["author"]["username"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        author_is_bot,
        content: data["content"].as_str().unwrap_or("").to_string(),
        attachments: parse_attachments(data),
        mentions_bot,
        is_reply_to_bot,
    })
}

fn parse_raw_message(data: &Value, channel_id: ChannelId) -> Option<RawMessage> {
    let timestamp = data["timestamp"]
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);

    Some(RawMessage {
        id: MessageId(parse_snowflake(&data["id"])?),
        channel_id,
        author_id: UserId(parse_snowflake(&data["author"]["id"])?),
        author_name: data["author"]["username"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        author_is_bot: data["author"]["bot"].as_bool().unwrap_or(false),
        content: data["content"].as_str().unwrap_or("").to_string(),
        attachments: parse_attachments(data),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_message_event_resolves_reply_and_mention() {
        let state = GatewayState {
            bot_user_id: RwLock::new(Some(UserId(555))),
            guilds: RwLock::new(BTreeSet::new()),
        };
        let data = json!({
            "id": "1",
            "channel_id": "2",
            "guild_id": "3",
            "author": { "id": "4", "username": "alice", "bot": false },
            "content": "hey <@555>",
            "mentions": [{ "id": "555" }],
            "referenced_message": { "author": { "id": "555" } },
            "attachments": [],
        });

        let event = parse_message_event(&data, &state).unwrap();
        assert_eq!(event.guild_id, Some(GuildId(3)));
        assert!(event.mentions_bot);
        assert!(event.is_reply_to_bot);
        assert!(!event.author_is_bot);
    }

    #[test]
    fn parse_message_event_flags_own_messages() {
        let state = GatewayState {
            bot_user_id: RwLock::new(Some(UserId(555))),
            guilds: RwLock::new(BTreeSet::new()),
        };
        let data = json!({
            "id": "1",
            "channel_id": "2",
            "author": { "id": "555", "username": "banter" },
            "content": "hi",
        });

        let event = parse_message_event(&data, &state).unwrap();
        assert!(event.author_is_bot);
        assert_eq!(event.guild_id, None);
    }

    #[test]
    fn parse_raw_message_reads_attachments() {
        let data = json!({
            "id": "10",
            "author": { "id": "20", "username": "bob", "bot": false },
            "content": "look",
            "timestamp": "2026-08-23T12:00:00.000000+00:00",
            "attachments": [{
                "filename": "cat.png",
                "content_type": "image/png",
                "url": "https://cdn.example/cat.png",
            }],
        });

        let msg = parse_raw_message(&data, ChannelId(2)).unwrap();
        assert_eq!(msg.attachments.len(), 1);
        assert!(msg.attachments[0].is_image());
        assert_eq!(msg.timestamp.to_rfc3339(), "2026-08-23T12:00:00+00:00");
    }
}
