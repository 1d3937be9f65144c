//! Context builder: turns a channel's recent history plus the triggering
//! input into the structured prompt the generation client consumes.
//!
//! History arrives newest-first from the gateway and is reversed here —
//! the model reads the transcript in chronological order. Every message is
//! sanitized so old content cannot be reinterpreted as markup or fresh
//! mentions by the model.

use base64::Engine as _;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use banter_core::{BanterError, ChannelId, Result};
use banter_gateway::{AttachmentRef, Gateway, RawMessage};
use banter_llm::GenerationRequest;

/// What kind of turn the context is being built for. Affects the task
/// framing only, never the decision logic upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// A direct mention or a reply to the bot.
    Direct,
    /// A greeting the persona chose to answer on its own initiative.
    OverheardGreeting,
    /// The proactive scheduler's synthetic join-the-conversation turn.
    Proactive,
}

/// Appended to the input when the persona answers an overheard greeting —
/// distinguishes self-initiated replies from direct address in tone.
pub const OVERHEARD_GREETING_NOTE: &str =
    "\n(You just saw this user greet the channel and decided to respond on your own initiative.)";

/// The fixed instruction for proactive turns. Forbids greeting language;
/// the persona is joining a conversation already in progress.
pub const PROACTIVE_INSTRUCTION: &str = "(You have been quietly watching the conversation and \
    decide to join in. Read the history and make a relevant comment, ask a question, or crack a \
    joke to fold yourself into the chat. Do not greet anyone — just continue the conversation \
    that is already happening.)";

/// One sanitized transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub author: String,
    pub content: String,
    pub attachments: usize,
}

impl HistoryEntry {
    pub fn from_raw(raw: &RawMessage) -> Self {
        Self {
            author: raw.author_name.clone(),
            content: sanitize_content(&raw.content),
            attachments: raw.attachments.len(),
        }
    }

    fn render(&self) -> String {
        let mut content = self.content.clone();
        if self.attachments > 0 {
            content.push_str(&format!(
                " [the user attached {} image(s)]",
                self.attachments
            ));
        }
        format!(
            "<message><user>{}</user><content>{}</content></message>",
            self.author,
            content.trim()
        )
    }
}

/// Escape markdown-significant characters and break mention syntax so
/// history text reads as inert content.
pub fn sanitize_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '\\' | '*' | '_' | '~' | '`' | '|' => {
                out.push('\\');
                out.push(c);
            }
            // A zero-width space after '@' defuses user, role, and
            // @everyone mentions alike.
            '@' => out.push_str("@\u{200B}"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a chronological transcript as one structured block.
pub fn render_history(entries: &[HistoryEntry]) -> String {
    let body = entries
        .iter()
        .map(HistoryEntry::render)
        .collect::<Vec<_>>()
        .join("\n");
    format!("<chat_history>\n{body}\n</chat_history>")
}

/// Fetch history with the caller-imposed timeout. Zero disables the bound.
pub(crate) async fn fetch_history_timed(
    gateway: &Arc<dyn Gateway>,
    channel: ChannelId,
    limit: u8,
    timeout: Duration,
) -> Result<Vec<RawMessage>> {
    if timeout.is_zero() {
        return gateway.fetch_history(channel, limit).await;
    }
    tokio::time::timeout(timeout, gateway.fetch_history(channel, limit))
        .await
        .map_err(|_| BanterError::Timeout {
            op: "fetch_history".into(),
            secs: timeout.as_secs(),
        })?
}

/// Build the complete generation request for one engagement.
///
/// Segment order: persona text, then the context-and-task envelope, then any
/// decoded image attachments. A history fetch failure propagates — the
/// builder never falls back to a partial transcript.
#[allow(clippy::too_many_arguments)]
pub async fn build_request(
    gateway: &Arc<dyn Gateway>,
    persona: &str,
    channel: ChannelId,
    user_name: &str,
    user_input: &str,
    kind: TaskKind,
    attachments: &[AttachmentRef],
    history_limit: u8,
    fetch_timeout: Duration,
) -> Result<GenerationRequest> {
    let raw = fetch_history_timed(gateway, channel, history_limit, fetch_timeout).await?;
    let mut entries: Vec<HistoryEntry> = raw.iter().map(HistoryEntry::from_raw).collect();
    // Newest-first from the gateway; the model reads oldest-first.
    entries.reverse();

    let mut input = user_input.to_string();
    if kind == TaskKind::OverheardGreeting {
        input.push_str(OVERHEARD_GREETING_NOTE);
    }

    let envelope = format!(
        "\n<current_context_and_task>\n    \
         <current_timestamp>{}</current_timestamp>\n    \
         <current_user>{}</current_user>\n    \
         {}\n    \
         <user_input>{}</user_input>\n\
         </current_context_and_task>\n",
        Utc::now().format("%A, %H:%M"),
        user_name,
        render_history(&entries),
        input,
    );

    let mut request = GenerationRequest::new();
    request.push_text(persona);
    request.push_text(envelope);

    let images: Vec<&AttachmentRef> = attachments.iter().filter(|a| a.is_image()).collect();
    if !images.is_empty() {
        request.push_text("\nThe user also attached the following image(s):");
        for attachment in images {
            let bytes = gateway.fetch_attachment(&attachment.url).await?;
            debug!(
                filename = %attachment.filename,
                bytes = bytes.len(),
                "attached image to generation request"
            );
            request.push_image(
                base64::engine::general_purpose::STANDARD.encode(&bytes),
                attachment.media_type.clone(),
            );
        }
    }

    Ok(request)
}
