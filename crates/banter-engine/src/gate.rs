//! Engagement gate: the pure decision function for reactive engagement.
//!
//! Two phases, both kept deliberately separate: a content-based trigger
//! (who is talking to us, and how) and an authorization check (is this the
//! guild's designated channel, is the persona loaded, is the feature on).
//! The greeting probability draw happens in the content phase, so it is
//! consumed even when authorization later suppresses the result — the gate
//! and the proactive tick share one RNG stream and tests rely on its
//! sequence under a fixed seed.

use rand::{Rng, RngExt};

use banter_config::GuildEngagementConfig;
use banter_core::ChannelId;
use banter_gateway::MessageEvent;

/// Tokens that count as a greeting, lowercase, matched whole-word.
pub const GREETING_WORDS: [&str; 12] = [
    "hola", "buenas", "holis", "hey", "hi", "hello", "saludos", "morning", "yo", "sup", "howdy",
    "heya",
];

/// Chance of answering an overheard greeting.
pub const GREETING_REPLY_PROBABILITY: f64 = 0.15;

/// Why an engagement attempt was (or was not) initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementTrigger {
    /// The bot was mentioned directly.
    Mention,
    /// The message replies to a message the bot authored.
    Reply,
    /// The message greets the channel and the probability draw fired.
    Greeting,
    /// No engagement.
    None,
}

impl EngagementTrigger {
    pub fn engages(&self) -> bool {
        !matches!(self, EngagementTrigger::None)
    }
}

/// Whether any whitespace-delimited token of `content` is a greeting.
pub fn contains_greeting(content: &str) -> bool {
    content
        .split_whitespace()
        .any(|token| GREETING_WORDS.contains(&token.to_lowercase().as_str()))
}

/// Phase one: classify the message by content. First match wins; the
/// greeting draw is only reached (and only consumed) when no
/// higher-precedence trigger applies.
pub fn content_trigger(event: &MessageEvent, rng: &mut impl Rng) -> EngagementTrigger {
    // Hard filter: our own messages and guild-less (DM) events never engage.
    if event.author_is_bot || event.guild_id.is_none() {
        return EngagementTrigger::None;
    }
    if event.mentions_bot {
        return EngagementTrigger::Mention;
    }
    if event.is_reply_to_bot {
        return EngagementTrigger::Reply;
    }
    if contains_greeting(&event.content) && rng.random::<f64>() < GREETING_REPLY_PROBABILITY {
        return EngagementTrigger::Greeting;
    }
    EngagementTrigger::None
}

/// Phase two: authorization. A content trigger only stands when the persona
/// is loaded, the guild is configured, engagement is enabled, and the event
/// arrived in the designated channel.
pub fn authorize(
    trigger: EngagementTrigger,
    persona_loaded: bool,
    config: Option<&GuildEngagementConfig>,
    channel: ChannelId,
) -> EngagementTrigger {
    if !trigger.engages() || !persona_loaded {
        return EngagementTrigger::None;
    }
    let Some(config) = config else {
        return EngagementTrigger::None;
    };
    if !config.flags.engagement_enabled || config.designated_channel != Some(channel) {
        return EngagementTrigger::None;
    }
    trigger
}

/// The full decision: content phase then authorization.
pub fn decide(
    event: &MessageEvent,
    config: Option<&GuildEngagementConfig>,
    persona_loaded: bool,
    rng: &mut impl Rng,
) -> EngagementTrigger {
    let trigger = content_trigger(event, rng);
    authorize(trigger, persona_loaded, config, event.channel_id)
}
