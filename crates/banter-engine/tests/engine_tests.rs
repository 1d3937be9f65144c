use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;

use banter_config::{GuildEngagementConfig, MemoryGuildStore};
use banter_core::{ChannelId, GuildId, MessageId, UserId};
use banter_engine::{Engine, EngineSettings, FALLBACK_APOLOGY, PROACTIVE_INSTRUCTION};
use banter_gateway::{MessageEvent, MockGateway};
use banter_llm::MockClient;

const GUILD: GuildId = GuildId(1);
const CHANNEL: ChannelId = ChannelId(10);

struct Harness {
    gateway: Arc<MockGateway>,
    client: Arc<MockClient>,
    store: Arc<MemoryGuildStore>,
    engine: Engine,
}

fn harness(persona: Option<&str>, client: MockClient, proactive_probability: f64) -> Harness {
    let gateway = Arc::new(MockGateway::new());
    let client = Arc::new(client);
    let store = Arc::new(MemoryGuildStore::new());
    let engine = Engine::new(
        persona.map(str::to_string),
        gateway.clone(),
        client.clone(),
        store.clone(),
        StdRng::seed_from_u64(42),
        EngineSettings {
            fetch_timeout: Duration::from_secs(5),
            proactive_probability,
            ..Default::default()
        },
    );
    Harness {
        gateway,
        client,
        store,
        engine,
    }
}

fn configure_guild(store: &MemoryGuildStore, guild: GuildId, channel: ChannelId) {
    store.insert(
        guild,
        GuildEngagementConfig {
            designated_channel: Some(channel),
            ..Default::default()
        },
    );
}

fn mention(content: &str) -> MessageEvent {
    MessageEvent {
        id: MessageId(1000),
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        author_id: UserId(7),
        author_name: "alice".into(),
        author_is_bot: false,
        content: content.into(),
        attachments: vec![],
        mentions_bot: true,
        is_reply_to_bot: false,
    }
}

fn warm_history(gateway: &MockGateway, channel: ChannelId) {
    gateway.set_history(
        channel,
        vec![MockGateway::message(
            1,
            channel,
            "bob",
            "anyone around?",
            chrono::Utc::now() - chrono::Duration::seconds(30),
        )],
    );
}

// ── Reactive handler ───────────────────────────────────────────

#[tokio::test]
async fn bot_author_causes_zero_side_effects() {
    let h = harness(Some("persona"), MockClient::new("mock"), 0.2);
    configure_guild(&h.store, GUILD, CHANNEL);

    let mut event = mention("hello");
    event.author_is_bot = true;
    h.engine.on_message(event).await;

    assert_eq!(h.gateway.history_fetch_count(), 0);
    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.reply_texts().is_empty());
}

#[tokio::test]
async fn guildless_message_causes_zero_side_effects() {
    let h = harness(Some("persona"), MockClient::new("mock"), 0.2);
    configure_guild(&h.store, GUILD, CHANNEL);

    let mut event = mention("hello");
    event.guild_id = None;
    h.engine.on_message(event).await;

    assert_eq!(h.gateway.history_fetch_count(), 0);
    assert_eq!(h.client.call_count(), 0);
}

#[tokio::test]
async fn mention_in_designated_channel_gets_a_reply() {
    let h = harness(
        Some("persona"),
        MockClient::new("mock").with_reply("well met, alice"),
        0.2,
    );
    configure_guild(&h.store, GUILD, CHANNEL);
    warm_history(&h.gateway, CHANNEL);

    h.engine.on_message(mention("hey bot, you there?")).await;

    let replies = h.gateway.replies.lock().unwrap().clone();
    assert_eq!(replies.len(), 1);
    let (channel, replied_to, text) = &replies[0];
    assert_eq!(*channel, CHANNEL);
    assert_eq!(*replied_to, MessageId(1000));
    assert_eq!(text, "well met, alice");
}

#[tokio::test]
async fn mention_outside_designated_channel_is_ignored() {
    let h = harness(Some("persona"), MockClient::new("mock"), 0.2);
    configure_guild(&h.store, GUILD, ChannelId(999));

    h.engine.on_message(mention("hello?")).await;

    assert_eq!(h.gateway.history_fetch_count(), 0);
    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.reply_texts().is_empty());
}

#[tokio::test]
async fn unconfigured_guild_is_ignored() {
    let h = harness(Some("persona"), MockClient::new("mock"), 0.2);

    h.engine.on_message(mention("hello?")).await;

    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.reply_texts().is_empty());
}

#[tokio::test]
async fn missing_persona_disables_engine_for_any_input() {
    let h = harness(None, MockClient::new("mock"), 0.2);
    configure_guild(&h.store, GUILD, CHANNEL);
    assert!(!h.engine.persona_loaded());

    for _ in 0..5 {
        h.engine.on_message(mention("direct mention!")).await;
    }

    assert_eq!(h.gateway.history_fetch_count(), 0);
    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.reply_texts().is_empty());
}

#[tokio::test]
async fn generation_error_sends_fallback_exactly_once() {
    let h = harness(
        Some("persona"),
        MockClient::new("mock").with_error("HTTP 500: model unavailable"),
        0.2,
    );
    configure_guild(&h.store, GUILD, CHANNEL);
    warm_history(&h.gateway, CHANNEL);

    h.engine.on_message(mention("hey!")).await;

    assert_eq!(h.client.call_count(), 1);
    assert_eq!(h.gateway.reply_texts(), vec![FALLBACK_APOLOGY.to_string()]);
}

#[tokio::test]
async fn empty_generation_sends_fallback() {
    let h = harness(
        Some("persona"),
        MockClient::new("mock").with_reply("   "),
        0.2,
    );
    configure_guild(&h.store, GUILD, CHANNEL);

    h.engine.on_message(mention("hey!")).await;

    assert_eq!(h.gateway.reply_texts(), vec![FALLBACK_APOLOGY.to_string()]);
}

#[tokio::test]
async fn history_fetch_failure_sends_fallback_without_generating() {
    let h = harness(Some("persona"), MockClient::new("mock"), 0.2);
    configure_guild(&h.store, GUILD, CHANNEL);
    h.gateway.fail_history(CHANNEL);

    h.engine.on_message(mention("hey!")).await;

    // The decision to engage was made, so the user still hears back.
    assert_eq!(h.client.call_count(), 0);
    assert_eq!(h.gateway.reply_texts(), vec![FALLBACK_APOLOGY.to_string()]);
}

#[tokio::test]
async fn config_store_failure_aborts_quietly() {
    let h = harness(Some("persona"), MockClient::new("mock"), 0.2);
    h.store.fail_guild(GUILD);

    h.engine.on_message(mention("hey!")).await;

    // No reply commitment was made yet, so no fallback either.
    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.reply_texts().is_empty());
}

#[tokio::test]
async fn persona_text_leads_the_generation_request() {
    let h = harness(
        Some("I am the persona."),
        MockClient::new("mock").with_reply("ok"),
        0.2,
    );
    configure_guild(&h.store, GUILD, CHANNEL);

    h.engine.on_message(mention("hello bot")).await;

    let requests = h.client.recorded_requests();
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let text = requests[0].text_content();
    assert!(text.starts_with("I am the persona."));
    assert!(text.contains("<current_user>alice</current_user>"));
}

// ── Proactive scheduler ────────────────────────────────────────

#[tokio::test]
async fn failed_probability_gate_processes_nothing() {
    // Probability zero: every draw exceeds the gate.
    let h = harness(Some("persona"), MockClient::new("mock"), 0.0);
    configure_guild(&h.store, GUILD, CHANNEL);
    warm_history(&h.gateway, CHANNEL);
    h.gateway.set_guilds([GUILD]);

    for _ in 0..50 {
        h.engine.tick().await;
    }

    assert_eq!(h.gateway.history_fetch_count(), 0);
    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.sent_texts().is_empty());
}

#[tokio::test]
async fn engages_first_qualifying_guild_only() {
    // Probability one: the gate always passes.
    let h = harness(
        Some("persona"),
        MockClient::new("mock").with_reply("so, about that"),
        1.0,
    );
    h.gateway.set_guilds([GuildId(1), GuildId(2), GuildId(3)]);

    // Guild 1 has no config. Guilds 2 and 3 both qualify.
    configure_guild(&h.store, GuildId(2), ChannelId(20));
    configure_guild(&h.store, GuildId(3), ChannelId(30));
    warm_history(&h.gateway, ChannelId(20));
    warm_history(&h.gateway, ChannelId(30));

    h.engine.tick().await;

    let sent = h.gateway.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ChannelId(20));
    assert_eq!(h.client.call_count(), 1);
}

#[tokio::test]
async fn cold_channel_does_not_qualify() {
    let h = harness(Some("persona"), MockClient::new("mock"), 1.0);
    h.gateway.set_guilds([GUILD]);
    configure_guild(&h.store, GUILD, CHANNEL);
    h.gateway.set_history(
        CHANNEL,
        vec![MockGateway::message(
            1,
            CHANNEL,
            "bob",
            "goodnight all",
            chrono::Utc::now() - chrono::Duration::seconds(700),
        )],
    );

    h.engine.tick().await;

    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.sent_texts().is_empty());
}

#[tokio::test]
async fn disabled_proactive_flag_skips_guild() {
    let h = harness(Some("persona"), MockClient::new("mock"), 1.0);
    h.gateway.set_guilds([GUILD]);
    let mut config = GuildEngagementConfig {
        designated_channel: Some(CHANNEL),
        ..Default::default()
    };
    config.flags.proactive_enabled = false;
    h.store.insert(GUILD, config);
    warm_history(&h.gateway, CHANNEL);

    h.engine.tick().await;

    assert_eq!(h.gateway.history_fetch_count(), 0);
    assert!(h.gateway.sent_texts().is_empty());
}

#[tokio::test]
async fn one_guild_failure_does_not_abort_the_tick() {
    let h = harness(
        Some("persona"),
        MockClient::new("mock").with_reply("carrying on"),
        1.0,
    );
    h.gateway.set_guilds([GuildId(1), GuildId(2)]);
    configure_guild(&h.store, GuildId(1), ChannelId(10));
    configure_guild(&h.store, GuildId(2), ChannelId(20));
    h.store.fail_guild(GuildId(1));
    warm_history(&h.gateway, ChannelId(20));

    h.engine.tick().await;

    let sent = h.gateway.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ChannelId(20));
}

#[tokio::test]
async fn proactive_turn_uses_the_fixed_instruction() {
    let h = harness(
        Some("persona"),
        MockClient::new("mock").with_reply("joining in"),
        1.0,
    );
    h.gateway.set_guilds([GUILD]);
    configure_guild(&h.store, GUILD, CHANNEL);
    warm_history(&h.gateway, CHANNEL);

    h.engine.tick().await;

    let requests = h.client.recorded_requests();
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let text = requests[0].text_content();
    assert!(text.contains(PROACTIVE_INSTRUCTION));
    assert!(!text.contains("on your own initiative"));
}

#[tokio::test]
async fn missing_persona_disables_proactive_ticks() {
    let h = harness(None, MockClient::new("mock"), 1.0);
    h.gateway.set_guilds([GUILD]);
    configure_guild(&h.store, GUILD, CHANNEL);
    warm_history(&h.gateway, CHANNEL);

    h.engine.tick().await;

    assert_eq!(h.client.call_count(), 0);
    assert!(h.gateway.sent_texts().is_empty());
}

#[tokio::test]
async fn default_gate_engages_roughly_a_fifth_of_ticks() {
    let h = harness(
        Some("persona"),
        MockClient::new("mock"),
        banter_engine::proactive::PROACTIVE_ENGAGE_PROBABILITY,
    );
    h.gateway.set_guilds([GUILD]);
    configure_guild(&h.store, GUILD, CHANNEL);

    let ticks = 2_000;
    for _ in 0..ticks {
        warm_history(&h.gateway, CHANNEL);
        h.engine.tick().await;
    }

    let rate = h.gateway.sent_texts().len() as f64 / ticks as f64;
    assert!(
        (rate - 0.20).abs() < 0.03,
        "engage rate {rate} too far from 0.20"
    );
}
