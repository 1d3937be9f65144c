//! The engine: owns the persona, the shared RNG stream, and the reactive
//! message handler. The proactive tick lives in `proactive.rs` on the same
//! struct.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use banter_config::GuildStore;
use banter_gateway::{Gateway, MessageEvent, typing_scope};
use banter_llm::GenerationClient;

use crate::context::{self, TaskKind};
use crate::gate::{self, EngagementTrigger};

/// Sent verbatim when a committed engagement fails mid-flight. Once the
/// persona has decided to speak, the user never gets silence.
pub const FALLBACK_APOLOGY: &str =
    "Ah... my connection to the arcane wisdom seems to be failing. 💀";

/// Runtime knobs carried from the config file.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// The persona's display name, used as the acting user on proactive turns.
    pub display_name: String,
    /// How many recent messages to pull into the context window.
    pub history_limit: u8,
    /// Caller-imposed bound on one history fetch. Zero disables it.
    pub fetch_timeout: Duration,
    /// Chance that a proactive tick does anything at all.
    pub proactive_probability: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            display_name: "Banter".into(),
            history_limit: 100,
            fetch_timeout: Duration::from_secs(15),
            proactive_probability: crate::proactive::PROACTIVE_ENGAGE_PROBABILITY,
        }
    }
}

/// The conversational engagement engine.
///
/// Stateless across engagements except for the write-once persona text and
/// the seeded RNG stream shared by the gate and the proactive tick.
/// Handlers for different messages run concurrently; nothing here
/// serializes them.
pub struct Engine {
    pub(crate) persona: Option<String>,
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) client: Arc<dyn GenerationClient>,
    pub(crate) store: Arc<dyn GuildStore>,
    pub(crate) rng: Mutex<StdRng>,
    pub(crate) settings: EngineSettings,
}

impl Engine {
    /// `persona: None` means the document failed to load at startup; the
    /// engine then ignores every event and every tick for the process
    /// lifetime.
    pub fn new(
        persona: Option<String>,
        gateway: Arc<dyn Gateway>,
        client: Arc<dyn GenerationClient>,
        store: Arc<dyn GuildStore>,
        rng: StdRng,
        settings: EngineSettings,
    ) -> Self {
        if persona.is_none() {
            error!("persona document not loaded — engagement is disabled for this process");
        }
        Self {
            persona,
            gateway,
            client,
            store,
            rng: Mutex::new(rng),
            settings,
        }
    }

    pub fn persona_loaded(&self) -> bool {
        self.persona.is_some()
    }

    /// Reactive entry point. Fire-and-forget: errors are contained here and
    /// never propagate to the caller or to other in-flight handlers.
    pub async fn on_message(&self, event: MessageEvent) {
        // Content phase first — the greeting draw must advance the shared
        // stream even when the checks below suppress the result.
        let trigger = {
            let mut rng = self.rng.lock();
            gate::content_trigger(&event, &mut *rng)
        };
        if !trigger.engages() {
            return;
        }

        let Some(persona) = self.persona.as_deref() else {
            return;
        };
        // content_trigger filtered guild-less events already.
        let Some(guild) = event.guild_id else {
            return;
        };

        let config = match self.store.get(guild).await {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, %guild, "failed to fetch guild config");
                return;
            }
        };

        let trigger = gate::authorize(trigger, true, config.as_ref(), event.channel_id);
        if !trigger.engages() {
            return;
        }

        info!(
            %guild,
            channel = %event.channel_id,
            user = %event.author_name,
            ?trigger,
            "engaging"
        );

        let _typing = typing_scope(self.gateway.clone(), event.channel_id);

        match self.compose_reply(persona, &event, trigger).await {
            Ok(text) => {
                if let Err(e) = self.gateway.reply(event.channel_id, event.id, &text).await {
                    // Dispatch failures are terminal for this attempt.
                    error!(error = %e, channel = %event.channel_id, "reply dispatch failed — abandoning");
                }
            }
            Err(e) => {
                error!(error = %e, channel = %event.channel_id, "engagement failed — sending fallback");
                if let Err(send_err) = self
                    .gateway
                    .reply(event.channel_id, event.id, FALLBACK_APOLOGY)
                    .await
                {
                    warn!(error = %send_err, "failed to dispatch fallback message");
                }
            }
        }
    }

    /// Build the context and run the generation call for a reactive turn.
    async fn compose_reply(
        &self,
        persona: &str,
        event: &MessageEvent,
        trigger: EngagementTrigger,
    ) -> banter_core::Result<String> {
        let kind = match trigger {
            EngagementTrigger::Greeting => TaskKind::OverheardGreeting,
            _ => TaskKind::Direct,
        };

        let request = context::build_request(
            &self.gateway,
            persona,
            event.channel_id,
            &event.author_name,
            &event.content,
            kind,
            &event.attachments,
            self.settings.history_limit,
            self.settings.fetch_timeout,
        )
        .await?;

        self.client.generate(&request).await
    }
}
