//! Proactive engagement: every timer tick the persona may, with low
//! probability, join one warm conversation on its own initiative.
//!
//! At most one guild is engaged per cycle, and nothing is remembered
//! across cycles — the anti-spam bound is the probability gate plus the
//! one-guild cap, not a visit history.

use chrono::Utc;
use rand::RngExt;
use std::time::Duration;
use tracing::{error, info};

use banter_core::{GuildId, Result};
use banter_gateway::typing_scope;

use crate::context::{self, PROACTIVE_INSTRUCTION, TaskKind};
use crate::engine::Engine;

/// How often the proactive timer fires.
pub const PROACTIVE_PERIOD: Duration = Duration::from_secs(20 * 60);

/// Default chance that a given tick does anything at all.
pub const PROACTIVE_ENGAGE_PROBABILITY: f64 = 0.20;

/// A channel is "warm" if its last message is younger than this.
pub const WARM_CHANNEL_MAX_AGE_SECS: i64 = 600;

impl Engine {
    /// One scheduler tick. Idempotent no-op when the probability gate
    /// fails; otherwise engages the first qualifying guild and stops.
    pub async fn tick(&self) {
        let draw = {
            let mut rng = self.rng.lock();
            rng.random::<f64>()
        };
        if draw > self.settings.proactive_probability {
            return;
        }

        let Some(persona) = self.persona.as_deref() else {
            return;
        };

        info!("proactive cycle started — looking for a warm channel");

        for guild in self.gateway.known_guilds() {
            match self.try_join_conversation(persona, guild).await {
                Ok(true) => return, // at most one guild per cycle
                Ok(false) => continue,
                Err(e) => {
                    // One guild's failure never aborts the tick.
                    error!(error = %e, %guild, "proactive engagement failed for guild");
                    continue;
                }
            }
        }
    }

    /// Returns Ok(true) when this guild was engaged, Ok(false) when it did
    /// not qualify.
    async fn try_join_conversation(&self, persona: &str, guild: GuildId) -> Result<bool> {
        let Some(config) = self.store.get(guild).await? else {
            return Ok(false);
        };
        if !config.flags.proactive_enabled {
            return Ok(false);
        }
        let Some(channel) = config.designated_channel else {
            return Ok(false);
        };

        let recent = context::fetch_history_timed(
            &self.gateway,
            channel,
            1,
            self.settings.fetch_timeout,
        )
        .await?;
        let Some(last) = recent.first() else {
            return Ok(false);
        };
        let age = Utc::now()
            .signed_duration_since(last.timestamp)
            .num_seconds();
        if age >= WARM_CHANNEL_MAX_AGE_SECS {
            return Ok(false);
        }

        info!(%guild, %channel, age_secs = age, "warm channel found — joining the conversation");

        let _typing = typing_scope(self.gateway.clone(), channel);

        let request = context::build_request(
            &self.gateway,
            persona,
            channel,
            &self.settings.display_name,
            PROACTIVE_INSTRUCTION,
            TaskKind::Proactive,
            &[],
            self.settings.history_limit,
            self.settings.fetch_timeout,
        )
        .await?;

        let text = self.client.generate(&request).await?;
        self.gateway.send(channel, &text).await?;
        Ok(true)
    }
}
