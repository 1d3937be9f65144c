//! Per-guild engagement configuration store.
//!
//! The engine only ever reads; writes come from the guild-join handler and
//! from whatever admin surface manages a guild's settings. Concurrent reads
//! are safe, and every mutation is written through to disk immediately.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

use banter_core::{BanterError, ChannelId, GuildId, Result};

/// Feature flags gating the engagement engine per guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildFeatureFlags {
    /// Reactive replies (mention / reply-to-bot / overheard greeting).
    pub engagement_enabled: bool,
    /// Proactive join-the-conversation turns.
    pub proactive_enabled: bool,
}

impl Default for GuildFeatureFlags {
    fn default() -> Self {
        Self {
            engagement_enabled: true,
            proactive_enabled: true,
        }
    }
}

/// A single flag, for the typed update surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureFlag {
    Engagement,
    Proactive,
}

/// One guild's engagement configuration.
///
/// The engine acts only in the designated channel; a guild with no
/// designated channel is configured but inert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildEngagementConfig {
    pub designated_channel: Option<ChannelId>,
    pub flags: GuildFeatureFlags,
}

/// Read/write surface over per-guild configuration.
#[async_trait]
pub trait GuildStore: Send + Sync {
    /// Fetch one guild's config. `None` means the guild has never been set up.
    async fn get(&self, guild: GuildId) -> Result<Option<GuildEngagementConfig>>;

    /// Create a default config for a newly joined guild if none exists.
    async fn ensure_defaults(&self, guild: GuildId) -> Result<()>;

    /// Set or clear the designated channel for a guild.
    async fn set_designated_channel(
        &self,
        guild: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<()>;

    /// Flip a single feature flag.
    async fn set_flag(&self, guild: GuildId, flag: FeatureFlag, value: bool) -> Result<()>;

    /// All guild ids with stored configuration, ascending.
    async fn guild_ids(&self) -> Result<Vec<GuildId>>;
}

// ── File-backed store ──────────────────────────────────────────

/// Serialized form: TOML requires string map keys.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GuildFile {
    guilds: BTreeMap<String, GuildEngagementConfig>,
}

/// TOML-file-backed guild store. Loads once at open, writes through on
/// every mutation.
pub struct FileGuildStore {
    path: PathBuf,
    inner: RwLock<BTreeMap<GuildId, GuildEngagementConfig>>,
}

impl FileGuildStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let map = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let file: GuildFile = toml::from_str(&raw).map_err(|e| {
                BanterError::GuildStore(format!("failed to parse {}: {e}", path.display()))
            })?;
            let mut map = BTreeMap::new();
            for (key, config) in file.guilds {
                let id: GuildId = key.parse().map_err(|_| {
                    BanterError::GuildStore(format!("invalid guild id key '{key}'"))
                })?;
                map.insert(id, config);
            }
            map
        } else {
            BTreeMap::new()
        };
        info!(path = %path.display(), guilds = map.len(), "guild store opened");
        Ok(Self {
            path,
            inner: RwLock::new(map),
        })
    }

    fn persist(&self, map: &BTreeMap<GuildId, GuildEngagementConfig>) -> Result<()> {
        let file = GuildFile {
            guilds: map
                .iter()
                .map(|(id, config)| (id.to_string(), config.clone()))
                .collect(),
        };
        let raw = toml::to_string_pretty(&file)
            .map_err(|e| BanterError::GuildStore(format!("serialize failed: {e}")))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn mutate(
        &self,
        guild: GuildId,
        apply: impl FnOnce(&mut GuildEngagementConfig),
    ) -> Result<()> {
        let mut map = self.inner.write();
        apply(map.entry(guild).or_default());
        self.persist(&map)
    }
}

#[async_trait]
impl GuildStore for FileGuildStore {
    async fn get(&self, guild: GuildId) -> Result<Option<GuildEngagementConfig>> {
        Ok(self.inner.read().get(&guild).cloned())
    }

    async fn ensure_defaults(&self, guild: GuildId) -> Result<()> {
        let mut map = self.inner.write();
        if map.contains_key(&guild) {
            return Ok(());
        }
        map.insert(guild, GuildEngagementConfig::default());
        info!(%guild, "created default guild config");
        self.persist(&map)
    }

    async fn set_designated_channel(
        &self,
        guild: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<()> {
        self.mutate(guild, |config| config.designated_channel = channel)
    }

    async fn set_flag(&self, guild: GuildId, flag: FeatureFlag, value: bool) -> Result<()> {
        self.mutate(guild, |config| match flag {
            FeatureFlag::Engagement => config.flags.engagement_enabled = value,
            FeatureFlag::Proactive => config.flags.proactive_enabled = value,
        })
    }

    async fn guild_ids(&self) -> Result<Vec<GuildId>> {
        Ok(self.inner.read().keys().copied().collect())
    }
}

// ── In-memory store ────────────────────────────────────────────

/// In-memory guild store for tests. Supports per-guild failure injection
/// so error-isolation paths can be exercised.
#[derive(Default)]
pub struct MemoryGuildStore {
    inner: RwLock<BTreeMap<GuildId, GuildEngagementConfig>>,
    failing: RwLock<BTreeSet<GuildId>>,
}

impl MemoryGuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a config directly.
    pub fn insert(&self, guild: GuildId, config: GuildEngagementConfig) {
        self.inner.write().insert(guild, config);
    }

    /// Make every `get` for this guild fail.
    pub fn fail_guild(&self, guild: GuildId) {
        self.failing.write().insert(guild);
    }

    fn check_failing(&self, guild: GuildId) -> Result<()> {
        if self.failing.read().contains(&guild) {
            return Err(BanterError::GuildStore(format!(
                "injected failure for guild {guild}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GuildStore for MemoryGuildStore {
    async fn get(&self, guild: GuildId) -> Result<Option<GuildEngagementConfig>> {
        self.check_failing(guild)?;
        Ok(self.inner.read().get(&guild).cloned())
    }

    async fn ensure_defaults(&self, guild: GuildId) -> Result<()> {
        self.inner.write().entry(guild).or_default();
        Ok(())
    }

    async fn set_designated_channel(
        &self,
        guild: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<()> {
        self.inner
            .write()
            .entry(guild)
            .or_default()
            .designated_channel = channel;
        Ok(())
    }

    async fn set_flag(&self, guild: GuildId, flag: FeatureFlag, value: bool) -> Result<()> {
        let mut map = self.inner.write();
        let config = map.entry(guild).or_default();
        match flag {
            FeatureFlag::Engagement => config.flags.engagement_enabled = value,
            FeatureFlag::Proactive => config.flags.proactive_enabled = value,
        }
        Ok(())
    }

    async fn guild_ids(&self) -> Result<Vec<GuildId>> {
        Ok(self.inner.read().keys().copied().collect())
    }
}
