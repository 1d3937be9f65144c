//! # banter-config
//!
//! Configuration system for the banter bot. Reads from `banter.toml` and
//! environment variables — in that precedence order — and owns the per-guild
//! engagement configuration store.

pub mod guilds;
pub mod loader;
pub mod schema;

pub use guilds::{
    FeatureFlag, FileGuildStore, GuildEngagementConfig, GuildFeatureFlags, GuildStore,
    MemoryGuildStore,
};
pub use loader::ConfigLoader;
pub use schema::BanterConfig;
