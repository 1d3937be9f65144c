//! # banter-core
//!
//! Core types and error types for the banter Discord bot. This crate defines
//! the shared vocabulary used by every other crate in the workspace.

pub mod error;
pub mod types;

pub use error::{BanterError, Result};
pub use types::{ChannelId, GuildId, MessageId, UserId};
