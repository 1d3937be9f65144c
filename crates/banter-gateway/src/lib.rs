//! # banter-gateway
//!
//! Messaging-gateway abstraction: the [`Gateway`] trait the engine consumes,
//! the Discord implementation (Gateway WebSocket for ingress, REST v10 for
//! egress), and a recording mock for tests.

pub mod adapter;
pub mod discord;
pub mod mock;

pub use adapter::{
    AttachmentRef, Gateway, GatewayEvent, MessageEvent, RawMessage, TypingGuard, typing_scope,
};
pub use discord::DiscordGateway;
pub use mock::MockGateway;
