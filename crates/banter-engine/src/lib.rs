//! # banter-engine
//!
//! The conversational engagement engine — the logic that decides, for every
//! inbound message and on a recurring timer, whether the persona should
//! speak, assembles the context it needs, invokes the generative model, and
//! dispatches the result.
//!
//! ## Architecture
//!
//! ```text
//!   MessageEvent ──▶ Engagement Gate ──▶ Context Builder ──▶ Generation
//!                        │                     ▲                Client
//!   Scheduler tick ──────┘ (proactive)         │                  │
//!                                        Persona Store            ▼
//!                                        (read-only)          dispatch
//! ```
//!
//! The two entry points are [`Engine::on_message`] and [`Engine::tick`];
//! both fan into the same context-builder/generation pipeline. The persona
//! text is write-once at startup and read-only thereafter, so concurrent
//! handlers share no mutable state beyond the seeded RNG stream.

pub mod context;
pub mod engine;
pub mod gate;
pub mod persona;
pub mod proactive;
pub mod scheduler;

pub use context::{HistoryEntry, PROACTIVE_INSTRUCTION, TaskKind};
pub use engine::{Engine, EngineSettings, FALLBACK_APOLOGY};
pub use gate::EngagementTrigger;
pub use scheduler::{PeriodicTask, Scheduler, SchedulerEvent, SchedulerHandle};
