//! # banter-llm
//!
//! Abstraction over the remote generative model. The engine hands a
//! [`GenerationRequest`] of ordered prompt segments to a [`GenerationClient`]
//! and gets back plain text or a typed error — one attempt, no retries.

pub mod client;
pub mod gemini;
pub mod mock;

pub use client::{GenerationClient, GenerationRequest, PromptSegment, SafetyPolicy, SamplingConfig};
pub use gemini::GeminiClient;
pub use mock::MockClient;
