use async_trait::async_trait;
use banter_core::Result;

/// A single segment of a generation prompt, in order.
#[derive(Debug, Clone)]
pub enum PromptSegment {
    Text(String),
    Image {
        /// Base64-encoded image bytes.
        data: String,
        media_type: String,
    },
}

/// An ordered list of prompt segments passed atomically to the client.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub segments: Vec<PromptSegment>,
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text segment.
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.segments.push(PromptSegment::Text(text.into()));
    }

    /// Append a base64 image segment.
    pub fn push_image(&mut self, data: impl Into<String>, media_type: impl Into<String>) {
        self.segments.push(PromptSegment::Image {
            data: data.into(),
            media_type: media_type.into(),
        });
    }

    /// All text segments joined together, for logging and assertions.
    pub fn text_content(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PromptSegment::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of image segments.
    pub fn image_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PromptSegment::Image { .. }))
            .count()
    }
}

/// Fixed sampling parameters for every generation call. These are deliberate
/// constants of the persona's voice, not per-call knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

/// Content-safety posture, applied uniformly to every harm category.
///
/// The persona is in-character and occasionally edgy, so the default is the
/// most permissive threshold the API offers. This is the single switch for
/// safety behavior; nothing else in the workspace hardcodes per-category
/// logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyPolicy {
    #[default]
    Permissive,
    Standard,
}

impl SafetyPolicy {
    pub const HARM_CATEGORIES: [&'static str; 4] = [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ];

    /// The block threshold applied to every category.
    pub fn threshold(&self) -> &'static str {
        match self {
            SafetyPolicy::Permissive => "BLOCK_NONE",
            SafetyPolicy::Standard => "BLOCK_MEDIUM_AND_ABOVE",
        }
    }

    /// (category, threshold) pairs for the API's safetySettings list.
    pub fn settings(&self) -> Vec<(&'static str, &'static str)> {
        Self::HARM_CATEGORIES
            .iter()
            .map(|category| (*category, self.threshold()))
            .collect()
    }
}

/// Trait implemented by each generation backend (Gemini, mock, ...).
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Human-readable name, e.g. "gemini".
    fn name(&self) -> &str;

    /// One blocking-from-the-caller's-perspective remote invocation.
    /// Failures are returned as typed errors and are never retried here —
    /// a retry on top of a non-idempotent caller would duplicate a send.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
