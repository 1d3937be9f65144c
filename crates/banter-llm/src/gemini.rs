use async_trait::async_trait;
use banter_core::{BanterError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::client::*;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider. One `generateContent` call per request, with the
/// fixed sampling config and the workspace-wide safety policy.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    sampling: SamplingConfig,
    safety: SafetyPolicy,
}

impl GeminiClient {
    /// `timeout` is the caller-imposed bound on the whole HTTP exchange;
    /// expiry surfaces as a generation error like any other failure. Zero
    /// disables the bound.
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let mut builder = Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_default();
        Self {
            client,
            api_key,
            base_url: GEMINI_API_BASE.into(),
            model,
            sampling: SamplingConfig::default(),
            safety: SafetyPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn with_safety_policy(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }

    fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let parts: Vec<serde_json::Value> = request
            .segments
            .iter()
            .map(|segment| match segment {
                PromptSegment::Text(text) => serde_json::json!({ "text": text }),
                PromptSegment::Image { data, media_type } => serde_json::json!({
                    "inline_data": {
                        "mime_type": media_type,
                        "data": data,
                    }
                }),
            })
            .collect();

        let safety_settings: Vec<serde_json::Value> = self
            .safety
            .settings()
            .into_iter()
            .map(|(category, threshold)| {
                serde_json::json!({ "category": category, "threshold": threshold })
            })
            .collect();

        serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.sampling.temperature,
                "topP": self.sampling.top_p,
                "topK": self.sampling.top_k,
                "maxOutputTokens": self.sampling.max_output_tokens,
            },
            "safetySettings": safety_settings,
        })
    }

    fn extract_text(data: &serde_json::Value) -> Result<String> {
        if let Some(reason) = data["promptFeedback"]["blockReason"].as_str() {
            return Err(BanterError::Generation(format!(
                "prompt blocked: {reason}"
            )));
        }

        let text = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BanterError::EmptyGeneration);
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_request_body(request);
        debug!(
            model = %self.model,
            segments = request.segments.len(),
            images = request.image_count(),
            "sending Gemini API request"
        );

        let resp = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BanterError::Generation(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BanterError::Generation(format!("HTTP {status}: {text}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BanterError::Generation(e.to_string()))?;

        Self::extract_text(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(
            "test-key".into(),
            "gemini-2.0-flash-lite".into(),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn body_carries_fixed_sampling_config() {
        let mut request = GenerationRequest::new();
        request.push_text("hello");
        let body = client().build_request_body(&request);

        assert_eq!(body["generationConfig"]["temperature"], 0.7);
        assert_eq!(body["generationConfig"]["topP"], 0.95);
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn body_sets_block_none_for_all_categories() {
        let mut request = GenerationRequest::new();
        request.push_text("hello");
        let body = client().build_request_body(&request);

        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), 4);
        for setting in settings {
            assert_eq!(setting["threshold"], "BLOCK_NONE");
        }
    }

    #[test]
    fn body_preserves_segment_order() {
        let mut request = GenerationRequest::new();
        request.push_text("persona");
        request.push_text("context");
        request.push_image("aW1n", "image/jpeg");
        let body = client().build_request_body(&request);

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["text"], "persona");
        assert_eq!(parts[1]["text"], "context");
        assert_eq!(parts[2]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[2]["inline_data"]["data"], "aW1n");
    }

    #[test]
    fn extract_text_joins_candidate_parts() {
        let data = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "there" }] }
            }]
        });
        assert_eq!(GeminiClient::extract_text(&data).unwrap(), "Hello there");
    }

    #[test]
    fn extract_text_maps_empty_to_error() {
        let data = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "   " }] } }]
        });
        assert!(matches!(
            GeminiClient::extract_text(&data),
            Err(BanterError::EmptyGeneration)
        ));
    }

    #[test]
    fn extract_text_surfaces_prompt_block() {
        let data = serde_json::json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        });
        let err = GeminiClient::extract_text(&data).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
