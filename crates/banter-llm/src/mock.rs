//! Mock generation client for deterministic testing.
//!
//! Returns pre-configured replies without making any HTTP calls.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::client::{GenerationClient, GenerationRequest};
use banter_core::{BanterError, Result};

/// A pre-configured reply from the mock client.
#[derive(Clone)]
pub struct MockReply {
    pub text: String,
    /// If set, the client returns this error instead.
    pub error: Option<String>,
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            error: None,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            text: String::new(),
            error: Some(msg.to_string()),
        }
    }
}

/// A mock generation client that returns queued replies in order.
pub struct MockClient {
    replies: Arc<Mutex<Vec<MockReply>>>,
    /// All requests received, for assertions in tests.
    pub requests: Arc<Mutex<Vec<GenerationRequest>>>,
    name: String,
}

impl MockClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(vec![])),
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a text reply.
    pub fn with_reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push(MockReply::text(text));
        self
    }

    /// Queue an error reply.
    pub fn with_error(self, error: &str) -> Self {
        self.replies.lock().unwrap().push(MockReply::error(error));
        self
    }

    /// Get all requests that were made to this client.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<GenerationRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Number of generation calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self) -> MockReply {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            MockReply::text("(mock: no more queued replies)")
        } else {
            replies.remove(0)
        }
    }
}

#[async_trait]
impl GenerationClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.next_reply();

        if let Some(error) = reply.error {
            return Err(BanterError::Generation(error));
        }
        if reply.text.trim().is_empty() {
            return Err(BanterError::EmptyGeneration);
        }
        Ok(reply.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(text: &str) -> GenerationRequest {
        let mut request = GenerationRequest::new();
        request.push_text(text);
        request
    }

    #[tokio::test]
    async fn test_mock_replies_in_order() {
        let client = MockClient::new("mock").with_reply("first").with_reply("second");
        assert_eq!(client.generate(&make_request("a")).await.unwrap(), "first");
        assert_eq!(client.generate(&make_request("b")).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_mock_error() {
        let client = MockClient::new("mock").with_error("HTTP 429: quota");
        assert!(client.generate(&make_request("a")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_empty_reply_is_error() {
        let client = MockClient::new("mock").with_reply("   ");
        assert!(matches!(
            client.generate(&make_request("a")).await,
            Err(BanterError::EmptyGeneration)
        ));
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let client = MockClient::new("mock").with_reply("ok");
        let _ = client.generate(&make_request("hello")).await;
        let recorded = client.recorded_requests();
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].text_content().contains("hello"));
    }
}
