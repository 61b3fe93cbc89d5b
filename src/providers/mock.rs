use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::CompletionError;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
        _cancel: CancellationToken,
    ) -> Result<(Message, Usage), CompletionError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            Ok((responses.remove(0), Usage::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_returns_scripted_responses() {
        let provider: Box<dyn Provider> = Box::new(MockProvider::new(vec![
            Message::assistant().with_text("first"),
            Message::assistant().with_text("second"),
        ]));

        let messages = vec![Message::user().with_text("hi")];
        let (first, _) = provider
            .complete("system", &messages, &[], CancellationToken::new())
            .await
            .unwrap();
        let (second, _) = provider
            .complete("system", &messages, &[], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(first.content[0].as_text(), Some("first"));
        assert_eq!(second.content[0].as_text(), Some("second"));
    }
}
