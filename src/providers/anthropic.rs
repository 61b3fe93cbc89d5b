use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::base::{Provider, Usage};
use super::configs::AnthropicProviderConfig;
use super::streaming::{AnthropicResponse, AnthropicStreamEvent, StreamAccumulator};
use super::utils::{
    anthropic_response_to_message, messages_to_anthropic_spec, tools_to_anthropic_spec,
};
use crate::errors::CompletionError;
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
    /// Built once; shared read-only by every call.
    cache_control: Value,
    text_sink: Option<UnboundedSender<String>>,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self {
            client,
            config,
            cache_control: json!({"type": "ephemeral"}),
            text_sink: None,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(AnthropicProviderConfig::from_env()?)
    }

    /// Deliver streamed text fragments to `sink` as they arrive, for live
    /// rendering alongside the final message.
    ///
    /// Delivery is best effort: a slow or dropped receiver never stalls the
    /// completion call.
    pub fn with_text_sink(mut self, sink: UnboundedSender<String>) -> Self {
        self.text_sink = Some(sink);
        self
    }

    fn build_payload(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<Value, CompletionError> {
        let mut payload = json!({
            "model": self.config.model.resolve(),
            "max_tokens": self.config.max_tokens,
            "messages": messages_to_anthropic_spec(messages),
            "system": [{
                "type": "text",
                "text": system,
                "cache_control": self.cache_control,
            }],
            "stream": true,
        });

        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools_to_anthropic_spec(tools)?);
        }
        if let Some(temperature) = self.config.temperature {
            payload["temperature"] = json!(temperature);
        }

        Ok(payload)
    }

    async fn open_stream(&self, payload: &Value) -> Result<reqwest::Response, CompletionError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| CompletionError::transport(format!("request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::transport_with_response(
                format!("completion request returned {status}"),
                status.as_u16(),
                body,
            ));
        }

        Ok(response)
    }

    async fn drive_stream<S, E>(
        &self,
        events: S,
        cancel: &CancellationToken,
    ) -> Result<AnthropicResponse, CompletionError>
    where
        S: Stream<Item = Result<Event, EventStreamError<E>>> + Send,
        E: std::fmt::Display,
    {
        let mut accumulator = StreamAccumulator::new();
        if let Some(sink) = &self.text_sink {
            accumulator = accumulator.with_sink(sink.clone());
        }

        let mut events = Box::pin(events);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(CompletionError::cancelled()),
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    match serde_json::from_str::<AnthropicStreamEvent>(&event.data) {
                        Ok(parsed) => accumulator.accumulate(parsed),
                        // Wire formats evolve; one undecodable event must not
                        // abort an otherwise clean stream.
                        Err(e) => tracing::debug!(error = %e, "skipping undecodable stream event"),
                    }
                    if accumulator.is_finalized() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    return Err(CompletionError::transport(format!("stream terminated: {e}")));
                }
                None => break,
            }
        }

        Ok(accumulator.into_response())
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    #[tracing::instrument(level = "info", skip_all)]
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        cancel: CancellationToken,
    ) -> Result<(Message, Usage), CompletionError> {
        let payload = self.build_payload(system, messages, tools)?;

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(CompletionError::cancelled()),
            response = self.open_stream(&payload) => response?,
        };

        let accumulated = self
            .drive_stream(response.bytes_stream().eventsource(), &cancel)
            .await?;

        let usage = accumulated.usage.clone();
        let message = anthropic_response_to_message(accumulated)?;

        Ok((message, usage))
    }
}
