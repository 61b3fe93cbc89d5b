//! Incremental accumulation of the Anthropic SSE event stream.
//!
//! Events arrive in the strict order the transport defines. The accumulator
//! folds them into a single response value, keyed by the content index each
//! event names, and forwards text deltas to an optional live-output sink as
//! they arrive.

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;

use super::base::Usage;

/// One typed event from the stream, as carried in an SSE `data:` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart {
        #[serde(default)]
        message: Option<StartedMessage>,
    },
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<UsageCounts>,
    },
    MessageStop,
    Ping,
    /// Event types this adapter does not recognize are ignored, never fatal.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartedMessage {
    #[serde(default)]
    pub usage: Option<UsageCounts>,
}

/// The opening snapshot of a content block. Kept loosely typed so a block
/// type this adapter does not recognize still parses and can be skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockStart {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    /// Delta kinds this adapter does not recognize are ignored.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UsageCounts {
    #[serde(default)]
    pub input_tokens: Option<i32>,
    #[serde(default)]
    pub output_tokens: Option<i32>,
}

/// One fully accumulated content block.
#[derive(Debug, Clone, PartialEq)]
pub enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    /// Tool input stays raw until finalization; the response converter
    /// re-parses it into structured data.
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
}

/// The complete response assembled from one event stream.
#[derive(Debug, Clone, Default)]
pub struct AnthropicResponse {
    pub content: Vec<AnthropicResponseBlock>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    Active,
    Finalized,
}

/// In-progress state for one content index.
#[derive(Debug)]
enum Slot {
    Text {
        text: String,
        closed: bool,
    },
    ToolUse {
        id: String,
        name: String,
        input_json: String,
        closed: bool,
    },
    /// Reserved for a block type this adapter does not recognize, so later
    /// events naming the index are dropped without disturbing neighbors.
    Unsupported,
}

/// Folds an ordered event sequence into one [`AnthropicResponse`].
///
/// Accumulation never fails: events that cannot be placed are dropped and the
/// fold continues. Deltas attach to the block at the index the event names,
/// never by arrival order.
pub struct StreamAccumulator {
    state: StreamState,
    slots: BTreeMap<usize, Slot>,
    input_tokens: Option<i32>,
    output_tokens: Option<i32>,
    sink: Option<UnboundedSender<String>>,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            slots: BTreeMap::new(),
            input_tokens: None,
            output_tokens: None,
            sink: None,
        }
    }

    /// Forward each text delta to `sink` as it is accumulated.
    ///
    /// Delivery is fire and forget: a dropped receiver never stalls the fold.
    pub fn with_sink(mut self, sink: UnboundedSender<String>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.state == StreamState::Finalized
    }

    /// Fold one event into the response under construction.
    pub fn accumulate(&mut self, event: AnthropicStreamEvent) {
        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if self.state == StreamState::Idle {
                    self.state = StreamState::Active;
                }
                if let Some(usage) = message.and_then(|m| m.usage) {
                    self.record_usage(usage);
                }
            }
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if self.state != StreamState::Active {
                    tracing::debug!(index, "dropping content_block_start outside active stream");
                    return;
                }
                self.slots.insert(index, Slot::open(content_block, index));
            }
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
                if self.state != StreamState::Active {
                    return;
                }
                self.append_delta(index, delta);
            }
            AnthropicStreamEvent::ContentBlockStop { index } => {
                match self.slots.get_mut(&index) {
                    Some(Slot::Text { closed, .. }) | Some(Slot::ToolUse { closed, .. }) => {
                        *closed = true;
                    }
                    Some(Slot::Unsupported) => {}
                    None => tracing::debug!(index, "dropping content_block_stop for unopened index"),
                }
            }
            AnthropicStreamEvent::MessageDelta { usage } => {
                if let Some(usage) = usage {
                    self.record_usage(usage);
                }
            }
            AnthropicStreamEvent::MessageStop => {
                self.state = StreamState::Finalized;
            }
            AnthropicStreamEvent::Ping | AnthropicStreamEvent::Unknown => {}
        }
    }

    /// Freeze the fold into the complete response value.
    ///
    /// Also used for a stream that ends cleanly without a message_stop event.
    pub fn into_response(self) -> AnthropicResponse {
        let content = self
            .slots
            .into_values()
            .filter_map(|slot| match slot {
                Slot::Text { text, .. } => Some(AnthropicResponseBlock::Text { text }),
                Slot::ToolUse {
                    id,
                    name,
                    input_json,
                    ..
                } => Some(AnthropicResponseBlock::ToolUse {
                    id,
                    name,
                    input_json,
                }),
                Slot::Unsupported => None,
            })
            .collect();

        AnthropicResponse {
            content,
            usage: Usage::new(self.input_tokens, self.output_tokens, None),
        }
    }

    fn append_delta(&mut self, index: usize, delta: BlockDelta) {
        match (self.slots.get_mut(&index), delta) {
            (
                Some(Slot::Text {
                    text,
                    closed: false,
                }),
                BlockDelta::TextDelta { text: fragment },
            ) => {
                text.push_str(&fragment);
                if let Some(sink) = &self.sink {
                    // Fire and forget: a dropped receiver must not stall the fold
                    let _ = sink.send(fragment);
                }
            }
            (
                Some(Slot::ToolUse {
                    input_json,
                    closed: false,
                    ..
                }),
                BlockDelta::InputJsonDelta { partial_json },
            ) => {
                input_json.push_str(&partial_json);
            }
            (_, BlockDelta::Unknown) => {}
            _ => tracing::debug!(index, "dropping delta with no open block at its index"),
        }
    }

    fn record_usage(&mut self, usage: UsageCounts) {
        if usage.input_tokens.is_some() {
            self.input_tokens = usage.input_tokens;
        }
        if usage.output_tokens.is_some() {
            self.output_tokens = usage.output_tokens;
        }
    }
}

impl Slot {
    fn open(block: BlockStart, index: usize) -> Self {
        match block.block_type.as_str() {
            "text" => Slot::Text {
                text: block.text.unwrap_or_default(),
                closed: false,
            },
            "tool_use" => Slot::ToolUse {
                id: block.id.unwrap_or_default(),
                name: block.name.unwrap_or_default(),
                input_json: String::new(),
                closed: false,
            },
            other => {
                tracing::debug!(block_type = other, index, "ignoring unsupported content block");
                Slot::Unsupported
            }
        }
    }
}
