use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::CompletionError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::Tool;

use super::streaming::{AnthropicResponse, AnthropicResponseBlock};

/// The vendor's own representation of a tool input schema.
///
/// Re-encoding a tool's schema through this type is what validates that it is
/// serializable in the shape the API accepts; anything that is not an object
/// fails the conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicInputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

/// Convert canonical messages to the Anthropic message specification.
///
/// Block order is preserved. A tool result whose content is not plain text has
/// no wire representation here and is omitted rather than failing the call;
/// messages left without content are dropped with it.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let mut blocks = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    blocks.push(json!({
                        "type": "text",
                        "text": text.text,
                    }));
                }
                MessageContent::ToolUse(tool_use) => {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": tool_use.id,
                        "name": tool_use.name,
                        "input": tool_use.input,
                    }));
                }
                MessageContent::ToolResult(result) => match result.content.as_str() {
                    Some(content) => {
                        blocks.push(json!({
                            "type": "tool_result",
                            "tool_use_id": result.tool_use_id,
                            "content": content,
                            "is_error": result.is_error,
                        }));
                    }
                    None => {
                        tracing::debug!(
                            tool_use_id = %result.tool_use_id,
                            "skipping tool result with non-text content"
                        );
                    }
                },
            }
        }

        if blocks.is_empty() {
            continue;
        }

        messages_spec.push(json!({
            "role": role,
            "content": blocks,
        }));
    }

    messages_spec
}

/// Convert tool definitions to the Anthropic tool specification.
///
/// Fails before any network I/O when a schema cannot be re-encoded into the
/// vendor shape.
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>, CompletionError> {
    let mut result = Vec::new();

    for tool in tools {
        let schema: AnthropicInputSchema = serde_json::from_value(tool.input_schema.clone())
            .map_err(|source| CompletionError::SchemaConversion {
                tool: tool.name.clone(),
                source,
            })?;

        result.push(json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": schema,
        }));
    }

    Ok(result)
}

/// Convert the accumulated Anthropic response to a canonical assistant message.
///
/// Tool input arrives as raw JSON text accumulated from the stream; it must be
/// valid structured data by the time the response is finalized.
pub fn anthropic_response_to_message(
    response: AnthropicResponse,
) -> Result<Message, CompletionError> {
    let mut message = Message::assistant();

    for block in response.content {
        match block {
            AnthropicResponseBlock::Text { text } => {
                message = message.with_text(text);
            }
            AnthropicResponseBlock::ToolUse {
                id,
                name,
                input_json,
            } => {
                let input = decode_tool_input(&input_json).map_err(|source| {
                    CompletionError::ToolInputDecode {
                        id: id.clone(),
                        name: name.clone(),
                        source,
                    }
                })?;
                message = message.with_tool_use(id, name, input);
            }
        }
    }

    Ok(message)
}

/// A tool use that streamed no input fragments carries the wire's empty input
/// object; anything else must parse as JSON.
fn decode_tool_input(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_messages_to_anthropic_spec() -> Result<()> {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_anthropic_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], json!([{"type": "text", "text": "Hello"}]));
        Ok(())
    }

    #[test]
    fn test_messages_to_anthropic_spec_complex() -> Result<()> {
        let messages = vec![
            Message::user().with_text("What's the weather in Berlin?"),
            Message::assistant()
                .with_text("Let me check.")
                .with_tool_use("toolu_1", "get_weather", json!({"location": "Berlin"})),
            Message::user().with_tool_result("toolu_1", json!("Sunny, 21C"), false),
        ];

        let spec = messages_to_anthropic_spec(&messages);

        assert_eq!(spec.len(), 3);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(
            spec[1]["content"],
            json!([
                {"type": "text", "text": "Let me check."},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": "get_weather",
                    "input": {"location": "Berlin"},
                },
            ])
        );
        assert_eq!(
            spec[2]["content"],
            json!([{
                "type": "tool_result",
                "tool_use_id": "toolu_1",
                "content": "Sunny, 21C",
                "is_error": false,
            }])
        );

        Ok(())
    }

    #[test]
    fn test_non_text_tool_result_is_skipped() {
        let messages = vec![Message::user()
            .with_text("here you go")
            .with_tool_result("toolu_1", json!({"blob": [1, 2, 3]}), false)];

        let spec = messages_to_anthropic_spec(&messages);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["content"], json!([{"type": "text", "text": "here you go"}]));
    }

    #[test]
    fn test_message_left_empty_by_skips_is_dropped() {
        let messages = vec![
            Message::user().with_tool_result("toolu_1", json!({"not": "text"}), false),
            Message::user().with_text("still here"),
        ];

        let spec = messages_to_anthropic_spec(&messages);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["content"][0]["text"], "still here");
    }

    #[test]
    fn test_tools_to_anthropic_spec() -> Result<()> {
        let tool = Tool::new(
            "get_weather",
            "Get the weather for a location",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City name"
                    }
                },
                "required": ["location"]
            }),
        );

        let spec = tools_to_anthropic_spec(&[tool])?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["name"], "get_weather");
        assert_eq!(spec[0]["input_schema"]["type"], "object");
        assert_eq!(
            spec[0]["input_schema"]["properties"]["location"]["type"],
            "string"
        );
        assert_eq!(spec[0]["input_schema"]["required"], json!(["location"]));
        Ok(())
    }

    #[test]
    fn test_tools_to_anthropic_spec_preserves_extra_schema_keys() -> Result<()> {
        let tool = Tool::new(
            "search",
            "Search",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "additionalProperties": false
            }),
        );

        let spec = tools_to_anthropic_spec(&[tool])?;

        assert_eq!(spec[0]["input_schema"]["additionalProperties"], json!(false));
        Ok(())
    }

    #[test]
    fn test_tools_to_anthropic_spec_empty() -> Result<()> {
        let spec = tools_to_anthropic_spec(&[])?;
        assert!(spec.is_empty());
        Ok(())
    }

    #[test]
    fn test_tools_to_anthropic_spec_rejects_non_schema_input() {
        let tool = Tool::new("broken", "Bad schema", json!("not a schema"));

        let result = tools_to_anthropic_spec(&[tool]);

        match result {
            Err(CompletionError::SchemaConversion { tool, .. }) => assert_eq!(tool, "broken"),
            other => panic!("expected SchemaConversion error, got {other:?}"),
        }
    }

    #[test]
    fn test_response_to_message_text() -> Result<()> {
        let response = AnthropicResponse {
            content: vec![AnthropicResponseBlock::Text {
                text: "Hello there".to_string(),
            }],
            ..Default::default()
        };

        let message = anthropic_response_to_message(response)?;

        assert!(matches!(message.role, Role::Assistant));
        assert_eq!(message.content.len(), 1);
        assert_eq!(message.content[0].as_text(), Some("Hello there"));
        Ok(())
    }

    #[test]
    fn test_response_to_message_tool_use() -> Result<()> {
        let response = AnthropicResponse {
            content: vec![AnthropicResponseBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_weather".to_string(),
                input_json: "{\"location\": \"Berlin\"}".to_string(),
            }],
            ..Default::default()
        };

        let message = anthropic_response_to_message(response)?;

        let tool_use = message.content[0].as_tool_use().expect("tool use block");
        assert_eq!(tool_use.id, "toolu_1");
        assert_eq!(tool_use.name, "get_weather");
        assert_eq!(tool_use.input, json!({"location": "Berlin"}));
        Ok(())
    }

    #[test]
    fn test_response_to_message_empty_tool_input_decodes_as_object() -> Result<()> {
        let response = AnthropicResponse {
            content: vec![AnthropicResponseBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "list_files".to_string(),
                input_json: String::new(),
            }],
            ..Default::default()
        };

        let message = anthropic_response_to_message(response)?;

        let tool_use = message.content[0].as_tool_use().expect("tool use block");
        assert_eq!(tool_use.input, json!({}));
        Ok(())
    }

    #[test]
    fn test_response_to_message_invalid_tool_input_fails() {
        let response = AnthropicResponse {
            content: vec![AnthropicResponseBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_weather".to_string(),
                input_json: "{\"location\": ".to_string(),
            }],
            ..Default::default()
        };

        match anthropic_response_to_message(response) {
            Err(CompletionError::ToolInputDecode { id, name, .. }) => {
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "get_weather");
            }
            other => panic!("expected ToolInputDecode error, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_preserves_order_and_content() -> Result<()> {
        let original = Message::assistant()
            .with_text("Checking two things.")
            .with_tool_use("toolu_1", "get_weather", json!({"location": "Berlin"}))
            .with_tool_use("toolu_2", "get_time", json!({"zone": "CET"}));

        // Request direction
        let spec = messages_to_anthropic_spec(&[original.clone()]);
        let blocks = spec[0]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);

        // Response direction: the same blocks coming back in the
        // accumulator's output shape
        let response = AnthropicResponse {
            content: blocks
                .iter()
                .map(|block| match block["type"].as_str().unwrap() {
                    "text" => AnthropicResponseBlock::Text {
                        text: block["text"].as_str().unwrap().to_string(),
                    },
                    "tool_use" => AnthropicResponseBlock::ToolUse {
                        id: block["id"].as_str().unwrap().to_string(),
                        name: block["name"].as_str().unwrap().to_string(),
                        input_json: block["input"].to_string(),
                    },
                    other => panic!("unexpected block type {other}"),
                })
                .collect(),
            ..Default::default()
        };
        let round_tripped = anthropic_response_to_message(response)?;

        assert_eq!(round_tripped.content, original.content);
        Ok(())
    }
}
