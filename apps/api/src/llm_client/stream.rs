//! Streaming decoders: turn provider SSE events into `StreamChunk`s.
//!
//! Both decoders are pure state machines over `(event, data)` pairs so they can
//! be tested without a network. Tool-call arguments arrive as JSON fragments and
//! are reassembled here; a tool payload that fails to parse is surfaced as plain
//! text so the response validators treat it as malformed output, not as a
//! transport failure.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{LlmError, Provider, StreamChunk};

/// Provider-specific SSE decoder.
#[derive(Debug)]
pub enum StreamDecoder {
    Anthropic(AnthropicDecoder),
    OpenAi(OpenAiDecoder),
}

impl StreamDecoder {
    pub fn new(provider: Provider) -> Self {
        match provider {
            Provider::Anthropic => StreamDecoder::Anthropic(AnthropicDecoder::default()),
            Provider::OpenAi => StreamDecoder::OpenAi(OpenAiDecoder::default()),
        }
    }

    /// Consumes one SSE event. `event` is the SSE event name (may be empty).
    pub fn feed(&mut self, event: &str, data: &str) -> Result<Vec<StreamChunk>, LlmError> {
        match self {
            StreamDecoder::Anthropic(d) => d.feed(event, data),
            StreamDecoder::OpenAi(d) => d.feed(data),
        }
    }

    /// True once the provider signalled the end of the message.
    pub fn is_finished(&self) -> bool {
        match self {
            StreamDecoder::Anthropic(d) => d.finished,
            StreamDecoder::OpenAi(d) => d.finished,
        }
    }

    /// Flushes any tool call still being assembled when the stream ends.
    pub fn finish(&mut self) -> Vec<StreamChunk> {
        match self {
            StreamDecoder::Anthropic(d) => d.flush(),
            StreamDecoder::OpenAi(d) => d.flush(),
        }
    }
}

#[derive(Debug, Default)]
struct PendingTool {
    name: String,
    arguments: String,
    initial_input: Option<Value>,
}

impl PendingTool {
    fn into_chunk(self) -> StreamChunk {
        if self.arguments.trim().is_empty() {
            return StreamChunk::ToolOutput {
                name: self.name,
                input: self
                    .initial_input
                    .unwrap_or_else(|| Value::Object(Default::default())),
            };
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(input) => StreamChunk::ToolOutput {
                name: self.name,
                input,
            },
            Err(e) => {
                warn!(tool = %self.name, "tool arguments are not valid JSON: {e}");
                StreamChunk::Text(self.arguments)
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic Messages API
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    tools: BTreeMap<u64, PendingTool>,
    input_tokens: u32,
    finished: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: u64,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: u64,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u64,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<OutputUsage>,
    },
    MessageStop,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageStart {
    #[serde(default)]
    usage: Option<InputUsage>,
}

#[derive(Deserialize)]
struct InputUsage {
    #[serde(default)]
    input_tokens: u32,
}

#[derive(Deserialize)]
struct OutputUsage {
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        name: String,
        #[serde(default)]
        input: Option<Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    message: String,
}

impl AnthropicDecoder {
    fn feed(&mut self, event: &str, data: &str) -> Result<Vec<StreamChunk>, LlmError> {
        if data.trim().is_empty() || event == "ping" {
            return Ok(vec![]);
        }

        let parsed: AnthropicEvent = serde_json::from_str(data)?;
        let chunks = match parsed {
            AnthropicEvent::MessageStart { message } => {
                self.input_tokens = message.usage.map(|u| u.input_tokens).unwrap_or(0);
                vec![]
            }
            AnthropicEvent::ContentBlockStart {
                index,
                content_block: ContentBlock::ToolUse { name, input },
            } => {
                self.tools.insert(
                    index,
                    PendingTool {
                        name,
                        arguments: String::new(),
                        initial_input: input,
                    },
                );
                vec![]
            }
            AnthropicEvent::ContentBlockStart { .. } => vec![],
            AnthropicEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => vec![StreamChunk::Text(text)],
                BlockDelta::ThinkingDelta { thinking } => vec![StreamChunk::Reasoning(thinking)],
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(tool) = self.tools.get_mut(&index) {
                        tool.arguments.push_str(&partial_json);
                    }
                    vec![]
                }
                BlockDelta::Other => vec![],
            },
            AnthropicEvent::ContentBlockStop { index } => self
                .tools
                .remove(&index)
                .map(|tool| vec![tool.into_chunk()])
                .unwrap_or_default(),
            AnthropicEvent::MessageDelta { usage } => match usage {
                Some(usage) => vec![StreamChunk::Usage {
                    input_tokens: self.input_tokens,
                    output_tokens: usage.output_tokens,
                }],
                None => vec![],
            },
            AnthropicEvent::MessageStop => {
                self.finished = true;
                self.flush()
            }
            AnthropicEvent::Error { error } => {
                return Err(LlmError::Stream(format!("{}: {}", error.kind, error.message)));
            }
            AnthropicEvent::Other => vec![],
        };
        Ok(chunks)
    }

    fn flush(&mut self) -> Vec<StreamChunk> {
        std::mem::take(&mut self.tools)
            .into_values()
            .map(PendingTool::into_chunk)
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Chat Completions-compatible API
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct OpenAiDecoder {
    tools: BTreeMap<u64, PendingTool>,
    finished: bool,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Option<Vec<ChunkChoice>>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    error: Option<OpenAiErrorBody>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: u64,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

impl OpenAiDecoder {
    fn feed(&mut self, data: &str) -> Result<Vec<StreamChunk>, LlmError> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(vec![]);
        }
        if data == "[DONE]" {
            self.finished = true;
            return Ok(self.flush());
        }

        let parsed: ChatChunk = serde_json::from_str(data)?;
        if let Some(error) = parsed.error {
            return Err(LlmError::Stream(error.message));
        }

        let mut chunks = Vec::new();
        for choice in parsed.choices.unwrap_or_default() {
            let Some(delta) = choice.delta else {
                continue;
            };
            if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                chunks.push(StreamChunk::Reasoning(reasoning));
            }
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                chunks.push(StreamChunk::Text(content));
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let Some(function) = call.function else {
                    continue;
                };
                let tool = self.tools.entry(call.index).or_default();
                if let Some(name) = function.name {
                    tool.name = name;
                }
                if let Some(arguments) = function.arguments {
                    tool.arguments.push_str(&arguments);
                }
            }
        }
        if let Some(usage) = parsed.usage {
            chunks.push(StreamChunk::Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
        }
        Ok(chunks)
    }

    fn flush(&mut self) -> Vec<StreamChunk> {
        std::mem::take(&mut self.tools)
            .into_values()
            .map(PendingTool::into_chunk)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed_all(decoder: &mut StreamDecoder, events: &[(&str, &str)]) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        for (event, data) in events {
            chunks.extend(decoder.feed(event, data).unwrap());
        }
        chunks.extend(decoder.finish());
        chunks
    }

    #[test]
    fn test_anthropic_text_and_thinking_deltas() {
        let mut decoder = StreamDecoder::new(Provider::Anthropic);
        let chunks = feed_all(
            &mut decoder,
            &[
                ("message_start", r#"{"type":"message_start","message":{"id":"m","usage":{"input_tokens":12}}}"#),
                ("content_block_start", r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#),
                ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"Comparing roles"}}"#),
                ("content_block_start", r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#),
                ("content_block_delta", r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"APPROVED"}}"#),
                ("ping", r#"{"type":"ping"}"#),
                ("message_delta", r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#),
                ("message_stop", r#"{"type":"message_stop"}"#),
            ],
        );
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Reasoning("Comparing roles".to_string()),
                StreamChunk::Text("APPROVED".to_string()),
                StreamChunk::Usage {
                    input_tokens: 12,
                    output_tokens: 3
                },
            ]
        );
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_anthropic_tool_input_is_reassembled() {
        let mut decoder = StreamDecoder::new(Provider::Anthropic);
        let chunks = feed_all(
            &mut decoder,
            &[
                ("content_block_start", r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t1","name":"sort_achievements","input":{}}}"#),
                ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"achievementOrder\": [\"Sh"}}"#),
                ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"ipped v2\"]}"}}"#),
                ("content_block_stop", r#"{"type":"content_block_stop","index":0}"#),
            ],
        );
        assert_eq!(
            chunks,
            vec![StreamChunk::ToolOutput {
                name: "sort_achievements".to_string(),
                input: json!({"achievementOrder": ["Shipped v2"]}),
            }]
        );
    }

    #[test]
    fn test_anthropic_broken_tool_json_becomes_text() {
        let mut decoder = StreamDecoder::new(Provider::Anthropic);
        let chunks = feed_all(
            &mut decoder,
            &[
                ("content_block_start", r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","name":"t","input":{}}}"#),
                ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"a\": ["}}"#),
                ("content_block_stop", r#"{"type":"content_block_stop","index":0}"#),
            ],
        );
        assert_eq!(chunks, vec![StreamChunk::Text("{\"a\": [".to_string())]);
    }

    #[test]
    fn test_anthropic_error_event_is_stream_error() {
        let mut decoder = StreamDecoder::new(Provider::Anthropic);
        let err = decoder
            .feed(
                "error",
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            )
            .unwrap_err();
        assert!(matches!(err, LlmError::Stream(msg) if msg.contains("Overloaded")));
    }

    #[test]
    fn test_openai_content_and_tool_call_fragments() {
        let mut decoder = StreamDecoder::new(Provider::OpenAi);
        let chunks = feed_all(
            &mut decoder,
            &[
                ("", r#"{"choices":[{"delta":{"role":"assistant","content":null,"reasoning_content":"thinking"}}]}"#),
                ("", r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","type":"function","function":{"name":"sort_skills","arguments":""}}]}}]}"#),
                ("", r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"groupOrder\":[\"Frontend\"],"}}]}}]}"#),
                ("", r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"skillOrder\":{\"Frontend\":[\"React\"]}}"}}]},"finish_reason":"tool_calls"}]}"#),
                ("", r#"{"choices":[],"usage":{"prompt_tokens":40,"completion_tokens":9}}"#),
                ("", "[DONE]"),
            ],
        );
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Reasoning("thinking".to_string()),
                StreamChunk::Usage {
                    input_tokens: 40,
                    output_tokens: 9
                },
                StreamChunk::ToolOutput {
                    name: "sort_skills".to_string(),
                    input: json!({"groupOrder": ["Frontend"], "skillOrder": {"Frontend": ["React"]}}),
                },
            ]
        );
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_openai_tool_call_flushed_without_done_marker() {
        let mut decoder = StreamDecoder::new(Provider::OpenAi);
        decoder
            .feed(
                "",
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"t","arguments":"{}"}}]}}]}"#,
            )
            .unwrap();
        assert!(!decoder.is_finished());
        assert_eq!(
            decoder.finish(),
            vec![StreamChunk::ToolOutput {
                name: "t".to_string(),
                input: json!({}),
            }]
        );
    }

    #[test]
    fn test_openai_error_payload() {
        let mut decoder = StreamDecoder::new(Provider::OpenAi);
        let err = decoder
            .feed("", r#"{"error":{"message":"quota exceeded"}}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::Stream(msg) if msg == "quota exceeded"));
    }
}
