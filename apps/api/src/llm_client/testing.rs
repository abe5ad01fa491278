//! Scripted `ModelBackend` for tests.
//!
//! Responses are queued per agent label. When a label's queue is down to its
//! last response, that response repeats for every further call. Labels with no
//! script answer with an empty message.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ChatRequest, ChunkStream, LlmError, ModelBackend, StreamChunk};

#[derive(Debug, Clone)]
pub enum Script {
    Chunks(Vec<StreamChunk>),
    Fail { status: u16, message: String },
    /// Never yields; exercises call timeouts.
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub label: &'static str,
    pub prompt: String,
}

#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<&'static str, VecDeque<Script>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, label: &'static str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(label)
            .or_default()
            .push_back(script);
        self
    }

    pub fn text(self, label: &'static str, text: &str) -> Self {
        self.script(label, Script::Chunks(vec![StreamChunk::Text(text.to_string())]))
    }

    pub fn tool(self, label: &'static str, input: Value) -> Self {
        self.script(
            label,
            Script::Chunks(vec![StreamChunk::ToolOutput {
                name: label.to_string(),
                input,
            }]),
        )
    }

    pub fn fail(self, label: &'static str, status: u16, message: &str) -> Self {
        self.script(
            label,
            Script::Fail {
                status,
                message: message.to_string(),
            },
        )
    }

    pub fn hang(self, label: &'static str) -> Self {
        self.script(label, Script::Hang)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, label: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.label == label)
            .count()
    }

    pub fn prompts_for(&self, label: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.label == label)
            .map(|c| c.prompt.clone())
            .collect()
    }

    fn next_script(&self, label: &'static str) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(label) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Script::Chunks(vec![]),
        }
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            label: request.label,
            prompt: request.prompt.clone(),
        });

        match self.next_script(request.label) {
            Script::Chunks(chunks) => Ok(Box::pin(futures::stream::iter(
                chunks.into_iter().map(Ok::<StreamChunk, LlmError>),
            ))),
            Script::Fail { status, message } => Err(LlmError::Api { status, message }),
            Script::Hang => Ok(Box::pin(futures::stream::pending::<
                Result<StreamChunk, LlmError>,
            >())),
        }
    }
}
