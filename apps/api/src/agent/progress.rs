//! Progress Channel: human-readable status events for the caller's UI.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

/// One progress event. Either field may be absent; consumers must cope with both,
/// one or neither being set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub done: bool,
}

impl ProgressChunk {
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Default::default()
        }
    }
}

type ProgressFn = dyn Fn(ProgressChunk) + Send + Sync;

/// Cloneable handle to the caller's progress callback. A default handle drops
/// every event.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<Arc<ProgressFn>>,
}

impl Progress {
    pub fn new(callback: impl Fn(ProgressChunk) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn noop() -> Self {
        Self::default()
    }

    /// A progress handle that forwards into an unbounded channel.
    /// Events sent after the receiver is dropped are discarded.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let progress = Self::new(move |chunk| {
            let _ = tx.send(chunk);
        });
        (progress, rx)
    }

    pub fn emit(&self, chunk: ProgressChunk) {
        if let Some(callback) = &self.callback {
            callback(chunk);
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(ProgressChunk::status(text));
    }

    pub fn reasoning(&self, text: impl Into<String>) {
        self.emit(ProgressChunk::reasoning(text));
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("attached", &self.callback.is_some())
            .finish()
    }
}
