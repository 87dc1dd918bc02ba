//! Wire events of a `/streamProcess` response.
//!
//! Every `data:` frame carries one JSON object whose `type` field selects a
//! [`StreamEvent`] variant. Field names are camelCase on the wire; the
//! snake_case spellings are accepted as aliases.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Zero-based position of a tensor in the request's `tensors` list.
pub type TensorIndex = u32;

/// One decoded event of the multiplexed stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The server accepted the request and is about to run the tensors.
    Start(StartInfo),
    /// A tensor started processing.
    Progress(TensorProgress),
    /// A tensor's search step reported progress.
    SearchProgress(SearchUpdate),
    /// A tensor's search step finished.
    SearchComplete(SearchUpdate),
    /// A content fragment for one tensor.
    TensorChunk(TensorChunk),
    /// A tensor finished; no more fragments follow for it.
    TensorComplete(TensorResult),
    /// A tensor failed. Other tensors keep running.
    TensorError(TensorFailure),
    /// Every tensor finished. Terminal.
    Complete(CompleteInfo),
    /// The stream failed. Terminal.
    Error(StreamFailure),
    /// The stream failed unrecoverably. Terminal.
    FatalError(StreamFailure),
    /// An event type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// The `type` tag as it appears on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Start(_) => "start",
            StreamEvent::Progress(_) => "progress",
            StreamEvent::SearchProgress(_) => "search_progress",
            StreamEvent::SearchComplete(_) => "search_complete",
            StreamEvent::TensorChunk(_) => "tensor_chunk",
            StreamEvent::TensorComplete(_) => "tensor_complete",
            StreamEvent::TensorError(_) => "tensor_error",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error(_) => "error",
            StreamEvent::FatalError(_) => "fatal_error",
            StreamEvent::Unknown => "unknown",
        }
    }

    /// The tensor a per-job event refers to.
    pub fn index(&self) -> Option<TensorIndex> {
        match self {
            StreamEvent::Progress(e) => Some(e.index),
            StreamEvent::SearchProgress(e) | StreamEvent::SearchComplete(e) => Some(e.index),
            StreamEvent::TensorChunk(e) => Some(e.index),
            StreamEvent::TensorComplete(e) => Some(e.index),
            StreamEvent::TensorError(e) => Some(e.index),
            StreamEvent::Start(_)
            | StreamEvent::Complete(_)
            | StreamEvent::Error(_)
            | StreamEvent::FatalError(_)
            | StreamEvent::Unknown => None,
        }
    }

    /// Whether receiving this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Complete(_) | StreamEvent::Error(_) | StreamEvent::FatalError(_)
        )
    }
}

// --- Payloads ---

/// Payload of a `start` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInfo {
    /// Number of tensors the server will run.
    #[serde(default, alias = "total_tensors")]
    pub total_tensors: Option<u32>,
    /// Model identifier the server resolved.
    #[serde(default)]
    pub model: Option<String>,
    /// Whether any tensor will run a search step.
    #[serde(default, alias = "search_applied")]
    pub search_applied: Option<bool>,
}

/// Payload of a `progress` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorProgress {
    /// Tensor index.
    pub index: TensorIndex,
    /// Any other fields the server attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `search_progress` and `search_complete` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchUpdate {
    /// Tensor index.
    pub index: TensorIndex,
    /// Search details, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `tensor_chunk` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorChunk {
    /// Tensor index.
    pub index: TensorIndex,
    /// Raw content fragment.
    #[serde(default)]
    pub chunk: String,
}

/// Payload of a `tensor_complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorResult {
    /// Tensor index.
    pub index: TensorIndex,
    /// Result metadata; opaque to the client.
    #[serde(default)]
    pub result: Option<Value>,
}

/// Payload of a `tensor_error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorFailure {
    /// Tensor index.
    pub index: TensorIndex,
    /// Error message.
    #[serde(default)]
    pub error: Option<String>,
    /// Extra error details.
    #[serde(default)]
    pub details: Option<Value>,
}

/// Payload of a `complete` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteInfo {
    /// Number of tensors that were run.
    #[serde(default, alias = "total_tensors")]
    pub total_tensors: Option<u32>,
}

/// Payload of `error` and `fatal_error` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFailure {
    /// Error message.
    #[serde(default)]
    pub error: Option<String>,
    /// Error details; a string or a structured value.
    #[serde(default)]
    pub details: Option<Value>,
}

impl StreamFailure {
    /// Human-readable message: `error`, then `details`, then a generic fallback.
    pub fn message(&self) -> String {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return error.to_string();
        }
        match &self.details {
            Some(Value::String(details)) if !details.is_empty() => details.clone(),
            Some(Value::Null) | None => "Unknown stream error".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

// --- Aggregates ---

/// The enriched record delivered once per completed tensor.
///
/// `content` is the authoritative final text; chunk callbacks are only a
/// live preview of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorCompletion {
    /// Tensor index.
    pub index: TensorIndex,
    /// Result metadata from the `tensor_complete` event.
    pub result: Option<Value>,
    /// Every fragment received for this tensor, in arrival order.
    pub chunks: Vec<String>,
    /// All fragments joined.
    pub content: String,
}
