use serde::{Deserialize, Serialize};

/// One tensor (job) inside a [`StreamRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorConfig {
    /// Prompt text for this tensor.
    pub messages: String,
    /// Ask the model for a short answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concise: Option<bool>,
    /// Per-tensor model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Run a web search before answering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<bool>,
}

impl TensorConfig {
    /// Creates a tensor with only the prompt set.
    pub fn new(messages: impl Into<String>) -> Self {
        Self {
            messages: messages.into(),
            concise: None,
            model: None,
            search: None,
        }
    }

    /// Sets the `concise` flag.
    pub fn concise(mut self, concise: bool) -> Self {
        self.concise = Some(concise);
        self
    }

    /// Overrides the model for this tensor only.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the `search` flag.
    pub fn search(mut self, search: bool) -> Self {
        self.search = Some(search);
        self
    }
}

/// Body of a `/streamProcess` call: a shared context plus one entry per tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// System-style context shared by every tensor.
    pub context: String,
    /// Default model identifier.
    pub model: String,
    /// The jobs to run. Index `i` in this list is job index `i` on the wire.
    pub tensors: Vec<TensorConfig>,
}

impl StreamRequest {
    /// Creates a request with no tensors.
    pub fn new(context: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            model: model.into(),
            tensors: Vec::new(),
        }
    }

    /// Appends a tensor.
    pub fn tensor(mut self, tensor: TensorConfig) -> Self {
        self.tensors.push(tensor);
        self
    }

    /// Appends several tensors.
    pub fn tensors(mut self, tensors: impl IntoIterator<Item = TensorConfig>) -> Self {
        self.tensors.extend(tensors);
        self
    }
}
