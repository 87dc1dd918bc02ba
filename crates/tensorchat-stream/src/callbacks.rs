use tensorchat_core::{
    CompleteInfo, SearchUpdate, StartInfo, TensorChunk, TensorCompletion, TensorFailure,
    TensorProgress, TensorchatError,
};

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// Caller-supplied handlers for one `stream_process` call.
///
/// Every handler is optional. Handlers run on the task that drives the
/// session, in stream order. With coalescing enabled `on_tensor_chunk` is
/// delayed and batched, but the chunks it receives still concatenate to the
/// tensor's full content.
///
/// ```
/// use tensorchat_stream::StreamCallbacks;
///
/// let callbacks = StreamCallbacks::new()
///     .on_tensor_chunk(|c| print!("{}", c.chunk))
///     .on_tensor_complete(|t| println!("\n[{}] done, {} chars", t.index, t.content.len()))
///     .on_error(|e| eprintln!("stream failed: {e}"));
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct StreamCallbacks {
    start: Option<Callback<StartInfo>>,
    progress: Option<Callback<TensorProgress>>,
    search_progress: Option<Callback<SearchUpdate>>,
    search_complete: Option<Callback<SearchUpdate>>,
    tensor_chunk: Option<Callback<TensorChunk>>,
    tensor_complete: Option<Callback<TensorCompletion>>,
    tensor_error: Option<Callback<TensorFailure>>,
    complete: Option<Callback<CompleteInfo>>,
    error: Option<Callback<TensorchatError>>,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, f: impl FnMut(&StartInfo) + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl FnMut(&TensorProgress) + Send + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_search_progress(mut self, f: impl FnMut(&SearchUpdate) + Send + 'static) -> Self {
        self.search_progress = Some(Box::new(f));
        self
    }

    pub fn on_search_complete(mut self, f: impl FnMut(&SearchUpdate) + Send + 'static) -> Self {
        self.search_complete = Some(Box::new(f));
        self
    }

    /// Receives the fragment text that arrived since the previous chunk
    /// callback for the same tensor: one `tensor_chunk` fragment, or several
    /// joined when coalescing batched them.
    pub fn on_tensor_chunk(mut self, f: impl FnMut(&TensorChunk) + Send + 'static) -> Self {
        self.tensor_chunk = Some(Box::new(f));
        self
    }

    /// Fires exactly once per completed tensor, after every chunk callback
    /// for that tensor.
    pub fn on_tensor_complete(
        mut self,
        f: impl FnMut(&TensorCompletion) + Send + 'static,
    ) -> Self {
        self.tensor_complete = Some(Box::new(f));
        self
    }

    pub fn on_tensor_error(mut self, f: impl FnMut(&TensorFailure) + Send + 'static) -> Self {
        self.tensor_error = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut(&CompleteInfo) + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    /// Fires at most once per session, for transport and stream-level failures.
    pub fn on_error(mut self, f: impl FnMut(&TensorchatError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub(crate) fn start(&mut self, info: &StartInfo) {
        if let Some(f) = self.start.as_mut() {
            f(info);
        }
    }

    pub(crate) fn progress(&mut self, progress: &TensorProgress) {
        if let Some(f) = self.progress.as_mut() {
            f(progress);
        }
    }

    pub(crate) fn search_progress(&mut self, update: &SearchUpdate) {
        if let Some(f) = self.search_progress.as_mut() {
            f(update);
        }
    }

    pub(crate) fn search_complete(&mut self, update: &SearchUpdate) {
        if let Some(f) = self.search_complete.as_mut() {
            f(update);
        }
    }

    pub(crate) fn tensor_chunk(&mut self, chunk: &TensorChunk) {
        if let Some(f) = self.tensor_chunk.as_mut() {
            f(chunk);
        }
    }

    pub(crate) fn tensor_complete(&mut self, completion: &TensorCompletion) {
        if let Some(f) = self.tensor_complete.as_mut() {
            f(completion);
        }
    }

    pub(crate) fn tensor_error(&mut self, failure: &TensorFailure) {
        if let Some(f) = self.tensor_error.as_mut() {
            f(failure);
        }
    }

    pub(crate) fn complete(&mut self, info: &CompleteInfo) {
        if let Some(f) = self.complete.as_mut() {
            f(info);
        }
    }

    pub(crate) fn error(&mut self, error: &TensorchatError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    pub(crate) fn wants_chunks(&self) -> bool {
        self.tensor_chunk.is_some()
    }
}

impl std::fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_start", &self.start.is_some())
            .field("on_progress", &self.progress.is_some())
            .field("on_search_progress", &self.search_progress.is_some())
            .field("on_search_complete", &self.search_complete.is_some())
            .field("on_tensor_chunk", &self.tensor_chunk.is_some())
            .field("on_tensor_complete", &self.tensor_complete.is_some())
            .field("on_tensor_error", &self.tensor_error.is_some())
            .field("on_complete", &self.complete.is_some())
            .field("on_error", &self.error.is_some())
            .finish()
    }
}
