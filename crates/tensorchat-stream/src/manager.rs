use crate::callbacks::StreamCallbacks;
use crate::client::{ProcessOutput, TensorchatStreaming};
use crate::config::TensorchatConfig;
use crate::session::SessionOutcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tensorchat_core::{StreamRequest, TensorchatResult};
use tracing::debug;

/// Cloneable handle around one [`TensorchatStreaming`] client.
///
/// Clones share the client, so calls made through any clone are serialized
/// and [`destroy`](Self::destroy) reaches whichever call is running.
#[derive(Clone, Debug)]
pub struct TensorchatStreamingManager {
    client: Arc<TensorchatStreaming>,
    active: Arc<AtomicUsize>,
}

/// Creates a manager backed by an HTTP client.
pub fn create_streaming_manager(config: TensorchatConfig) -> TensorchatResult<TensorchatStreamingManager> {
    Ok(TensorchatStreamingManager::new(TensorchatStreaming::new(config)?))
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TensorchatStreamingManager {
    pub fn new(client: TensorchatStreaming) -> Self {
        Self {
            client: Arc::new(client),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The shared client behind every clone.
    pub fn client(&self) -> &TensorchatStreaming {
        &self.client
    }

    /// Calls in progress or waiting for the client, across all clones.
    pub fn active_calls(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.active_calls() > 0
    }

    pub async fn stream_process(
        &self,
        request: &StreamRequest,
        callbacks: StreamCallbacks,
    ) -> TensorchatResult<SessionOutcome> {
        let _active = ActiveGuard::enter(&self.active);
        self.client.stream_process(request, callbacks).await
    }

    pub async fn process_single(&self, request: &StreamRequest) -> TensorchatResult<ProcessOutput> {
        let _active = ActiveGuard::enter(&self.active);
        self.client.process_single(request).await
    }

    /// Tears down the running session's timers and buffers. Safe to call
    /// any number of times.
    pub fn destroy(&self) {
        if self.client().config().verbose {
            debug!(active = self.active_calls(), "streaming manager destroy");
        }
        self.client.destroy();
    }
}
