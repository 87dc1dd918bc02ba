use crate::callbacks::StreamCallbacks;
use crate::config::TensorchatConfig;
use crate::session::{SessionOutcome, StreamSession};
use crate::transport::{HttpTransport, StreamTransport};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tensorchat_core::{
    StreamRequest, TensorCompletion, TensorFailure, TensorIndex, TensorchatResult,
};
use tokio::sync::watch;
use tracing::{debug, info};

/// Everything a [`TensorchatStreaming::process_single`] call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// `totalTensors` from the `start` or `complete` event, if reported.
    pub total_tensors: Option<u32>,
    /// Model identifier from the `start` event, if reported.
    pub model: Option<String>,
    /// Completed tensors, ordered by index.
    pub tensors: Vec<TensorCompletion>,
    /// Per-tensor failures, ordered by index.
    pub errors: Vec<TensorFailure>,
}

impl ProcessOutput {
    /// The completed tensor at `index`, if it completed.
    pub fn tensor(&self, index: TensorIndex) -> Option<&TensorCompletion> {
        self.tensors.iter().find(|t| t.index == index)
    }
}

#[derive(Default)]
struct Collected {
    total_tensors: Option<u32>,
    model: Option<String>,
    tensors: BTreeMap<TensorIndex, TensorCompletion>,
    errors: BTreeMap<TensorIndex, TensorFailure>,
}

/// Client for the `/streamProcess` endpoint.
///
/// Each call runs in a fresh [`StreamSession`]. Calls on one client are
/// serialized: a second call waits until the first session closes.
pub struct TensorchatStreaming {
    config: TensorchatConfig,
    transport: Box<dyn StreamTransport>,
    calls: tokio::sync::Mutex<()>,
    teardown: watch::Sender<u64>,
}

impl TensorchatStreaming {
    /// Creates a client over HTTP. Fails if the config has no API key.
    pub fn new(config: TensorchatConfig) -> TensorchatResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    /// Creates a client from a pre-built transport.
    pub fn with_transport(config: TensorchatConfig, transport: Box<dyn StreamTransport>) -> Self {
        let (teardown, _) = watch::channel(0);
        Self {
            config,
            transport,
            calls: tokio::sync::Mutex::new(()),
            teardown,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &TensorchatConfig {
        &self.config
    }

    /// Streams `request`, delivering events to `callbacks`.
    ///
    /// Every failure (transport, read, `error` / `fatal_error` event) reaches
    /// `on_error` exactly once before it is returned here.
    pub async fn stream_process(
        &self,
        request: &StreamRequest,
        mut callbacks: StreamCallbacks,
    ) -> TensorchatResult<SessionOutcome> {
        let _call = self.calls.lock().await;
        let teardown = self.teardown.subscribe();
        let session = StreamSession::from_config(&self.config);
        if self.config.verbose {
            info!(
                session_id = %session.id(),
                tensors = request.tensors.len(),
                model = %request.model,
                "stream_process"
            );
        }

        let stream = match self.transport.open(request).await {
            Ok(stream) => stream,
            Err(e) => {
                callbacks.error(&e);
                return Err(e);
            }
        };
        session
            .run(stream, &mut callbacks, Some(teardown))
            .await
    }

    /// Runs `request` to completion and returns the collected results.
    pub async fn process_single(&self, request: &StreamRequest) -> TensorchatResult<ProcessOutput> {
        let collected = Arc::new(Mutex::new(Collected::default()));
        let (on_start, on_done, on_failed) = (collected.clone(), collected.clone(), collected.clone());
        let callbacks = StreamCallbacks::new()
            .on_start(move |info| {
                let mut c = on_start.lock();
                c.total_tensors = info.total_tensors;
                c.model = info.model.clone();
            })
            .on_tensor_complete(move |t| {
                on_done.lock().tensors.insert(t.index, t.clone());
            })
            .on_tensor_error(move |f| {
                on_failed.lock().errors.insert(f.index, f.clone());
            });

        let outcome = self.stream_process(request, callbacks).await?;

        let mut collected = std::mem::take(&mut *collected.lock());
        if let SessionOutcome::Completed {
            total_tensors: Some(total),
        } = outcome
        {
            collected.total_tensors = Some(total);
        }
        if self.config.verbose {
            debug!(
                completed = collected.tensors.len(),
                failed = collected.errors.len(),
                "process_single finished"
            );
        }
        Ok(ProcessOutput {
            total_tensors: collected.total_tensors,
            model: collected.model,
            tensors: collected.tensors.into_values().collect(),
            errors: collected.errors.into_values().collect(),
        })
    }

    /// Cancels pending chunk callbacks and releases tensor buffers of the
    /// running session, if any.
    ///
    /// Idempotent and infallible. It does not abort the network read; the
    /// client stays usable for later calls.
    pub fn destroy(&self) {
        self.teardown.send_modify(|generation| *generation = generation.wrapping_add(1));
        if self.config.verbose {
            debug!("client teardown requested");
        }
    }
}

impl std::fmt::Debug for TensorchatStreaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorchatStreaming")
            .field("base_url", &self.config.base_url())
            .field("throttle_ms", &self.config.throttle_ms)
            .finish_non_exhaustive()
    }
}
