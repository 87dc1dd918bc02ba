//! One `stream_process` call: the read loop, event routing and teardown.
//!
//! A [`StreamSession`] moves `Open -> Draining -> Closed`. Terminal events
//! and the end of the byte stream drain pending chunk callbacks before the
//! session closes; `error` / `fatal_error` close it without draining.

use crate::callbacks::StreamCallbacks;
use crate::config::TensorchatConfig;
use crate::decode::decode_frame;
use crate::frame::FrameExtractor;
use crate::throttle::Coalescer;
use crate::tracker::{ChunkDisposition, TensorTracker};
use futures_util::{Stream, StreamExt};
use std::time::Duration;
use tensorchat_core::{
    CompleteInfo, RemoteErrorKind, StreamEvent, TensorChunk, TensorIndex, TensorchatError,
    TensorchatResult,
};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Reading bytes and dispatching events.
    Open,
    /// A terminal condition was reached; flushing pending callbacks.
    Draining,
    /// Reader released; nothing more will be delivered.
    Closed,
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A `complete` event ended the session. Bytes after it were not read.
    Completed {
        /// `totalTensors` reported by the `complete` event.
        total_tensors: Option<u32>,
    },
    /// The byte stream ended without a terminal event.
    Exhausted,
}

/// What the driver should do after an event.
#[derive(Debug)]
enum Flow {
    Continue,
    Finished(CompleteInfo),
}

/// Counters reported when a verbose session closes.
#[derive(Debug, Default, Clone, Copy)]
struct SessionStats {
    events: u64,
    malformed: u64,
    dropped: u64,
}

/// Mutable state of a single streaming call.
///
/// Owned by exactly one call; a client creates a fresh session per call so
/// nothing leaks between calls.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    state: SessionState,
    frames: FrameExtractor,
    tensors: TensorTracker,
    /// `None` when coalescing is disabled: chunks are delivered immediately.
    pending: Option<Coalescer<TensorIndex, TensorChunk>>,
    verbose: bool,
    stats: SessionStats,
}

impl StreamSession {
    pub fn new(throttle: Option<Duration>, verbose: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Open,
            frames: FrameExtractor::new(),
            tensors: TensorTracker::new(),
            pending: throttle.map(Coalescer::new),
            verbose,
            stats: SessionStats::default(),
        }
    }

    pub fn from_config(config: &TensorchatConfig) -> Self {
        Self::new(config.throttle(), config.verbose)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of coalesced chunk callbacks waiting to fire.
    pub fn pending_callbacks(&self) -> usize {
        self.pending.as_ref().map_or(0, Coalescer::len)
    }

    /// Bytes held in per-tensor buffers.
    pub fn buffered_bytes(&self) -> usize {
        self.tensors.buffered_bytes()
    }

    /// Drives `stream` to the end of the session.
    ///
    /// Every failure is delivered to `on_error` exactly once and then
    /// returned. The stream is dropped (and the underlying reader released)
    /// when this returns, whichever way it exits. `teardown` lets a client
    /// clear timers and buffers while the read is still in flight.
    pub async fn run<S, B, E>(
        mut self,
        stream: S,
        callbacks: &mut StreamCallbacks,
        teardown: Option<watch::Receiver<u64>>,
    ) -> TensorchatResult<SessionOutcome>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<TensorchatError>,
    {
        if self.verbose {
            info!(session_id = %self.id, "stream session opened");
        }
        let result = self.drive(stream, callbacks, teardown).await;
        self.close();
        if let Err(e) = &result {
            if self.verbose {
                warn!(session_id = %self.id, error = %e, "stream session failed");
            }
            callbacks.error(e);
        }
        result
    }

    async fn drive<S, B, E>(
        &mut self,
        mut stream: S,
        callbacks: &mut StreamCallbacks,
        mut teardown: Option<watch::Receiver<u64>>,
    ) -> TensorchatResult<SessionOutcome>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<TensorchatError>,
    {
        loop {
            let deadline = self.pending.as_ref().and_then(Coalescer::next_deadline);
            tokio::select! {
                biased;
                requested = teardown_requested(&mut teardown) => {
                    if requested {
                        self.destroy();
                    } else {
                        teardown = None;
                    }
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due(Instant::now(), callbacks);
                }
                next = stream.next() => match next {
                    Some(Ok(bytes)) => {
                        if let Flow::Finished(info) = self.feed(bytes.as_ref(), callbacks)? {
                            self.drain(callbacks);
                            callbacks.complete(&info);
                            return Ok(SessionOutcome::Completed {
                                total_tensors: info.total_tensors,
                            });
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        if self.frames.pending() > 0 && self.verbose {
                            debug!(
                                session_id = %self.id,
                                bytes = self.frames.pending(),
                                "discarding unterminated trailing frame"
                            );
                        }
                        self.drain(callbacks);
                        return Ok(SessionOutcome::Exhausted);
                    }
                },
            }
        }
    }

    /// Feeds one read into the session, dispatching every completed frame.
    ///
    /// Stops at a `complete` event; frames after it are not evaluated.
    fn feed(&mut self, bytes: &[u8], callbacks: &mut StreamCallbacks) -> TensorchatResult<Flow> {
        let now = Instant::now();
        for frame in self.frames.push(bytes) {
            let event = match decode_frame(&frame) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    self.stats.malformed += 1;
                    if self.verbose {
                        warn!(session_id = %self.id, error = %e, "dropping malformed frame");
                    }
                    continue;
                }
            };
            self.stats.events += 1;
            if let Flow::Finished(info) = self.handle_event(event, callbacks, now)? {
                return Ok(Flow::Finished(info));
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_event(
        &mut self,
        event: StreamEvent,
        callbacks: &mut StreamCallbacks,
        now: Instant,
    ) -> TensorchatResult<Flow> {
        if let Some(index) = event.index() {
            // tensor_complete handles its own duplicates.
            if self.tensors.is_completed(index) && !matches!(event, StreamEvent::TensorComplete(_)) {
                self.stats.dropped += 1;
                if self.verbose {
                    debug!(
                        session_id = %self.id,
                        index,
                        event = event.event_type(),
                        "dropping event for completed tensor"
                    );
                }
                return Ok(Flow::Continue);
            }
        }

        match event {
            StreamEvent::Start(info) => callbacks.start(&info),
            StreamEvent::Progress(progress) => callbacks.progress(&progress),
            StreamEvent::SearchProgress(update) => callbacks.search_progress(&update),
            StreamEvent::SearchComplete(update) => callbacks.search_complete(&update),
            StreamEvent::TensorChunk(chunk) => self.on_chunk(chunk, callbacks, now),
            StreamEvent::TensorComplete(done) => {
                // The timer is cancelled; its fragments still go out ahead of the completion.
                if let Some(chunk) = self.pending.as_mut().and_then(|p| p.cancel(&done.index)) {
                    callbacks.tensor_chunk(&chunk);
                }
                match self.tensors.complete(done.index, done.result) {
                    Some(completion) => callbacks.tensor_complete(&completion),
                    None => {
                        self.stats.dropped += 1;
                        if self.verbose {
                            debug!(session_id = %self.id, index = done.index, "duplicate tensor_complete");
                        }
                    }
                }
            }
            StreamEvent::TensorError(failure) => {
                if self.verbose {
                    warn!(
                        session_id = %self.id,
                        index = failure.index,
                        error = failure.error.as_deref().unwrap_or("unknown"),
                        "tensor failed"
                    );
                }
                callbacks.tensor_error(&failure);
            }
            StreamEvent::Complete(info) => return Ok(Flow::Finished(info)),
            StreamEvent::Error(failure) => {
                return Err(TensorchatError::remote(RemoteErrorKind::Error, failure.message()))
            }
            StreamEvent::FatalError(failure) => {
                return Err(TensorchatError::remote(RemoteErrorKind::Fatal, failure.message()))
            }
            StreamEvent::Unknown => {
                if self.verbose {
                    debug!(session_id = %self.id, "ignoring unknown event type");
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn on_chunk(&mut self, chunk: TensorChunk, callbacks: &mut StreamCallbacks, now: Instant) {
        if self.tensors.record_chunk(chunk.index, &chunk.chunk)
            == ChunkDisposition::DroppedAfterCompletion
        {
            self.stats.dropped += 1;
            return;
        }
        match self.pending.as_mut() {
            Some(pending) if callbacks.wants_chunks() => {
                // Fragments superseded inside one window are delivered together.
                let chunk = match pending.cancel(&chunk.index) {
                    Some(mut earlier) => {
                        earlier.chunk.push_str(&chunk.chunk);
                        earlier
                    }
                    None => chunk,
                };
                pending.schedule(chunk.index, chunk, now);
            }
            _ => callbacks.tensor_chunk(&chunk),
        }
    }

    fn fire_due(&mut self, now: Instant, callbacks: &mut StreamCallbacks) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        for (_, chunk) in pending.take_due(now) {
            callbacks.tensor_chunk(&chunk);
        }
    }

    /// Delivers every pending chunk callback now.
    fn drain(&mut self, callbacks: &mut StreamCallbacks) {
        self.state = SessionState::Draining;
        if let Some(pending) = self.pending.as_mut() {
            for (_, chunk) in pending.drain() {
                callbacks.tensor_chunk(&chunk);
            }
        }
    }

    /// Cancels pending chunk callbacks and releases every tensor buffer.
    ///
    /// Idempotent. The session keeps its read position. Completed tensors
    /// stay completed; tensors that were in flight restart from an empty
    /// buffer.
    pub fn destroy(&mut self) {
        let cancelled = self.pending.as_mut().map_or(0, Coalescer::cancel_all);
        let released = self.tensors.in_flight();
        self.tensors.release_buffers();
        if self.verbose {
            debug!(session_id = %self.id, cancelled, released, "session state destroyed");
        }
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.destroy();
        self.frames.clear();
        self.state = SessionState::Closed;
        if self.verbose {
            info!(
                session_id = %self.id,
                events = self.stats.events,
                malformed = self.stats.malformed,
                dropped = self.stats.dropped,
                "stream session closed"
            );
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolves when the client asks for teardown; `false` once the client is gone.
async fn teardown_requested(teardown: &mut Option<watch::Receiver<u64>>) -> bool {
    match teardown {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}
