//! Client-side engine for Tensorchat multi-tensor streaming.
//!
//! One `/streamProcess` response multiplexes the progress of every tensor in
//! a request as `data: <json>\n\n` frames. This crate slices the byte stream
//! into frames, decodes them into [`StreamEvent`]s, accumulates each tensor's
//! fragments and delivers ordered, per-tensor callbacks.
//!
//! ```no_run
//! use tensorchat_stream::{StreamCallbacks, TensorchatConfig, TensorchatStreaming};
//! use tensorchat_core::{StreamRequest, TensorConfig};
//!
//! # async fn run() -> tensorchat_core::TensorchatResult<()> {
//! let client = TensorchatStreaming::new(TensorchatConfig::new("api-key").with_throttle_ms(50))?;
//! let request = StreamRequest::new("You are a data analyst.", "google/gemini-2.5-flash-lite")
//!     .tensor(TensorConfig::new("Summarize the feedback").concise(true))
//!     .tensor(TensorConfig::new("Extract the sentiment").concise(true));
//!
//! let callbacks = StreamCallbacks::new()
//!     .on_tensor_chunk(|c| print!("[{}] {}", c.index, c.chunk))
//!     .on_tensor_complete(|t| println!("\n[{}] {} chars", t.index, t.content.len()))
//!     .on_error(|e| eprintln!("{e}"));
//! client.stream_process(&request, callbacks).await?;
//! # Ok(())
//! # }
//! ```

/// Caller-supplied event handlers.
pub mod callbacks;
/// The `/streamProcess` client.
pub mod client;
/// Client configuration.
pub mod config;
/// Frame-to-event decoding.
pub mod decode;
pub mod frame;
/// Shared, cloneable client handle.
pub mod manager;
pub mod session;
pub mod throttle;
/// Per-tensor fragment accumulation.
pub mod tracker;
/// Byte-stream transports.
pub mod transport;

pub use callbacks::StreamCallbacks;
pub use client::{ProcessOutput, TensorchatStreaming};
pub use config::{TensorchatConfig, DEFAULT_BASE_URL};
pub use manager::{create_streaming_manager, TensorchatStreamingManager};
pub use session::{SessionOutcome, SessionState, StreamSession};
pub use tensorchat_core::StreamEvent;
pub use transport::{ByteStream, HttpTransport, StreamTransport};
