//! Core types shared by the Tensorchat streaming crates.
//!
//! # Main types
//!
//! - [`TensorchatError`]: Unified error enum for the client.
//! - [`TensorchatResult`]: Convenience alias for `Result<T, TensorchatError>`.
//! - [`StreamRequest`] / [`TensorConfig`]: The multi-tensor request body.
//! - [`StreamEvent`]: Tagged union over every event of a `/streamProcess` stream.
//! - [`TensorCompletion`]: The enriched, authoritative result of one tensor.

/// Error types.
pub mod error;
/// Wire events and their payloads.
pub mod event;
/// Request body types.
pub mod request;

pub use error::{RemoteErrorKind, TensorchatError, TensorchatResult};
pub use event::{
    CompleteInfo, SearchUpdate, StartInfo, StreamEvent, StreamFailure, TensorChunk,
    TensorCompletion, TensorFailure, TensorIndex, TensorProgress, TensorResult,
};
pub use request::{StreamRequest, TensorConfig};
