use serde_json::Value;
use std::collections::HashMap;
use tensorchat_core::{TensorCompletion, TensorIndex};

/// Per-tensor bookkeeping.
///
/// A completed tensor keeps only its `completed` flag; its fragment buffer
/// is released as soon as the completion record is built.
#[derive(Debug, Default)]
struct TensorState {
    chunks: Vec<String>,
    completed: bool,
}

/// Outcome of [`TensorTracker::record_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// Buffered; the chunk callback should fire.
    Accepted,
    /// The tensor already completed; the fragment was discarded.
    DroppedAfterCompletion,
}

/// Accumulates fragments per tensor index and enforces exactly-once
/// completion.
///
/// State is created lazily for any index the stream mentions, so a sparse or
/// out-of-range index is handled the same as a dense one.
#[derive(Debug, Default)]
pub struct TensorTracker {
    tensors: HashMap<TensorIndex, TensorState>,
}

impl TensorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk(&mut self, index: TensorIndex, chunk: &str) -> ChunkDisposition {
        let state = self.tensors.entry(index).or_default();
        if state.completed {
            return ChunkDisposition::DroppedAfterCompletion;
        }
        state.chunks.push(chunk.to_owned());
        ChunkDisposition::Accepted
    }

    /// Marks `index` completed and builds its completion record.
    ///
    /// Returns `None` if the tensor had already completed. The fragments are
    /// joined in a single pass and the buffer is released.
    pub fn complete(&mut self, index: TensorIndex, result: Option<Value>) -> Option<TensorCompletion> {
        let state = self.tensors.entry(index).or_default();
        if state.completed {
            return None;
        }
        state.completed = true;
        let chunks = std::mem::take(&mut state.chunks);
        let content = chunks.concat();
        Some(TensorCompletion {
            index,
            result,
            chunks,
            content,
        })
    }

    pub fn is_completed(&self, index: TensorIndex) -> bool {
        self.tensors.get(&index).is_some_and(|s| s.completed)
    }

    /// Number of tensors seen but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.tensors.values().filter(|s| !s.completed).count()
    }

    /// Total bytes of buffered fragments across in-flight tensors.
    pub fn buffered_bytes(&self) -> usize {
        self.tensors
            .values()
            .flat_map(|s| s.chunks.iter())
            .map(String::len)
            .sum()
    }

    /// Releases every in-flight buffer.
    ///
    /// Completed tensors stay marked so later events for them are still
    /// dropped; a tensor that was in flight starts over from an empty buffer.
    pub fn release_buffers(&mut self) {
        self.tensors.retain(|_, state| state.completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_fragments_in_order() {
        let mut tracker = TensorTracker::new();
        for chunk in ["ab", "cd", "ef"] {
            assert_eq!(tracker.record_chunk(0, chunk), ChunkDisposition::Accepted);
        }
        let done = tracker
            .complete(0, Some(serde_json::json!({"tokens": 3})))
            .unwrap();
        assert_eq!(done.content, "abcdef");
        assert_eq!(done.chunks, vec!["ab", "cd", "ef"]);
        assert_eq!(done.result, Some(serde_json::json!({"tokens": 3})));
    }

    #[test]
    fn completion_is_exactly_once() {
        let mut tracker = TensorTracker::new();
        tracker.record_chunk(1, "x");
        assert!(tracker.complete(1, None).is_some());
        assert!(tracker.complete(1, None).is_none());
        assert!(tracker.is_completed(1));
    }

    #[test]
    fn chunk_after_completion_is_dropped() {
        let mut tracker = TensorTracker::new();
        tracker.record_chunk(0, "a");
        tracker.complete(0, None);
        assert_eq!(
            tracker.record_chunk(0, "late"),
            ChunkDisposition::DroppedAfterCompletion
        );
        assert_eq!(tracker.buffered_bytes(), 0);
    }

    #[test]
    fn completion_without_chunks_is_empty() {
        let mut tracker = TensorTracker::new();
        let done = tracker.complete(7, None).unwrap();
        assert_eq!(done.index, 7);
        assert!(done.chunks.is_empty());
        assert_eq!(done.content, "");
    }

    #[test]
    fn buffers_are_released_on_completion() {
        let mut tracker = TensorTracker::new();
        tracker.record_chunk(0, "aaaa");
        tracker.record_chunk(1, "bb");
        assert_eq!(tracker.in_flight(), 2);
        assert_eq!(tracker.buffered_bytes(), 6);

        tracker.complete(0, None);
        assert_eq!(tracker.in_flight(), 1);
        assert_eq!(tracker.buffered_bytes(), 2);

        tracker.release_buffers();
        assert_eq!(tracker.in_flight(), 0);
        assert_eq!(tracker.buffered_bytes(), 0);
    }

    #[test]
    fn released_tracker_remembers_completions() {
        let mut tracker = TensorTracker::new();
        tracker.record_chunk(0, "ab");
        tracker.complete(0, None);
        tracker.record_chunk(1, "partial");

        tracker.release_buffers();
        tracker.release_buffers();

        assert!(tracker.is_completed(0));
        assert_eq!(
            tracker.record_chunk(0, "stray"),
            ChunkDisposition::DroppedAfterCompletion
        );
        assert!(tracker.complete(0, None).is_none());

        tracker.record_chunk(1, "x");
        assert_eq!(tracker.complete(1, None).unwrap().content, "x");
    }
}
