//! Incremental frame extraction.
//!
//! Bytes are buffered raw so a multi-byte UTF-8 sequence split across two
//! reads is decoded only once the whole frame is present.

/// Longest delimiter (`\r\n\r\n`) minus one: how far back a new scan must
/// start to catch a delimiter split across two reads.
const DELIMITER_OVERLAP: usize = 3;

/// Slices a growing byte buffer into delimiter-terminated frames.
///
/// The unterminated tail stays buffered for the next [`push`](Self::push).
#[derive(Debug, Default)]
pub struct FrameExtractor {
    buf: Vec<u8>,
    /// Bytes of `buf` already searched without finding a delimiter.
    scanned: usize,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame body it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut cursor = self.scanned.saturating_sub(DELIMITER_OVERLAP);
        while let Some((at, len)) = find_delimiter(&self.buf, cursor) {
            frames.push(String::from_utf8_lossy(&self.buf[start..at]).into_owned());
            start = at + len;
            cursor = start;
        }

        self.buf.drain(..start);
        self.scanned = self.buf.len();
        frames
    }

    /// Bytes waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf = Vec::new();
        self.scanned = 0;
    }
}

/// Position and length of the first `\n\n` or `\r\n\r\n` at or after `from`.
fn find_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i] == b'\r' && buf[i + 1..].starts_with(b"\n\r\n") {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_nothing() {
        let mut frames = FrameExtractor::new();
        assert!(frames.push(b"").is_empty());
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn splits_several_frames_in_one_read() {
        let mut frames = FrameExtractor::new();
        let out = frames.push(b"data: 1\n\ndata: 2\n\ndata: 3");
        assert_eq!(out, vec!["data: 1", "data: 2"]);
        assert_eq!(frames.pending(), "data: 3".len());
        assert_eq!(frames.push(b"\n\n"), vec!["data: 3"]);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn delimiter_split_across_reads() {
        let mut frames = FrameExtractor::new();
        assert!(frames.push(b"data: {\"a\":1}\n").is_empty());
        assert_eq!(frames.push(b"\ndata: x"), vec!["data: {\"a\":1}"]);
    }

    #[test]
    fn crlf_delimiter_split_across_reads() {
        let mut frames = FrameExtractor::new();
        assert!(frames.push(b"data: a\r\n\r").is_empty());
        assert_eq!(frames.push(b"\n"), vec!["data: a"]);
    }

    #[test]
    fn every_split_point_gives_the_same_frames() {
        let input = "data: {\"type\":\"tensor_chunk\",\"index\":0,\"chunk\":\"héllo\"}\n\n".as_bytes();
        for split in 0..=input.len() {
            let mut frames = FrameExtractor::new();
            let mut out = frames.push(&input[..split]);
            out.extend(frames.push(&input[split..]));
            assert_eq!(out.len(), 1, "split at {split}");
            assert_eq!(out[0].as_bytes(), &input[..input.len() - 2]);
        }
    }

    #[test]
    fn byte_by_byte_feed() {
        let input = b"data: a\n\n: keep-alive\n\ndata: b\n\n";
        let mut frames = FrameExtractor::new();
        let out: Vec<String> = input.iter().flat_map(|b| frames.push(&[*b])).collect();
        assert_eq!(out, vec!["data: a", ": keep-alive", "data: b"]);
    }
}
