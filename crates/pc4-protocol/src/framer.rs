//! Byte-stream reassembly: turns arbitrary, fragmented chunks off the wire
//! into whole `^...^` frames.
//!
//! Modeled on the paste-detector in `core-input`'s async event task: a
//! small inline state machine fed byte-by-byte (here, chunk-by-chunk) that
//! tells "mid-sequence" apart from "idle" and ages out a sequence that
//! never completes.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const MIN_MESSAGE_SIZE: usize = 4;
pub const MAX_MESSAGE_SIZE: usize = 1024;
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FramerError {
    #[error("frame below minimum size")]
    Short,
    #[error("frame does not open with '^'")]
    Open,
    #[error("bytes found after closing '^'")]
    Close,
    #[error("partial frame aged out waiting for a continuation")]
    ReassemblyTimeout,
    #[error("frame would exceed the maximum message size")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    WaitingFirstSegment,
    WaitingNextSegment,
}

/// Reassembles an unframed byte stream into whole frames under a strict
/// inter-segment timeout. Fully synchronous: the caller supplies `now`, so
/// this type has no suspension points and composes cleanly inside a mutex
/// guard (see `pc4-engine`).
#[derive(Debug)]
pub struct Framer {
    state: FramerState,
    buffer: Vec<u8>,
    reassembly_start: Option<Instant>,
    min_message_size: usize,
    max_message_size: usize,
    reassembly_timeout: Duration,
}

impl Framer {
    pub fn new(
        min_message_size: usize,
        max_message_size: usize,
        reassembly_timeout: Duration,
    ) -> Self {
        Self {
            state: FramerState::WaitingFirstSegment,
            buffer: Vec::new(),
            reassembly_start: None,
            min_message_size,
            max_message_size,
            reassembly_timeout,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, FramerState::WaitingFirstSegment) && self.buffer.is_empty()
    }

    /// Feed a chunk of arbitrary size and boundary, plus the current time.
    /// Returns every frame completed and every diagnostic raised while
    /// processing this chunk, in order.
    pub fn ingest(&mut self, chunk: &[u8], now: Instant) -> Vec<Result<Vec<u8>, FramerError>> {
        let mut out = Vec::new();

        let filtered: Vec<u8> = chunk
            .iter()
            .copied()
            .filter(|&b| b != 0x0D && b != 0x0A)
            .collect();
        if filtered.is_empty() {
            return out;
        }

        if self.state == FramerState::WaitingNextSegment
            && let Some(start) = self.reassembly_start
            && now.saturating_duration_since(start) > self.reassembly_timeout
        {
            warn!(target: "framer", "reassembly_timeout");
            self.reset();
            out.push(Err(FramerError::ReassemblyTimeout));
        }

        self.buffer.extend_from_slice(&filtered);

        if self.buffer.len() > self.max_message_size {
            warn!(target: "framer", len = self.buffer.len(), "overflow");
            self.reset();
            out.push(Err(FramerError::Overflow));
            return out;
        }

        if self.buffer.len() < self.min_message_size {
            debug!(target: "framer", len = self.buffer.len(), "short_frame");
            self.reset();
            out.push(Err(FramerError::Short));
            return out;
        }

        if self.buffer[0] != b'^' {
            warn!(target: "framer", "missing_open_delimiter");
            self.reset();
            out.push(Err(FramerError::Open));
            return out;
        }

        match self.buffer[1..].iter().position(|&b| b == b'^') {
            None => {
                self.state = FramerState::WaitingNextSegment;
                self.reassembly_start = Some(now);
            }
            Some(rel_idx) => {
                let close_idx = rel_idx + 1;
                if close_idx == self.buffer.len() - 1 {
                    let frame = std::mem::take(&mut self.buffer);
                    debug!(target: "framer", len = frame.len(), "frame_complete");
                    self.reset();
                    out.push(Ok(frame));
                } else {
                    warn!(target: "framer", "trailing_bytes_after_close");
                    self.reset();
                    out.push(Err(FramerError::Close));
                }
            }
        }

        out
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = FramerState::WaitingFirstSegment;
        self.reassembly_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> Framer {
        Framer::new(MIN_MESSAGE_SIZE, MAX_MESSAGE_SIZE, DEFAULT_REASSEMBLY_TIMEOUT)
    }

    #[tokio::test]
    async fn accepts_minimal_frame_in_one_chunk() {
        let mut f = framer();
        let now = Instant::now();
        let out = f.ingest(b"^S|^", now);
        assert_eq!(out, vec![Ok(b"^S|^".to_vec())]);
        assert!(f.is_idle());
    }

    #[tokio::test]
    async fn strips_cr_lf_before_any_logic() {
        let mut f = framer();
        let now = Instant::now();
        let out = f.ingest(b"\r\n^S|^\r\n", now);
        assert_eq!(out, vec![Ok(b"^S|^".to_vec())]);
    }

    #[tokio::test]
    async fn short_frame_is_discarded() {
        let mut f = framer();
        let now = Instant::now();
        let out = f.ingest(b"^^", now);
        assert_eq!(out, vec![Err(FramerError::Short)]);
        assert!(f.is_idle());
    }

    #[tokio::test]
    async fn missing_open_delimiter_is_discarded() {
        let mut f = framer();
        let now = Instant::now();
        let out = f.ingest(b"xyz|^", now);
        assert_eq!(out, vec![Err(FramerError::Open)]);
    }

    #[tokio::test]
    async fn trailing_bytes_after_close_are_discarded() {
        let mut f = framer();
        let now = Instant::now();
        let out = f.ingest(b"^S|^extra", now);
        assert_eq!(out, vec![Err(FramerError::Close)]);
    }

    #[tokio::test(start_paused = true)]
    async fn fragment_within_timeout_reassembles() {
        let mut f = framer();
        let t0 = Instant::now();
        let out = f.ingest(b"^P|0|1|A|", t0);
        assert!(out.is_empty());
        assert!(!f.is_idle());

        tokio::time::advance(Duration::from_millis(15)).await;
        let out = f.ingest(b"B|C|^", Instant::now());
        assert_eq!(out, vec![Ok(b"^P|0|1|A|B|C|^".to_vec())]);
        assert!(f.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn fragment_past_timeout_ages_out() {
        let mut f = framer();
        let out = f.ingest(b"^P|0|1|A", Instant::now());
        assert!(out.is_empty());

        tokio::time::advance(Duration::from_millis(50)).await;
        let out = f.ingest(b"|B|^", Instant::now());
        assert_eq!(
            out,
            vec![Err(FramerError::ReassemblyTimeout), Err(FramerError::Open)]
        );
        assert!(f.is_idle());
    }

    #[tokio::test]
    async fn overflow_discards_and_resets() {
        let mut f = Framer::new(MIN_MESSAGE_SIZE, 8, DEFAULT_REASSEMBLY_TIMEOUT);
        let now = Instant::now();
        let out = f.ingest(b"^123456789", now);
        assert_eq!(out, vec![Err(FramerError::Overflow)]);
        assert!(f.is_idle());
    }

    #[tokio::test]
    async fn buffer_never_exceeds_max_message_size() {
        let mut f = Framer::new(MIN_MESSAGE_SIZE, MAX_MESSAGE_SIZE, DEFAULT_REASSEMBLY_TIMEOUT);
        let now = Instant::now();
        let mut long = vec![b'^'];
        long.extend(std::iter::repeat_n(b'x', MAX_MESSAGE_SIZE + 16));
        let out = f.ingest(&long, now);
        assert_eq!(out, vec![Err(FramerError::Overflow)]);
    }
}
