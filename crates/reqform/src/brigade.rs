//! Segmented byte queue feeding the parsers.
//!
//! A [`Brigade`] is a FIFO of [`Bytes`] segments. Input arrives in whatever
//! chunks the environment produces; the queue exposes the concatenation
//! without forcing a copy. Contiguous spans are handed out zero-copy, spans
//! that straddle segment boundaries are coalesced on demand.
//!
//! The queue carries an end-of-stream marker ([`Brigade::close`]) so parsers
//! can distinguish "starved" from "finished".

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem;

/// FIFO of byte segments with zero-copy reads and an EOS marker.
#[derive(Clone, Default)]
pub struct Brigade {
    segments: VecDeque<Bytes>,
    len: usize,
    closed: bool,
}

impl Brigade {
    /// Create an empty, open brigade.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment to the tail of the queue.
    ///
    /// Empty segments are dropped. Appending after [`close`][Self::close]
    /// is a logic error.
    pub fn append(&mut self, data: impl Into<Bytes>) {
        debug_assert!(!self.closed, "append to closed brigade");
        let data = data.into();
        if data.is_empty() {
            return;
        }
        self.len += data.len();
        self.segments.push_back(data);
    }

    /// Copy a slice into the queue as a new segment.
    pub fn append_slice(&mut self, data: &[u8]) {
        self.append(Bytes::copy_from_slice(data));
    }

    /// Mark end of stream. No further segments will arrive.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// True once [`close`][Self::close] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Total buffered bytes across all segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read up to `n` bytes from the front without consuming them.
    ///
    /// Returns fewer than `n` bytes only when fewer are buffered. The read
    /// is zero-copy when the span lies within the first segment; otherwise
    /// the span is coalesced into a fresh buffer.
    #[must_use]
    pub fn peek(&self, n: usize) -> Bytes {
        let n = n.min(self.len);
        if n == 0 {
            return Bytes::new();
        }
        let first = &self.segments[0];
        if first.len() >= n {
            return first.slice(..n);
        }
        let mut buf = BytesMut::with_capacity(n);
        let mut remaining = n;
        for seg in &self.segments {
            let take = remaining.min(seg.len());
            buf.extend_from_slice(&seg[..take]);
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        buf.freeze()
    }

    /// Consume and return up to `n` bytes from the front as one segment.
    #[must_use]
    pub fn take(&mut self, n: usize) -> Bytes {
        let n = n.min(self.len);
        if n == 0 {
            return Bytes::new();
        }
        self.len -= n;
        {
            let first = &mut self.segments[0];
            if first.len() > n {
                return first.split_to(n);
            }
            if first.len() == n {
                return self.segments.pop_front().unwrap_or_default();
            }
        }
        let mut buf = BytesMut::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let mut seg = self
                .segments
                .pop_front()
                .unwrap_or_else(|| unreachable!("len accounting out of sync"));
            if seg.len() > remaining {
                buf.extend_from_slice(&seg.split_to(remaining));
                self.segments.push_front(seg);
                remaining = 0;
            } else {
                remaining -= seg.len();
                buf.extend_from_slice(&seg);
            }
        }
        buf.freeze()
    }

    /// Drop up to `n` bytes from the front. Returns the count dropped.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.len);
        let mut remaining = n;
        while remaining > 0 {
            let seg_len = self.segments[0].len();
            if seg_len > remaining {
                self.segments[0].advance(remaining);
                remaining = 0;
            } else {
                self.segments.pop_front();
                remaining -= seg_len;
            }
        }
        self.len -= n;
        n
    }

    /// Detach the first `n` buffered bytes as a new brigade, leaving the
    /// remainder (and the EOS marker) in place.
    #[must_use]
    pub fn split_to(&mut self, n: usize) -> Brigade {
        let mut head = Brigade::new();
        let mut remaining = n.min(self.len);
        while remaining > 0 {
            let seg_len = self.segments[0].len();
            if seg_len > remaining {
                let piece = self.segments[0].split_to(remaining);
                self.len -= remaining;
                head.append(piece);
                remaining = 0;
            } else {
                let seg = self.segments.pop_front().unwrap_or_default();
                self.len -= seg.len();
                remaining -= seg.len();
                head.append(seg);
            }
        }
        head
    }

    /// Move every segment of `other` to the tail of this queue.
    pub fn append_brigade(&mut self, mut other: Brigade) {
        while let Some(seg) = other.pop_segment() {
            self.append(seg);
        }
    }

    /// Detach the front segment without copying.
    pub fn pop_segment(&mut self) -> Option<Bytes> {
        let seg = self.segments.pop_front()?;
        self.len -= seg.len();
        Some(seg)
    }

    /// Offset of the first occurrence of `byte`, if buffered.
    #[must_use]
    pub fn find(&self, byte: u8) -> Option<usize> {
        let mut base = 0;
        for seg in &self.segments {
            if let Some(pos) = memchr::memchr(byte, seg) {
                return Some(base + pos);
            }
            base += seg.len();
        }
        None
    }

    /// Offset of the first occurrence of `needle`, searching across
    /// segment boundaries.
    #[must_use]
    pub fn find_delim(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.len {
            return None;
        }
        let finder = memmem::Finder::new(needle);
        let overlap = needle.len() - 1;
        let mut base = 0;
        for (i, seg) in self.segments.iter().enumerate() {
            if let Some(pos) = finder.find(seg) {
                return Some(base + pos);
            }
            // A match may start in this segment's tail and complete in the
            // following segments; check a small window over the junction.
            if overlap > 0 && i + 1 < self.segments.len() {
                let tail_start = seg.len().saturating_sub(overlap);
                let mut window = Vec::with_capacity(overlap * 2);
                window.extend_from_slice(&seg[tail_start..]);
                'fill: for next in self.segments.iter().skip(i + 1) {
                    for &b in next.iter() {
                        window.push(b);
                        if window.len() >= (seg.len() - tail_start) + overlap {
                            break 'fill;
                        }
                    }
                }
                if let Some(pos) = finder.find(&window) {
                    // Only straddling matches count here; a match wholly in a
                    // later segment is found by a later iteration.
                    if tail_start + pos < seg.len() {
                        return Some(base + tail_start + pos);
                    }
                }
            }
            base += seg.len();
        }
        None
    }
}

impl std::fmt::Debug for Brigade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brigade")
            .field("segments", &self.segments.len())
            .field("len", &self.len)
            .field("closed", &self.closed)
            .finish()
    }
}
