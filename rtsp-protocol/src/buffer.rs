//! Reorder (jitter) buffer for received frames
//!
//! Frames are held in a min-heap keyed by sequence number. Nothing is
//! released until the buffer depth reaches the low-watermark; from then on
//! each push releases exactly one frame, the one with the lowest sequence
//! number. This gives a fixed startup latency in exchange for tolerating
//! reordering within roughly a watermark-sized window.

use crate::packet::DataFrame;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Default depth at which delivery begins
pub const DEFAULT_LOW_WATERMARK: usize = 15;

/// Heap entry; ties on sequence fall back to arrival order
struct Entry {
    frame: DataFrame,
    arrival: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frame
            .sequence()
            .cmp(&other.frame.sequence())
            .then(self.arrival.cmp(&other.arrival))
    }
}

/// Sequence-ordered frame buffer with a low-watermark release policy
///
/// Ordering uses the raw 16-bit sequence value, so a stream that wraps past
/// 65535 is released out of order around the wrap point.
pub struct ReorderBuffer {
    heap: BinaryHeap<Reverse<Entry>>,
    low_watermark: usize,
    arrivals: u64,
}

impl ReorderBuffer {
    /// Create a buffer that starts releasing at `low_watermark` frames
    ///
    /// A watermark of zero behaves like one: every push releases a frame.
    pub fn new(low_watermark: usize) -> Self {
        ReorderBuffer {
            heap: BinaryHeap::with_capacity(low_watermark + 1),
            low_watermark: low_watermark.max(1),
            arrivals: 0,
        }
    }

    /// Insert a frame, releasing the lowest-sequence frame once the
    /// watermark is reached
    pub fn push(&mut self, frame: DataFrame) -> Option<DataFrame> {
        self.heap.push(Reverse(Entry {
            frame,
            arrival: self.arrivals,
        }));
        self.arrivals += 1;

        if self.heap.len() >= self.low_watermark {
            self.pop()
        } else {
            None
        }
    }

    /// Remove the lowest-sequence frame regardless of depth
    pub fn pop(&mut self) -> Option<DataFrame> {
        self.heap.pop().map(|Reverse(entry)| entry.frame)
    }

    /// Lowest sequence number currently held
    pub fn peek_sequence(&self) -> Option<u16> {
        self.heap.peek().map(|Reverse(entry)| entry.frame.sequence())
    }

    /// Remove every frame in ascending sequence order
    pub fn drain(&mut self) -> Vec<DataFrame> {
        let mut frames = Vec::with_capacity(self.heap.len());
        while let Some(frame) = self.pop() {
            frames.push(frame);
        }
        frames
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.heap.clear();
        self.arrivals = 0;
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn low_watermark(&self) -> usize {
        self.low_watermark
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        ReorderBuffer::new(DEFAULT_LOW_WATERMARK)
    }
}
