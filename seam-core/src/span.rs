//! Span/offset types in the global stream coordinate space.
//!
//! All offsets count Unicode code points from the start of the stream,
//! never bytes and never chunk-relative positions. A span can refer to
//! text that has already been discarded from the retention buffer; the
//! offsets stay valid even when the text is gone.

/// A half-open `[start, end)` range of global code-point offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Inclusive start offset.
    pub start: u64,
    /// Exclusive end offset.
    pub end: u64,
}

impl Span {
    /// Create a new span.
    #[inline]
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Length in code points.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Check if the span is empty (a zero-width match).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if `offset` falls inside the span.
    #[inline]
    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }
}
