//! Retained-text buffer.
//!
//! Holds the suffix of consumed input that live configurations could
//! still consult (lookbehind context, in-progress match prefixes) in
//! global code-point coordinates. The matcher trims the front after
//! every chunk once the retention boundary is recomputed; text before
//! the base offset is gone for good, which is why captures copy their
//! text out eagerly.

/// Retained code points plus the global offset of the first one.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct RetainBuffer {
    chars: Vec<char>,
    base: u64,
}

impl RetainBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Global offset one past the last retained code point.
    #[inline]
    pub(crate) fn cursor(&self) -> u64 {
        self.base + self.chars.len() as u64
    }

    /// Global offset of the first retained code point.
    #[inline]
    pub(crate) fn base(&self) -> u64 {
        self.base
    }

    #[inline]
    pub(crate) fn push(&mut self, c: char) {
        self.chars.push(c);
    }

    /// Code point at a global offset, if still retained.
    #[inline]
    pub(crate) fn char_at(&self, pos: u64) -> Option<char> {
        if pos < self.base {
            return None;
        }
        self.chars.get((pos - self.base) as usize).copied()
    }

    /// Copy a retained global range out as an owned string.
    ///
    /// The range must be fully retained; trimming never discards text
    /// a live configuration can still reference.
    pub(crate) fn copy_range(&self, start: u64, end: u64) -> String {
        debug_assert!(start >= self.base && end <= self.cursor());
        let s = (start.saturating_sub(self.base)) as usize;
        let e = (end.saturating_sub(self.base)) as usize;
        self.chars[s.min(self.chars.len())..e.min(self.chars.len())]
            .iter()
            .collect()
    }

    /// Discard everything before the global offset `boundary`.
    pub(crate) fn trim_to(&mut self, boundary: u64) {
        if boundary <= self.base {
            return;
        }
        let n = ((boundary - self.base) as usize).min(self.chars.len());
        self.chars.drain(..n);
        self.base += n as u64;
    }

    /// The retained suffix as a read-only view.
    #[inline]
    pub(crate) fn suffix(&self) -> &[char] {
        &self.chars
    }
}
