//! Per-chunk outcomes and committed match data.
//!
//! The three-valued outcome model replaces the boolean/offset result of
//! a one-shot match call: `Matched` and `Rejected` are only ever
//! reported once no unseen input could change them; everything else is
//! `Pending` with the exact must-keep suffix.

use crate::span::Span;

/// One captured group: its global span and the text, copied out at
/// capture-close time since the source may be discarded later.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capture {
    pub span: Span,
    pub text: String,
}

/// A committed match.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchData {
    /// Span of the whole match (group 0) in global offsets.
    pub span: Span,
    /// Per-group captures, indexed by group number. Index 0 is the
    /// whole match; a `None` entry means the group did not participate.
    pub captures: Vec<Option<Capture>>,
}

impl MatchData {
    /// Text of the whole match.
    pub fn text(&self) -> &str {
        self.captures[0]
            .as_ref()
            .map(|c| c.text.as_str())
            .unwrap_or("")
    }

    /// A capture by group index.
    pub fn group(&self, index: usize) -> Option<&Capture> {
        self.captures.get(index)?.as_ref()
    }

    /// A capture by group name, resolved against the program the match
    /// came from.
    pub fn named_group(&self, prog: &crate::program::Program, name: &str) -> Option<&Capture> {
        self.group(prog.group_index(name)?)
    }
}

/// The outcome of feeding one chunk (or finishing).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    /// A complete match committed; no further input can invalidate it.
    Matched(MatchData),
    /// No match can ever be produced from here.
    Rejected,
    /// Undecided; `retained` is the exact suffix of consumed input
    /// that must be preserved for future chunks.
    Pending { retained: String },
}

impl Outcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Outcome::Matched(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending { .. })
    }

    /// The match data, if this outcome committed one.
    pub fn as_match(&self) -> Option<&MatchData> {
        match self {
            Outcome::Matched(m) => Some(m),
            _ => None,
        }
    }
}
