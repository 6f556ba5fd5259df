//! Test infrastructure for the streaming matcher
//!
//! Provides a pattern battery, chunking helpers, and the oracle
//! comparison between chunked feeding and one-shot matching.

mod generators;
mod harness;

pub use generators::Gen;
pub use harness::{
    assert_chunking_matches_oracle, chunked_spans, chunks_at, oracle_spans, pattern_battery,
    spans,
};
