//! SEAM Core Matcher
//!
//! Streaming, chunk-fed regular-expression matching. Patterns compile
//! once into an immutable program; a matcher instance consumes input
//! chunk by chunk and reports matches as soon as no unseen input could
//! change them, retaining only the suffix of consumed text that live
//! match attempts can still reference.
//!
//! # Architecture
//!
//! - **program.rs** - Expression tree, compiler, compiled automaton
//! - **class.rs** - Character classes and Unicode properties
//! - **engine.rs** - Thread simulation, epsilon closure, lookaround
//! - **matcher.rs** - Chunk feeding, match arbitration, retention
//! - **retain.rs** - Retained-text buffer in global coordinates
//! - **outcome.rs** - Per-chunk outcomes and match data
//! - **span.rs** - Global code-point spans

mod engine;
mod retain;

pub mod class;
pub mod matcher;
pub mod outcome;
pub mod program;
pub mod span;

pub use class::{property, CharClass, PropertyClass};
pub use matcher::{find_all, Config, Error, Snapshot, StreamMatcher};
pub use outcome::{Capture, MatchData, Outcome};
pub use program::{CompileError, Expr, Program};
pub use span::Span;
