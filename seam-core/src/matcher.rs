//! Streaming matcher: chunk feeding, match arbitration, retention.
//!
//! The matcher owns all mutable state for one logical stream. Matching
//! work is organized in rounds: round 0 holds the configurations
//! competing for the next committed match, and each later round holds
//! anchors kept speculatively for the scan that resumes after it. A
//! round's candidate is the best fully-resolved match found so far; it
//! commits once nothing of higher priority is left alive, which is the
//! point where no unseen input can change it. Provisional matches
//! whose lookahead is still deferred sit in the entry list as held
//! entries, keeping their priority slot without killing the fallbacks
//! behind them.
//!
//! At every chunk boundary an exploratory closure runs with the next
//! symbol unknown. Threads whose assertions need that symbol stay
//! unclosed and are retried when it arrives; everything else resolves
//! immediately, so a match that ends exactly at the boundary is
//! reported without waiting for the next chunk.

use crate::engine::{
    advance_watches, close_thread, need_floor, refresh_watches, spawn, thread_floor,
    watches_floor, Captures, Item, NextChar, Refresh, StepCtx, Thread, Watch,
};
use crate::outcome::{Capture, MatchData, Outcome};
use crate::program::{Inst, Program};
use crate::retain::RetainBuffer;
use crate::span::Span;

/// Complexity cap on live configurations per matcher.
const MAX_LIVE: usize = 10_000;

/// Matching mode flags, mirroring the standard regex flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Keep scanning after each committed match (non-overlapping).
    pub global: bool,
    /// Matches must start exactly at the anchor position.
    pub sticky: bool,
    /// Accept patterns with unbounded lookbehind, retaining the whole
    /// stream.
    pub allow_unbounded_retention: bool,
}

/// Matcher-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pattern requires unbounded retention and the config does
    /// not allow it. Surfaced at construction, never mid-stream.
    UnboundedLookbehind,
    /// `feed` after `finish`.
    FeedAfterFinish,
    /// `feed` after a terminal commit or rejection.
    FeedAfterDone,
    /// Byte input did not decode as UTF-8, or a chunk boundary left an
    /// incomplete sequence that was never completed.
    InvalidUtf8,
    /// The live-configuration cap was exceeded.
    TooManyThreads,
    /// A snapshot was resumed against a different program.
    SnapshotMismatch,
}

impl Error {
    /// Human-readable message for this error.
    pub fn message(self) -> &'static str {
        match self {
            Self::UnboundedLookbehind => "pattern requires unbounded retention",
            Self::FeedAfterFinish => "feed after finish",
            Self::FeedAfterDone => "feed after terminal outcome",
            Self::InvalidUtf8 => "invalid utf-8 input",
            Self::TooManyThreads => "too many live configurations",
            Self::SnapshotMismatch => "snapshot belongs to a different program",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Error {}

/// Usage-state machine per matcher instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum Phase {
    Idle,
    Feeding,
    /// Terminal commit (non-global) or terminal rejection (sticky).
    Done,
    Finished,
}

/// A fully-resolved match held until nothing better can appear.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Candidate {
    start: u64,
    end: u64,
    caps: Box<Captures>,
}

impl Candidate {
    fn cut(&self) -> u64 {
        cut(self.start, self.end)
    }
}

/// Scan resume position after a committed match; an empty match
/// advances by one so scanning always makes progress.
fn cut(start: u64, end: u64) -> u64 {
    if start == end {
        end + 1
    } else {
        end
    }
}

/// A provisional match whose lookahead watches are still open. It
/// occupies its priority slot in the entry list; the entries behind it
/// are its fallbacks if a watch fails.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct PendingMatch {
    start: u64,
    end: u64,
    caps: Box<Captures>,
    watches: Vec<Watch>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum Entry {
    Live(Thread),
    Held(PendingMatch),
}

impl Entry {
    fn start(&self) -> u64 {
        match self {
            Entry::Live(t) => t.start,
            Entry::Held(pm) => pm.start,
        }
    }
}

/// One arbitration group: the entries competing for one committed
/// match, in priority order, plus the best resolved match so far.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Round {
    candidate: Option<Candidate>,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Closure before consuming a known symbol.
    Feed,
    /// Exploratory closure at a chunk boundary.
    Peek,
    /// Closure against end of input; waiting threads are dead.
    Finish,
}

/// An owned image of all mutable matcher state, resumable against the
/// same program.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    config: Config,
    phase: Phase,
    prev: Option<char>,
    buf: RetainBuffer,
    rounds: Vec<Round>,
    next_spawn_min: u64,
    anchor_pos: u64,
    match_count: u64,
    utf8_pending: Vec<u8>,
    insts: u32,
    groups: u16,
}

/// A resumable matcher for one logical stream.
///
/// Bound to one immutable [`Program`] and one [`Config`]. Feed chunks
/// in order, then finish:
///
/// ```
/// use seam_core::matcher::{Config, StreamMatcher};
/// use seam_core::program::{Expr, Program};
///
/// let prog = Program::compile(&Expr::literal("ab")).unwrap();
/// let mut m = StreamMatcher::new(&prog, Config::default()).unwrap();
/// assert!(m.feed("a").unwrap()[0].is_pending());
/// assert!(m.feed("b").unwrap()[0].is_matched());
/// ```
#[derive(Debug)]
pub struct StreamMatcher<'p> {
    prog: &'p Program,
    config: Config,
    phase: Phase,
    /// Last consumed symbol (word-boundary context).
    prev: Option<char>,
    buf: RetainBuffer,
    rounds: Vec<Round>,
    /// Minimum anchor position for new match attempts.
    next_spawn_min: u64,
    /// Required anchor position in sticky mode.
    anchor_pos: u64,
    match_count: u64,
    utf8_pending: [u8; 4],
    utf8_len: u8,
}

impl<'p> StreamMatcher<'p> {
    /// Create a matcher bound to a compiled program.
    ///
    /// Fails fast if the pattern would force unbounded retention and
    /// the config does not opt in.
    pub fn new(prog: &'p Program, config: Config) -> Result<Self, Error> {
        if prog.has_unbounded_lookbehind() && !config.allow_unbounded_retention {
            return Err(Error::UnboundedLookbehind);
        }
        Ok(StreamMatcher {
            prog,
            config,
            phase: Phase::Idle,
            prev: None,
            buf: RetainBuffer::new(),
            rounds: vec![Round::default()],
            next_spawn_min: 0,
            anchor_pos: 0,
            match_count: 0,
            utf8_pending: [0; 4],
            utf8_len: 0,
        })
    }

    /// Feed one chunk of decoded text.
    ///
    /// Returns the matches committed while consuming it, in order,
    /// followed by one trailing status: `Pending` while more input can
    /// still decide things, `Rejected` on terminal failure, nothing
    /// after a terminal commit.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<Outcome>, Error> {
        self.check_feedable()?;
        if self.utf8_len > 0 {
            return Err(Error::InvalidUtf8);
        }
        self.phase = Phase::Feeding;
        let mut matches = Vec::new();
        self.feed_str(chunk, &mut matches)?;
        Ok(self.end_of_chunk(matches))
    }

    /// Feed one chunk of raw bytes, carrying an incomplete trailing
    /// UTF-8 sequence over to the next call.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Vec<Outcome>, Error> {
        self.check_feedable()?;
        self.phase = Phase::Feeding;

        let joined: Vec<u8>;
        let input: &[u8] = if self.utf8_len > 0 {
            let mut v = self.utf8_pending[..self.utf8_len as usize].to_vec();
            v.extend_from_slice(bytes);
            self.utf8_len = 0;
            joined = v;
            &joined
        } else {
            bytes
        };

        let text = match std::str::from_utf8(input) {
            Ok(s) => s,
            Err(e) => {
                if e.error_len().is_some() {
                    return Err(Error::InvalidUtf8);
                }
                let valid = e.valid_up_to();
                let tail = &input[valid..];
                if tail.len() >= 4 {
                    return Err(Error::InvalidUtf8);
                }
                self.utf8_pending[..tail.len()].copy_from_slice(tail);
                self.utf8_len = tail.len() as u8;
                std::str::from_utf8(&input[..valid]).map_err(|_| Error::InvalidUtf8)?
            }
        };

        let mut matches = Vec::new();
        self.feed_str(text, &mut matches)?;
        Ok(self.end_of_chunk(matches))
    }

    /// Signal end of input. Deferred assertions resolve against the
    /// definite stream end; whatever can commit, commits. `Rejected`
    /// is reported only if the stream never produced a match. A second
    /// call is idempotent and returns nothing.
    pub fn finish(&mut self) -> Result<Vec<Outcome>, Error> {
        match self.phase {
            Phase::Finished | Phase::Done => return Ok(Vec::new()),
            Phase::Idle | Phase::Feeding => {}
        }
        if self.utf8_len > 0 {
            return Err(Error::InvalidUtf8);
        }
        self.phase = Phase::Feeding;

        let mut matches = Vec::new();
        loop {
            let before = self.match_count;
            self.phase_a(NextChar::Eof, &mut matches, Mode::Finish);
            if self.match_count == before {
                break;
            }
        }

        let had_matches = self.match_count > 0;
        self.phase = Phase::Finished;
        self.rounds.clear();
        self.rounds.push(Round::default());
        self.buf.trim_to(self.buf.cursor());

        let mut outcomes: Vec<Outcome> = matches.into_iter().map(Outcome::Matched).collect();
        if !had_matches {
            outcomes.push(Outcome::Rejected);
        }
        Ok(outcomes)
    }

    /// The current must-keep suffix of consumed input.
    pub fn retained_suffix(&self) -> &[char] {
        self.buf.suffix()
    }

    /// Global offset of the next symbol to be consumed.
    pub fn cursor(&self) -> u64 {
        self.buf.cursor()
    }

    /// Capture an owned image of all mutable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            config: self.config,
            phase: self.phase,
            prev: self.prev,
            buf: self.buf.clone(),
            rounds: self.rounds.clone(),
            next_spawn_min: self.next_spawn_min,
            anchor_pos: self.anchor_pos,
            match_count: self.match_count,
            utf8_pending: self.utf8_pending[..self.utf8_len as usize].to_vec(),
            insts: self.prog.main.insts.len() as u32,
            groups: self.prog.group_count() as u16,
        }
    }

    /// Rebuild a matcher from a snapshot taken against the same
    /// program.
    pub fn resume(prog: &'p Program, snap: Snapshot) -> Result<Self, Error> {
        if snap.insts != prog.main.insts.len() as u32
            || snap.groups != prog.group_count() as u16
            || snap.utf8_pending.len() > 3
        {
            return Err(Error::SnapshotMismatch);
        }
        let mut utf8_pending = [0u8; 4];
        utf8_pending[..snap.utf8_pending.len()].copy_from_slice(&snap.utf8_pending);
        Ok(StreamMatcher {
            prog,
            config: snap.config,
            phase: snap.phase,
            prev: snap.prev,
            buf: snap.buf,
            rounds: snap.rounds,
            next_spawn_min: snap.next_spawn_min,
            anchor_pos: snap.anchor_pos,
            match_count: snap.match_count,
            utf8_len: snap.utf8_pending.len() as u8,
            utf8_pending,
        })
    }

    fn check_feedable(&self) -> Result<(), Error> {
        match self.phase {
            Phase::Finished => Err(Error::FeedAfterFinish),
            Phase::Done => Err(Error::FeedAfterDone),
            Phase::Idle | Phase::Feeding => Ok(()),
        }
    }

    fn idle(&self) -> bool {
        self.rounds
            .iter()
            .all(|r| r.candidate.is_none() && r.entries.is_empty())
    }

    fn feed_str(&mut self, chunk: &str, matches: &mut Vec<MatchData>) -> Result<(), Error> {
        let mut rest = chunk;
        while !rest.is_empty() {
            if self.phase != Phase::Feeding {
                break;
            }
            // With nothing live and a required leading byte, skip dead
            // scan regions wholesale.
            if self.idle() && !self.config.sticky {
                if let Some(b) = self.prog.prefilter {
                    match memchr::memchr(b, rest.as_bytes()) {
                        Some(0) => {}
                        Some(off) => {
                            self.absorb(&rest[..off]);
                            rest = &rest[off..];
                            continue;
                        }
                        None => {
                            self.absorb(rest);
                            return Ok(());
                        }
                    }
                }
            }
            let mut chars = rest.chars();
            let Some(c) = chars.next() else { break };
            self.step_char(c, matches)?;
            rest = chars.as_str();
        }
        Ok(())
    }

    /// Consume scanned-past text without simulating: no configuration
    /// is live and no match can start before the next prefilter hit.
    fn absorb(&mut self, s: &str) {
        for c in s.chars() {
            self.buf.push(c);
            self.prev = Some(c);
        }
    }

    fn step_char(&mut self, c: char, matches: &mut Vec<MatchData>) -> Result<(), Error> {
        self.phase_a(NextChar::Known(c), matches, Mode::Feed);
        if self.phase != Phase::Feeding {
            return Ok(());
        }
        let mut rounds = std::mem::take(&mut self.rounds);
        consume_rounds(&mut rounds, c, self.prog);
        self.rounds = rounds;
        self.buf.push(c);
        self.prev = Some(c);
        self.commit_ready(matches);
        self.enforce_limits()
    }

    /// Closure pass at the current position: advance arbitration with
    /// what is known about the next symbol, commit what is ready, and
    /// open a new anchor if scanning allows one here.
    fn phase_a(&mut self, next: NextChar, matches: &mut Vec<MatchData>, mode: Mode) {
        let pos = self.buf.cursor();
        let mut rounds = std::mem::take(&mut self.rounds);
        {
            let ctx = StepCtx {
                pos,
                prev: self.prev,
                next,
                buf: &self.buf,
                prog: self.prog,
            };
            process_rounds(&mut rounds, &ctx, mode);
        }
        self.rounds = rounds;
        self.commit_ready(matches);

        if mode != Mode::Peek && self.can_spawn(pos) {
            let mut rounds = std::mem::take(&mut self.rounds);
            {
                let ctx = StepCtx {
                    pos,
                    prev: self.prev,
                    next,
                    buf: &self.buf,
                    prog: self.prog,
                };
                spawn_into(&mut rounds, &ctx, mode);
            }
            self.rounds = rounds;
            self.commit_ready(matches);
        }
    }

    fn can_spawn(&self, pos: u64) -> bool {
        self.phase == Phase::Feeding
            && pos >= self.next_spawn_min
            && (!self.config.sticky || pos == self.anchor_pos)
    }

    /// Exploratory boundary pass plus trim, producing the chunk's
    /// outcome sequence.
    fn end_of_chunk(&mut self, matches: Vec<MatchData>) -> Vec<Outcome> {
        let mut matches = matches;
        if self.phase == Phase::Feeding {
            self.phase_a(NextChar::Unknown, &mut matches, Mode::Peek);
        }

        let mut rejected = false;
        if self.phase == Phase::Feeding
            && self.config.sticky
            && self.idle()
            && self.buf.cursor() > self.anchor_pos
        {
            // The anchored attempt died and no later anchor is legal.
            self.phase = Phase::Done;
            rejected = true;
        }

        let floor = self.retention_floor();
        self.buf.trim_to(floor);

        let mut outcomes: Vec<Outcome> = matches.into_iter().map(Outcome::Matched).collect();
        if rejected {
            outcomes.push(Outcome::Rejected);
        } else if self.phase == Phase::Feeding {
            outcomes.push(Outcome::Pending {
                retained: self.buf.suffix().iter().collect(),
            });
        }
        outcomes
    }

    /// Commit round-0 candidates for as long as nothing of higher
    /// priority remains, pruning later rounds against each committed
    /// end.
    fn commit_ready(&mut self, matches: &mut Vec<MatchData>) {
        loop {
            prune_rounds(&mut self.rounds);
            let r0 = &mut self.rounds[0];
            if !r0.entries.is_empty() {
                return;
            }
            let Some(cand) = r0.candidate.take() else {
                return;
            };
            if cand.start < self.next_spawn_min {
                // Overlapped by an earlier commit.
                continue;
            }
            let cut = cand.cut();
            matches.push(self.build_match(cand));
            self.match_count += 1;

            if !self.config.global {
                self.phase = Phase::Done;
                self.rounds.clear();
                self.rounds.push(Round::default());
                return;
            }
            self.next_spawn_min = cut;
            if self.config.sticky {
                self.anchor_pos = cut;
            }
            self.rounds.remove(0);
            for r in &mut self.rounds {
                r.entries.retain(|e| e.start() >= cut);
                if r.candidate.as_ref().is_some_and(|c| c.start < cut) {
                    r.candidate = None;
                }
            }
            if self.rounds.is_empty() {
                self.rounds.push(Round::default());
            }
        }
    }

    fn build_match(&self, cand: Candidate) -> MatchData {
        let Candidate { start, end, mut caps } = cand;
        let mut captures = Vec::with_capacity(self.prog.group_count());
        for g in 0..self.prog.group_count() {
            let cap = match (caps.slots[2 * g], caps.slots[2 * g + 1]) {
                (Some(s), Some(e)) if s <= e => Some(Capture {
                    span: Span::new(s, e),
                    text: caps.texts[g].take().unwrap_or_default(),
                }),
                _ => None,
            };
            captures.push(cap);
        }
        MatchData { span: Span::new(start, end), captures }
    }

    /// Minimal global offset at or after which input must be kept.
    fn retention_floor(&self) -> u64 {
        let cursor = self.buf.cursor();
        let mut floor = cursor;

        // Idle-scan baseline: the next anchor may need lookbehind
        // context behind it.
        if self.phase == Phase::Feeding {
            let anchor = if self.config.sticky {
                (self.anchor_pos >= cursor).then_some(self.anchor_pos)
            } else {
                Some(self.next_spawn_min.max(cursor))
            };
            if let Some(p) = anchor {
                let need = self.prog.main.needs[self.prog.main.start as usize];
                floor = floor.min(need_floor(p, need));
            }
        }

        for round in &self.rounds {
            for entry in &round.entries {
                let f = match entry {
                    Entry::Live(t) => thread_floor(t, self.prog, cursor),
                    Entry::Held(pm) => watches_floor(&pm.watches, self.prog, cursor),
                };
                floor = floor.min(f);
            }
        }
        floor.max(self.buf.base())
    }

    fn enforce_limits(&mut self) -> Result<(), Error> {
        let live: usize = self.rounds.iter().map(|r| r.entries.len()).sum();
        if live > MAX_LIVE {
            self.phase = Phase::Done;
            return Err(Error::TooManyThreads);
        }
        Ok(())
    }
}

/// Close and arbitrate every round at one position. Entries routed
/// past a settling candidate carry over into the following round.
fn process_rounds(rounds: &mut Vec<Round>, ctx: &StepCtx<'_>, mode: Mode) {
    let mut carry: Vec<Entry> = Vec::new();
    let mut ri = 0;
    while ri < rounds.len() || !carry.is_empty() {
        if ri == rounds.len() {
            rounds.push(Round::default());
        }
        if !carry.is_empty() {
            let mut merged = std::mem::take(&mut carry);
            merged.append(&mut rounds[ri].entries);
            rounds[ri].entries = merged;
        }
        carry = process_round(&mut rounds[ri], ctx, mode);
        ri += 1;
    }
}

fn process_round(round: &mut Round, ctx: &StepCtx<'_>, mode: Mode) -> Vec<Entry> {
    let entries = std::mem::take(&mut round.entries);
    let mut seen = vec![false; ctx.prog.main.insts.len()];
    let mut kept: Vec<Entry> = Vec::new();
    let mut promote: Vec<Entry> = Vec::new();

    let mut iter = entries.into_iter();
    'outer: while let Some(entry) = iter.next() {
        match entry {
            Entry::Held(pm) => {
                let mut watches = pm.watches.clone();
                match refresh_watches(&mut watches, ctx) {
                    Refresh::Dead => {}
                    Refresh::Deferred => kept.push(Entry::Held(pm)),
                    Refresh::Alive => {
                        if watches.is_empty() {
                            let cand = Candidate {
                                start: pm.start,
                                end: pm.end,
                                caps: pm.caps,
                            };
                            promote = settle(round, cand, &kept, iter);
                            break 'outer;
                        }
                        kept.push(Entry::Held(PendingMatch { watches, ..pm }));
                    }
                }
            }
            Entry::Live(t) => {
                let out = close_thread(&t, ctx, &mut seen);
                if out.deferred {
                    kept.push(Entry::Live(t));
                    continue;
                }
                for item in out.items {
                    match item {
                        Item::Ready(rt) => {
                            if mode != Mode::Finish {
                                kept.push(Entry::Live(rt));
                            }
                        }
                        Item::Matched { start, end, caps, watches } => {
                            if watches.is_empty() {
                                let cand = Candidate { start, end, caps };
                                promote = settle(round, cand, &kept, iter);
                                break 'outer;
                            }
                            kept.push(Entry::Held(PendingMatch {
                                start,
                                end,
                                caps,
                                watches,
                            }));
                        }
                    }
                }
            }
        }
    }
    round.entries = kept;
    promote
}

/// Install a resolved match as the round's candidate and route the
/// unprocessed lower-priority entries: anchors that could coexist with
/// some still-possible commit of this round move to the next round,
/// the rest are dominated.
fn settle(
    round: &mut Round,
    cand: Candidate,
    kept: &[Entry],
    rest: std::vec::IntoIter<Entry>,
) -> Vec<Entry> {
    let mut threshold = cand.cut();
    for e in kept {
        if let Entry::Held(pm) = e {
            threshold = threshold.min(cut(pm.start, pm.end));
        }
    }
    round.candidate = Some(cand);
    rest.filter(|e| e.start() >= threshold).collect()
}

/// Advance every entry by one consumed symbol. Threads not matching
/// the symbol die; watch resolutions surface at the next closure.
fn consume_rounds(rounds: &mut [Round], c: char, prog: &Program) {
    for round in rounds.iter_mut() {
        round.entries.retain_mut(|entry| match entry {
            Entry::Live(t) => {
                if !advance_watches(&mut t.watches, c, prog) {
                    return false;
                }
                match &prog.main.insts[t.state as usize] {
                    Inst::Char { class, next } => {
                        if prog.class(*class).contains(c) {
                            t.state = *next;
                            true
                        } else {
                            false
                        }
                    }
                    _ => {
                        debug_assert!(false, "unclosed thread at consume");
                        false
                    }
                }
            }
            Entry::Held(pm) => advance_watches(&mut pm.watches, c, prog),
        });
    }
}

/// Open a new anchor at the current position, placed after everything
/// it cannot outrank.
fn spawn_into(rounds: &mut Vec<Round>, ctx: &StepCtx<'_>, mode: Mode) {
    let pos = ctx.pos;
    let new_round = match rounds.last() {
        None => false,
        Some(last) => match &last.candidate {
            None => false,
            Some(c) => {
                if pos >= c.cut() {
                    true
                } else if last
                    .entries
                    .iter()
                    .any(|e| matches!(e, Entry::Held(_)))
                {
                    // The candidate may yet be displaced by an earlier
                    // held match; keep the anchor speculatively.
                    true
                } else {
                    return;
                }
            }
        },
    };
    if rounds.is_empty() || new_round {
        rounds.push(Round::default());
    }

    let t = spawn(ctx.prog, pos);
    let mut seen = vec![false; ctx.prog.main.insts.len()];
    let out = close_thread(&t, ctx, &mut seen);
    let Some(round) = rounds.last_mut() else { return };
    if out.deferred {
        round.entries.push(Entry::Live(t));
        return;
    }
    for item in out.items {
        match item {
            Item::Ready(rt) => {
                if mode != Mode::Finish {
                    round.entries.push(Entry::Live(rt));
                }
            }
            Item::Matched { start, end, caps, watches } => {
                if watches.is_empty() {
                    if round.candidate.is_none() {
                        round.candidate = Some(Candidate { start, end, caps });
                    }
                    break;
                }
                round.entries.push(Entry::Held(PendingMatch { start, end, caps, watches }));
            }
        }
    }
}

/// Collapse rounds that no longer separate anything: a round without a
/// candidate has no commit for its successor to wait behind.
fn prune_rounds(rounds: &mut Vec<Round>) {
    if rounds.is_empty() {
        rounds.push(Round::default());
        return;
    }
    let mut i = 0;
    while i + 1 < rounds.len() {
        if rounds[i].candidate.is_none() {
            let next = rounds.remove(i + 1);
            let r = &mut rounds[i];
            r.entries.extend(next.entries);
            r.candidate = next.candidate;
        } else {
            i += 1;
        }
    }
}

/// Match a complete text in one shot: feed everything, then finish.
/// The committed matches are exactly what chunked feeding of the same
/// text would produce.
pub fn find_all(prog: &Program, text: &str, config: Config) -> Result<Vec<MatchData>, Error> {
    let mut matcher = StreamMatcher::new(prog, config)?;
    let mut out = Vec::new();
    let fed = matcher.feed(text)?;
    let fin = matcher.finish()?;
    for outcome in fed.into_iter().chain(fin) {
        if let Outcome::Matched(m) = outcome {
            out.push(m);
        }
    }
    Ok(out)
}
