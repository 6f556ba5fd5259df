//! Automaton simulation: threads, epsilon closure, lookaround.
//!
//! A thread is one live configuration: an instruction pointer, the
//! global offset its match attempt started at, its capture slots, and
//! any deferred lookahead watches. Threads are advanced one code point
//! at a time in priority order; the ordering encodes leftmost-first
//! semantics, so no backtracking is ever needed.
//!
//! Assertions are evaluated during epsilon closure with one symbol of
//! context on each side. When the right-hand symbol is not known yet
//! (closure at a chunk boundary) a next-dependent assertion defers the
//! whole closure instead of guessing; the caller keeps the unclosed
//! thread and retries when the next chunk (or end of input) arrives.
//! Lookbehind is evaluated immediately against retained text with a
//! reversed sub-automaton; lookahead becomes a watch, a sub-simulation
//! advanced in lockstep with the main input that kills or confirms its
//! owning thread once it resolves.

use crate::class::is_word_char;
use crate::program::{AssertKind, Inst, Look, Program, UNBOUNDED};
use crate::retain::RetainBuffer;

/// The symbol to the right of the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NextChar {
    Known(char),
    /// End of the whole stream.
    Eof,
    /// End of the current chunk; more input may follow.
    Unknown,
}

/// Shared context for one closure/step position.
pub(crate) struct StepCtx<'a> {
    /// Global offset the closure runs at.
    pub(crate) pos: u64,
    /// Symbol just before `pos`, if any was consumed.
    pub(crate) prev: Option<char>,
    pub(crate) next: NextChar,
    pub(crate) buf: &'a RetainBuffer,
    pub(crate) prog: &'a Program,
}

/// Capture slots plus texts copied out at capture-close time.
///
/// Slots are global offsets; slot `2g` opens group `g`, slot `2g+1`
/// closes it. The text is copied when the close slot is written, since
/// the retained buffer may discard the range afterwards.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct Captures {
    pub(crate) slots: Vec<Option<u64>>,
    pub(crate) texts: Vec<Option<String>>,
}

impl Captures {
    pub(crate) fn new(groups: usize) -> Self {
        Self {
            slots: vec![None; groups * 2],
            texts: vec![None; groups],
        }
    }

    fn set(&mut self, slot: u16, pos: u64, buf: &RetainBuffer) {
        let slot = slot as usize;
        self.slots[slot] = Some(pos);
        if slot % 2 == 1 {
            if let Some(start) = self.slots[slot - 1] {
                self.texts[slot / 2] = Some(buf.copy_range(start, pos));
            }
        }
    }
}

/// One live sub-configuration of a lookahead simulation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct SubThread {
    pub(crate) state: u32,
    /// Lookahead nested inside lookahead.
    pub(crate) watches: Vec<Watch>,
}

/// A deferred lookahead attached to a thread (or pending match).
///
/// Created when closure reaches a lookahead assertion that cannot
/// resolve from input seen so far. The sub-simulation consumes the
/// same symbols as the main input; the watch resolves when a sub
/// configuration accepts (satisfied if positive, fatal if negative) or
/// when all sub configurations die (the reverse).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct Watch {
    pub(crate) look: u16,
    pub(crate) positive: bool,
    pub(crate) subs: Vec<SubThread>,
}

/// One live configuration of the main automaton.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct Thread {
    pub(crate) state: u32,
    /// Global offset this match attempt is anchored at.
    pub(crate) start: u64,
    pub(crate) caps: Box<Captures>,
    pub(crate) watches: Vec<Watch>,
}

/// A fresh thread anchored at `pos`, not yet closed.
pub(crate) fn spawn(prog: &Program, pos: u64) -> Thread {
    Thread {
        state: prog.main.start,
        start: pos,
        caps: Box::new(Captures::new(prog.group_count())),
        watches: Vec::new(),
    }
}

/// One closure result, in priority order.
#[derive(Debug)]
pub(crate) enum Item {
    /// Parked at a consuming instruction, waiting for input.
    Ready(Thread),
    /// Reached the accepting state at `end`. Provisional while
    /// `watches` is non-empty.
    Matched {
        start: u64,
        end: u64,
        caps: Box<Captures>,
        watches: Vec<Watch>,
    },
}

/// Result of closing one thread.
#[derive(Debug, Default)]
pub(crate) struct CloseOut {
    pub(crate) items: Vec<Item>,
    /// A next-dependent assertion was hit while the next symbol is
    /// unknown; `items` must be discarded and the original thread kept.
    pub(crate) deferred: bool,
}

impl CloseOut {
    fn deferred() -> Self {
        CloseOut { items: Vec::new(), deferred: true }
    }
}

/// How watches fared against the current context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refresh {
    /// Everything consistent so far (some watches may have resolved
    /// and been removed).
    Alive,
    /// A watch failed; the owner dies.
    Dead,
    /// A sub closure hit a next-dependent assertion with the next
    /// symbol unknown.
    Deferred,
}

enum Flow {
    More,
    /// A watch-free accept was reached; lower-priority branches of
    /// this entry are dominated.
    Cut,
    Deferred,
}

/// Epsilon-close one thread against the current position.
///
/// `seen` is the per-batch dedup table over main-automaton states:
/// once a watch-free thread parks on a consuming state, any later
/// (lower-priority) watch-free arrival at the same state is dominated.
/// Watch-carrying threads neither mark nor honor it, since their
/// survival is not yet decided.
pub(crate) fn close_thread(t: &Thread, ctx: &StepCtx<'_>, seen: &mut [bool]) -> CloseOut {
    let mut watches = t.watches.clone();
    match refresh_watches(&mut watches, ctx) {
        Refresh::Dead => return CloseOut::default(),
        Refresh::Deferred => return CloseOut::deferred(),
        Refresh::Alive => {}
    }

    let mut closer = Closer {
        ctx,
        seen,
        visited: vec![false; ctx.prog.main.insts.len()],
        items: Vec::new(),
        marked: Vec::new(),
        start: t.start,
    };
    match closer.add(t.state, t.caps.clone(), watches) {
        Flow::Deferred => {
            // The caller keeps the unclosed thread; undo the dedup
            // marks so lower-priority entries are not shadowed by
            // discarded results.
            for idx in closer.marked {
                closer.seen[idx] = false;
            }
            CloseOut::deferred()
        }
        _ => CloseOut { items: closer.items, deferred: false },
    }
}

struct Closer<'a, 'b> {
    ctx: &'a StepCtx<'b>,
    seen: &'a mut [bool],
    visited: Vec<bool>,
    items: Vec<Item>,
    marked: Vec<usize>,
    start: u64,
}

impl Closer<'_, '_> {
    fn add(&mut self, state: u32, caps: Box<Captures>, watches: Vec<Watch>) -> Flow {
        let idx = state as usize;
        if self.visited[idx] {
            return Flow::More;
        }
        self.visited[idx] = true;

        match &self.ctx.prog.main.insts[idx] {
            Inst::Char { .. } => {
                let free = watches.is_empty();
                if free {
                    if self.seen[idx] {
                        return Flow::More;
                    }
                    self.seen[idx] = true;
                    self.marked.push(idx);
                }
                self.items.push(Item::Ready(Thread {
                    state,
                    start: self.start,
                    caps,
                    watches,
                }));
                Flow::More
            }
            Inst::Split { primary, secondary } => {
                let (primary, secondary) = (*primary, *secondary);
                match self.add(primary, caps.clone(), watches.clone()) {
                    Flow::More => self.add(secondary, caps, watches),
                    other => other,
                }
            }
            Inst::Save { slot, next } => {
                let (slot, next) = (*slot, *next);
                let mut caps = caps;
                caps.set(slot, self.ctx.pos, self.ctx.buf);
                self.add(next, caps, watches)
            }
            Inst::Assert { kind, next } => {
                let (kind, next) = (*kind, *next);
                match eval_assert(kind, self.ctx) {
                    AssertOut::Pass => self.add(next, caps, watches),
                    AssertOut::Fail => Flow::More,
                    AssertOut::Defer => Flow::Deferred,
                    AssertOut::Watch(w) => {
                        let mut watches = watches;
                        watches.push(w);
                        self.add(next, caps, watches)
                    }
                }
            }
            Inst::Match => {
                let cut = watches.is_empty();
                self.items.push(Item::Matched {
                    start: self.start,
                    end: self.ctx.pos,
                    caps,
                    watches,
                });
                if cut {
                    Flow::Cut
                } else {
                    Flow::More
                }
            }
        }
    }
}

enum AssertOut {
    Pass,
    Fail,
    Defer,
    Watch(Watch),
}

fn eval_assert(kind: AssertKind, ctx: &StepCtx<'_>) -> AssertOut {
    match kind {
        AssertKind::StreamStart => {
            if ctx.pos == 0 {
                AssertOut::Pass
            } else {
                AssertOut::Fail
            }
        }
        AssertKind::StreamEnd => match ctx.next {
            NextChar::Known(_) => AssertOut::Fail,
            NextChar::Eof => AssertOut::Pass,
            NextChar::Unknown => AssertOut::Defer,
        },
        AssertKind::WordBoundary | AssertKind::NotWordBoundary => {
            let before = ctx.prev.map(is_word_char).unwrap_or(false);
            let after = match ctx.next {
                NextChar::Known(c) => is_word_char(c),
                NextChar::Eof => false,
                NextChar::Unknown => return AssertOut::Defer,
            };
            let boundary = before != after;
            let want = kind == AssertKind::WordBoundary;
            if boundary == want {
                AssertOut::Pass
            } else {
                AssertOut::Fail
            }
        }
        AssertKind::Look(id) => {
            let look = &ctx.prog.looks[id as usize];
            if look.behind {
                let hit = lookbehind_hits(ctx.prog, look, ctx.pos, ctx.buf);
                if hit == look.positive {
                    AssertOut::Pass
                } else {
                    AssertOut::Fail
                }
            } else {
                make_watch(id, look, ctx)
            }
        }
    }
}

/// Open a lookahead at the current position: run the sub closure with
/// what is known so far and either resolve immediately or park a watch.
fn make_watch(id: u16, look: &Look, ctx: &StepCtx<'_>) -> AssertOut {
    let mut out = SubCloseOut::default();
    let mut visited = vec![false; look.auto.insts.len()];
    sub_add(look, look.auto.start, Vec::new(), ctx, &mut visited, &mut out);

    if out.deferred {
        return AssertOut::Defer;
    }
    if out.matched {
        return if look.positive { AssertOut::Pass } else { AssertOut::Fail };
    }
    if out.subs.is_empty() || ctx.next == NextChar::Eof {
        return if look.positive { AssertOut::Fail } else { AssertOut::Pass };
    }
    // A known next symbol may already decide the whole lookahead one
    // step early; only genuinely future-dependent outcomes park a
    // watch.
    if let NextChar::Known(c) = ctx.next {
        if let Some(hit) = step_decides(look, &out.subs, c, ctx.prog) {
            return if hit == look.positive {
                AssertOut::Pass
            } else {
                AssertOut::Fail
            };
        }
    }
    AssertOut::Watch(Watch {
        look: id,
        positive: look.positive,
        subs: out.subs,
    })
}

/// Step freshly opened sub configurations against the known next
/// symbol without committing the step. `Some(true)` when an accept is
/// certain, `Some(false)` when every configuration dies, `None` when
/// the outcome still depends on later input.
fn step_decides(look: &Look, subs: &[SubThread], c: char, prog: &Program) -> Option<bool> {
    let mut undecided = false;
    for sub in subs {
        if !sub.watches.is_empty() {
            // Nested watches resolve on their own schedule.
            undecided = true;
            continue;
        }
        match &look.auto.insts[sub.state as usize] {
            Inst::Char { class, next } => {
                if prog.class(*class).contains(c) {
                    let mut visited = vec![false; look.auto.insts.len()];
                    match eps_outcome(&look.auto, *next, &mut visited) {
                        EpsOutcome::Accept => return Some(true),
                        EpsOutcome::Undecided => undecided = true,
                        EpsOutcome::Dead => {}
                    }
                }
            }
            _ => undecided = true,
        }
    }
    if undecided {
        None
    } else {
        Some(false)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum EpsOutcome {
    Accept,
    Undecided,
    Dead,
}

/// Zero-width walk one symbol ahead of the current position.
/// Assertions there cannot be evaluated yet, so they count as
/// undecided rather than pass or fail.
fn eps_outcome(
    auto: &crate::program::Automaton,
    state: u32,
    visited: &mut [bool],
) -> EpsOutcome {
    let idx = state as usize;
    if visited[idx] {
        return EpsOutcome::Dead;
    }
    visited[idx] = true;
    match &auto.insts[idx] {
        Inst::Match => EpsOutcome::Accept,
        Inst::Char { .. } | Inst::Assert { .. } => EpsOutcome::Undecided,
        Inst::Save { next, .. } => eps_outcome(auto, *next, visited),
        Inst::Split { primary, secondary } => match eps_outcome(auto, *primary, visited) {
            EpsOutcome::Accept => EpsOutcome::Accept,
            p => match eps_outcome(auto, *secondary, visited) {
                EpsOutcome::Accept => EpsOutcome::Accept,
                s => {
                    if p == EpsOutcome::Undecided || s == EpsOutcome::Undecided {
                        EpsOutcome::Undecided
                    } else {
                        EpsOutcome::Dead
                    }
                }
            },
        },
    }
}

#[derive(Debug, Default)]
struct SubCloseOut {
    subs: Vec<SubThread>,
    matched: bool,
    deferred: bool,
}

/// Epsilon closure inside a lookahead sub-automaton. Existence check
/// only: the first accept cuts the search.
fn sub_add(
    look: &Look,
    state: u32,
    watches: Vec<Watch>,
    ctx: &StepCtx<'_>,
    visited: &mut [bool],
    out: &mut SubCloseOut,
) {
    if out.matched || out.deferred {
        return;
    }
    let idx = state as usize;
    if visited[idx] {
        return;
    }
    visited[idx] = true;

    match &look.auto.insts[idx] {
        Inst::Char { .. } => {
            out.subs.push(SubThread { state, watches });
        }
        Inst::Split { primary, secondary } => {
            let (primary, secondary) = (*primary, *secondary);
            sub_add(look, primary, watches.clone(), ctx, visited, out);
            sub_add(look, secondary, watches, ctx, visited, out);
        }
        // Captures are rejected inside lookaround at compile time.
        Inst::Save { next, .. } => {
            let next = *next;
            sub_add(look, next, watches, ctx, visited, out);
        }
        Inst::Assert { kind, next } => {
            let (kind, next) = (*kind, *next);
            match eval_assert(kind, ctx) {
                AssertOut::Pass => sub_add(look, next, watches, ctx, visited, out),
                AssertOut::Fail => {}
                AssertOut::Defer => out.deferred = true,
                AssertOut::Watch(w) => {
                    let mut watches = watches;
                    watches.push(w);
                    sub_add(look, next, watches, ctx, visited, out);
                }
            }
        }
        Inst::Match => {
            if watches.is_empty() {
                out.matched = true;
            } else {
                // Accept conditioned on nested watches: keep it live as
                // a parked accept by not marking matched; nested
                // lookahead continues through the carried watches.
                out.subs.push(SubThread { state, watches });
            }
        }
    }
}

/// Re-close every watch's sub-simulation against the current context,
/// removing watches that resolve satisfied.
pub(crate) fn refresh_watches(watches: &mut Vec<Watch>, ctx: &StepCtx<'_>) -> Refresh {
    let mut dead = false;
    let mut deferred = false;

    watches.retain_mut(|w| {
        if dead || deferred {
            return true;
        }
        let look = &ctx.prog.looks[w.look as usize];
        let mut out = SubCloseOut::default();
        let mut visited = vec![false; look.auto.insts.len()];
        for sub in std::mem::take(&mut w.subs) {
            let mut nested = sub.watches;
            match refresh_watches(&mut nested, ctx) {
                Refresh::Dead => continue,
                Refresh::Deferred => {
                    deferred = true;
                    return true;
                }
                Refresh::Alive => {}
            }
            if nested.is_empty() {
                sub_add(look, sub.state, Vec::new(), ctx, &mut visited, &mut out);
            } else {
                // Still conditional on nested watches; closed apart so
                // it is not deduplicated against unconditional subs.
                let mut own = vec![false; look.auto.insts.len()];
                sub_add(look, sub.state, nested, ctx, &mut own, &mut out);
            }
            if out.deferred {
                deferred = true;
                return true;
            }
            if out.matched {
                break;
            }
        }
        if out.matched {
            if w.positive {
                false
            } else {
                dead = true;
                true
            }
        } else if out.subs.is_empty() || ctx.next == NextChar::Eof {
            if w.positive {
                dead = true;
                true
            } else {
                false
            }
        } else {
            w.subs = out.subs;
            true
        }
    });

    if deferred {
        Refresh::Deferred
    } else if dead {
        Refresh::Dead
    } else {
        Refresh::Alive
    }
}

/// Advance every watch by one consumed symbol.
///
/// Returns false when a watch fails outright (positive with no sub
/// configurations left). Negative watches whose subs all die resolve
/// satisfied and are removed; accepts are detected at the next refresh.
pub(crate) fn advance_watches(watches: &mut Vec<Watch>, c: char, prog: &Program) -> bool {
    let mut dead = false;
    watches.retain_mut(|w| {
        if dead {
            return true;
        }
        let look = &prog.looks[w.look as usize];
        let mut next_subs = Vec::new();
        for mut sub in std::mem::take(&mut w.subs) {
            if !advance_watches(&mut sub.watches, c, prog) {
                continue;
            }
            match &look.auto.insts[sub.state as usize] {
                Inst::Char { class, next } => {
                    if prog.class(*class).contains(c) {
                        next_subs.push(SubThread { state: *next, watches: sub.watches });
                    }
                }
                // A parked conditional accept stays put; it resolves
                // once its nested watches do.
                Inst::Match => next_subs.push(sub),
                _ => debug_assert!(false, "unparked sub-thread"),
            }
        }
        if next_subs.is_empty() {
            if w.positive {
                dead = true;
                true
            } else {
                false
            }
        } else {
            w.subs = next_subs;
            true
        }
    });
    !dead
}

/// Evaluate a lookbehind at `pos`: simulate the reversed body backwards
/// over retained text. Retention analysis guarantees the needed range
/// is still buffered; running out of text means no match.
pub(crate) fn lookbehind_hits(prog: &Program, look: &Look, pos: u64, buf: &RetainBuffer) -> bool {
    let auto = &look.auto;
    let max_d = if look.max_w == UNBOUNDED {
        u64::MAX
    } else {
        look.max_w as u64
    };

    let mut frontier: Vec<u32> = Vec::new();
    if rev_close(prog, auto, auto.start, pos, 0, &mut frontier) {
        return true;
    }
    let mut d: u64 = 0;
    while !frontier.is_empty() && d < max_d && pos > d {
        let Some(ch) = buf.char_at(pos - d - 1) else {
            return false;
        };
        d += 1;
        let mut next = Vec::new();
        for state in frontier {
            if let Inst::Char { class, next: n } = &auto.insts[state as usize] {
                if prog.class(*class).contains(ch)
                    && rev_close(prog, auto, *n, pos, d, &mut next)
                {
                    return true;
                }
            }
        }
        frontier = next;
    }
    false
}

/// Epsilon closure in a reversed lookbehind automaton, `d` symbols
/// behind `pos`. Returns true on accept. The start anchor holds when
/// the backward walk has reached the beginning of the stream.
fn rev_close(
    prog: &Program,
    auto: &crate::program::Automaton,
    state: u32,
    pos: u64,
    d: u64,
    frontier: &mut Vec<u32>,
) -> bool {
    match &auto.insts[state as usize] {
        Inst::Char { .. } => {
            if !frontier.contains(&state) {
                frontier.push(state);
            }
            false
        }
        Inst::Split { primary, secondary } => {
            rev_close(prog, auto, *primary, pos, d, frontier)
                || rev_close(prog, auto, *secondary, pos, d, frontier)
        }
        Inst::Save { next, .. } => rev_close(prog, auto, *next, pos, d, frontier),
        Inst::Assert { kind, next } => match kind {
            AssertKind::StreamStart => {
                pos == d && rev_close(prog, auto, *next, pos, d, frontier)
            }
            // Other assertions are rejected inside lookbehind at
            // compile time.
            _ => false,
        },
        Inst::Match => true,
    }
}

/// Earliest global offset this thread could still reference: its own
/// anchor (open captures copy from there) and its state's lookbehind
/// need, plus anything its watches need.
pub(crate) fn thread_floor(t: &Thread, prog: &Program, cursor: u64) -> u64 {
    let state_floor = need_floor(cursor, prog.main.needs[t.state as usize]);
    t.start
        .min(state_floor)
        .min(watches_floor(&t.watches, prog, cursor))
}

/// Earliest offset any watch sub-simulation could still reference.
pub(crate) fn watches_floor(watches: &[Watch], prog: &Program, cursor: u64) -> u64 {
    let mut floor = u64::MAX;
    for w in watches {
        let look = &prog.looks[w.look as usize];
        for sub in &w.subs {
            floor = floor.min(need_floor(cursor, look.auto.needs[sub.state as usize]));
            floor = floor.min(watches_floor(&sub.watches, prog, cursor));
        }
    }
    floor
}

pub(crate) fn need_floor(cursor: u64, need: u32) -> u64 {
    if need == UNBOUNDED {
        0
    } else {
        cursor.saturating_sub(need as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Expr, Program};

    fn ctx<'a>(
        pos: u64,
        prev: Option<char>,
        next: NextChar,
        buf: &'a RetainBuffer,
        prog: &'a Program,
    ) -> StepCtx<'a> {
        StepCtx { pos, prev, next, buf, prog }
    }

    fn fill(buf: &mut RetainBuffer, s: &str) {
        for c in s.chars() {
            buf.push(c);
        }
    }

    #[test]
    fn test_close_parks_on_char() {
        let prog = Program::compile(&Expr::literal("ab")).unwrap();
        let buf = RetainBuffer::new();
        let t = spawn(&prog, 0);
        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(0, None, NextChar::Known('a'), &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        assert!(!out.deferred);
        assert_eq!(out.items.len(), 1);
        match &out.items[0] {
            Item::Ready(t) => {
                assert!(matches!(prog.main.insts[t.state as usize], Inst::Char { .. }));
                // Group 0 opened at the anchor.
                assert_eq!(t.caps.slots[0], Some(0));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_close_harvests_match() {
        let prog = Program::compile(&Expr::literal("a")).unwrap();
        let mut buf = RetainBuffer::new();
        fill(&mut buf, "a");
        // Thread that already consumed 'a': sits past the Char inst.
        let mut t = spawn(&prog, 0);
        let mut seen = vec![false; prog.main.insts.len()];
        let c0 = ctx(0, None, NextChar::Known('a'), &buf, &prog);
        let out = close_thread(&t, &c0, &mut seen);
        let Item::Ready(parked) = &out.items[0] else { panic!() };
        if let Inst::Char { next, .. } = prog.main.insts[parked.state as usize] {
            t = parked.clone();
            t.state = next;
        } else {
            panic!();
        }
        let mut seen = vec![false; prog.main.insts.len()];
        let c1 = ctx(1, Some('a'), NextChar::Eof, &buf, &prog);
        let out = close_thread(&t, &c1, &mut seen);
        match &out.items[0] {
            Item::Matched { start, end, caps, watches } => {
                assert_eq!((*start, *end), (0, 1));
                assert!(watches.is_empty());
                assert_eq!(caps.texts[0].as_deref(), Some("a"));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_stream_end_defers_on_unknown() {
        let prog =
            Program::compile(&Expr::seq(vec![Expr::literal("a"), Expr::StreamEnd])).unwrap();
        let mut buf = RetainBuffer::new();
        fill(&mut buf, "a");
        let mut t = spawn(&prog, 0);
        // Move past the 'a'.
        t.state = {
            let mut s = prog.main.start;
            loop {
                match prog.main.insts[s as usize] {
                    Inst::Save { next, .. } => s = next,
                    Inst::Char { next, .. } => break next,
                    _ => panic!(),
                }
            }
        };
        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(1, Some('a'), NextChar::Unknown, &buf, &prog);
        assert!(close_thread(&t, &c, &mut seen).deferred);

        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(1, Some('a'), NextChar::Eof, &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        assert!(!out.deferred);
        assert!(matches!(out.items[0], Item::Matched { .. }));
    }

    #[test]
    fn test_lookahead_watch_lifecycle() {
        // a(?=bc)
        let prog = Program::compile(&Expr::seq(vec![
            Expr::literal("a"),
            Expr::literal("bc").ahead(),
        ]))
        .unwrap();
        let mut buf = RetainBuffer::new();
        fill(&mut buf, "a");
        let mut t = spawn(&prog, 0);
        t.state = {
            let mut s = prog.main.start;
            loop {
                match prog.main.insts[s as usize] {
                    Inst::Save { next, .. } => s = next,
                    Inst::Char { next, .. } => break next,
                    _ => panic!(),
                }
            }
        };
        // Close at pos 1 with next 'b': the lookahead cannot resolve,
        // so the accept is provisional with one watch.
        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(1, Some('a'), NextChar::Known('b'), &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        let Item::Matched { watches, .. } = &out.items[0] else { panic!() };
        assert_eq!(watches.len(), 1);

        // Feeding 'b' then 'c' resolves the watch at refresh.
        let mut ws = watches.clone();
        assert!(advance_watches(&mut ws, 'b', &prog));
        buf.push('b');
        let c = ctx(2, Some('b'), NextChar::Known('c'), &buf, &prog);
        assert_eq!(refresh_watches(&mut ws, &c), Refresh::Alive);
        assert!(!ws.is_empty());
        assert!(advance_watches(&mut ws, 'c', &prog));
        buf.push('c');
        let c = ctx(3, Some('c'), NextChar::Eof, &buf, &prog);
        assert_eq!(refresh_watches(&mut ws, &c), Refresh::Alive);
        assert!(ws.is_empty(), "positive lookahead should have resolved");

        // Feeding 'x' instead kills it.
        let Item::Matched { watches, .. } = &out.items[0] else { panic!() };
        let mut ws = watches.clone();
        assert!(advance_watches(&mut ws, 'b', &prog));
        assert!(!advance_watches(&mut ws, 'x', &prog));
    }

    #[test]
    fn test_negative_lookahead_resolves_at_eof() {
        // a(?!b)
        let prog = Program::compile(&Expr::seq(vec![
            Expr::literal("a"),
            Expr::literal("b").not_ahead(),
        ]))
        .unwrap();
        let mut buf = RetainBuffer::new();
        fill(&mut buf, "a");
        let t = {
            let mut t = spawn(&prog, 0);
            t.state = {
                let mut s = prog.main.start;
                loop {
                    match prog.main.insts[s as usize] {
                        Inst::Save { next, .. } => s = next,
                        Inst::Char { next, .. } => break next,
                        _ => panic!(),
                    }
                }
            };
            t
        };
        // At EOF the negative lookahead trivially holds.
        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(1, Some('a'), NextChar::Eof, &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        let Item::Matched { watches, .. } = &out.items[0] else { panic!() };
        assert!(watches.is_empty());

        // With 'b' next it fails outright.
        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(1, Some('a'), NextChar::Known('b'), &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        assert!(out.items.is_empty());
    }

    #[test]
    fn test_single_char_lookahead_decided_by_next_symbol() {
        // a(?=b): one known symbol settles the whole assertion, so no
        // watch is parked in either direction.
        let prog = Program::compile(&Expr::seq(vec![
            Expr::literal("a"),
            Expr::literal("b").ahead(),
        ]))
        .unwrap();
        let mut buf = RetainBuffer::new();
        fill(&mut buf, "a");
        let t = {
            let mut t = spawn(&prog, 0);
            t.state = {
                let mut s = prog.main.start;
                loop {
                    match prog.main.insts[s as usize] {
                        Inst::Save { next, .. } => s = next,
                        Inst::Char { next, .. } => break next,
                        _ => panic!(),
                    }
                }
            };
            t
        };
        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(1, Some('a'), NextChar::Known('b'), &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        let Item::Matched { watches, .. } = &out.items[0] else { panic!() };
        assert!(watches.is_empty());

        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(1, Some('a'), NextChar::Known('x'), &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        assert!(out.items.is_empty());
    }

    #[test]
    fn test_lookbehind_hits() {
        // Reversed body of (?<=ab)
        let prog = Program::compile(&Expr::seq(vec![
            Expr::literal("ab").behind(),
            Expr::literal("c"),
        ]))
        .unwrap();
        let look = &prog.looks[0];
        let mut buf = RetainBuffer::new();
        fill(&mut buf, "xab");
        assert!(lookbehind_hits(&prog, look, 3, &buf));
        assert!(!lookbehind_hits(&prog, look, 2, &buf));
        assert!(!lookbehind_hits(&prog, look, 1, &buf));
        assert!(!lookbehind_hits(&prog, look, 0, &buf));
    }

    #[test]
    fn test_lookbehind_anchor() {
        // (?<=^a)b: holds only right after an 'a' at stream start.
        let prog = Program::compile(&Expr::seq(vec![
            Expr::seq(vec![Expr::StreamStart, Expr::literal("a")]).behind(),
            Expr::literal("b"),
        ]))
        .unwrap();
        let look = &prog.looks[0];
        let mut buf = RetainBuffer::new();
        fill(&mut buf, "aa");
        assert!(lookbehind_hits(&prog, look, 1, &buf));
        assert!(!lookbehind_hits(&prog, look, 2, &buf));
    }

    #[test]
    fn test_epsilon_cycle_terminates() {
        // (a*)* closes without spinning.
        let prog = Program::compile(&Expr::literal("a").star().star()).unwrap();
        let buf = RetainBuffer::new();
        let t = spawn(&prog, 0);
        let mut seen = vec![false; prog.main.insts.len()];
        let c = ctx(0, None, NextChar::Known('a'), &buf, &prog);
        let out = close_thread(&t, &c, &mut seen);
        assert!(!out.deferred);
        // An empty accept plus a parked consuming state, in some order.
        assert!(out.items.iter().any(|i| matches!(i, Item::Matched { .. })));
    }

    #[test]
    fn test_thread_floor_tracks_lookbehind() {
        let prog = Program::compile(&Expr::seq(vec![
            Expr::literal("ab").behind(),
            Expr::literal("c"),
        ]))
        .unwrap();
        let t = spawn(&prog, 5);
        // At the entry state the worst future lookbehind need is 2.
        assert_eq!(thread_floor(&t, &prog, 5), 3);
        // The anchor dominates when it is earlier.
        let t = spawn(&prog, 1);
        assert_eq!(thread_floor(&t, &prog, 5), 1);
    }
}
