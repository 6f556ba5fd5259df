//! Pattern compilation: expression tree to immutable automaton.
//!
//! Patterns are built programmatically as an [`Expr`] tree (the seam to
//! an external syntax parser) and compiled into a [`Program`]: a flat
//! Thompson-style instruction list over Unicode code points, plus
//! sub-automata for lookaround, a shared character-class pool, and the
//! compile-time retention analysis (per-state maximum lookbehind width).
//!
//! A `Program` is immutable after compile and shared read-only across
//! any number of matcher instances.
//!
//! Greediness is encoded structurally: `Split` tries `primary` before
//! `secondary`, and thread priority order is preserved throughout the
//! simulation, which yields leftmost-first semantics without
//! backtracking.

use crate::class::CharClass;

/// Sentinel for an unbounded lookbehind width.
pub(crate) const UNBOUNDED: u32 = u32::MAX;

/// Hard cap on capture groups per pattern.
const MAX_GROUPS: u16 = 512;

/// Pattern expression tree.
///
/// Built by the caller (or an external syntax parser) and handed to
/// [`Program::compile`]. Convenience builders cover the common shapes:
///
/// ```
/// use seam_core::program::Expr;
/// // ab+(?=b)
/// let expr = Expr::seq(vec![
///     Expr::literal("a"),
///     Expr::literal("b").plus(),
///     Expr::literal("b").ahead(),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Matches the empty string.
    Empty,
    /// A sequence of literal code points.
    Literal(String),
    /// One code point from a character class.
    Class(CharClass),
    /// Any single code point (`.` with dotall).
    Any,
    /// Concatenation, in order.
    Concat(Vec<Expr>),
    /// Ordered alternation; earlier branches are preferred.
    Alt(Vec<Expr>),
    /// Repetition. `max: None` means unbounded.
    Repeat {
        expr: Box<Expr>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
    /// Non-capturing group.
    Group(Box<Expr>),
    /// Capturing group, optionally named.
    Capture {
        expr: Box<Expr>,
        name: Option<String>,
    },
    /// Lookahead (`(?=..)` / `(?!..)`).
    Lookahead { expr: Box<Expr>, positive: bool },
    /// Lookbehind (`(?<=..)` / `(?<!..)`).
    Lookbehind { expr: Box<Expr>, positive: bool },
    /// Start-of-stream anchor (`^`).
    StreamStart,
    /// End-of-stream anchor (`$`).
    StreamEnd,
    /// Word boundary (`\b`).
    WordBoundary,
    /// Negated word boundary (`\B`).
    NotWordBoundary,
}

impl Expr {
    /// A literal sequence of code points.
    pub fn literal(s: &str) -> Expr {
        Expr::Literal(s.to_string())
    }

    /// One code point from a class.
    pub fn class(c: CharClass) -> Expr {
        Expr::Class(c)
    }

    /// Concatenation.
    pub fn seq(items: Vec<Expr>) -> Expr {
        Expr::Concat(items)
    }

    /// Ordered alternation.
    pub fn alt(items: Vec<Expr>) -> Expr {
        Expr::Alt(items)
    }

    /// Greedy `*`.
    pub fn star(self) -> Expr {
        self.repeat(0, None, true)
    }

    /// Greedy `+`.
    pub fn plus(self) -> Expr {
        self.repeat(1, None, true)
    }

    /// Greedy `?`.
    pub fn opt(self) -> Expr {
        self.repeat(0, Some(1), true)
    }

    /// General repetition; `max: None` is unbounded.
    pub fn repeat(self, min: u32, max: Option<u32>, greedy: bool) -> Expr {
        Expr::Repeat {
            expr: Box::new(self),
            min,
            max,
            greedy,
        }
    }

    /// Unnamed capturing group.
    pub fn capture(self) -> Expr {
        Expr::Capture {
            expr: Box::new(self),
            name: None,
        }
    }

    /// Named capturing group.
    pub fn named(self, name: &str) -> Expr {
        Expr::Capture {
            expr: Box::new(self),
            name: Some(name.to_string()),
        }
    }

    /// Positive lookahead `(?=self)`.
    pub fn ahead(self) -> Expr {
        Expr::Lookahead {
            expr: Box::new(self),
            positive: true,
        }
    }

    /// Negative lookahead `(?!self)`.
    pub fn not_ahead(self) -> Expr {
        Expr::Lookahead {
            expr: Box::new(self),
            positive: false,
        }
    }

    /// Positive lookbehind `(?<=self)`.
    pub fn behind(self) -> Expr {
        Expr::Lookbehind {
            expr: Box::new(self),
            positive: true,
        }
    }

    /// Negative lookbehind `(?<!self)`.
    pub fn not_behind(self) -> Expr {
        Expr::Lookbehind {
            expr: Box::new(self),
            positive: false,
        }
    }
}

/// Pattern compilation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileError {
    /// Capturing groups are not supported inside lookaround.
    CaptureInLookaround,
    /// Lookaround nested inside lookbehind.
    LookaroundInLookbehind,
    /// Assertion not supported inside lookbehind (`$`, `\b`, `\B`).
    AssertInLookbehind,
    /// Capture-group count exceeds the per-pattern cap.
    TooManyGroups,
}

impl CompileError {
    /// Human-readable message for this error.
    pub fn message(self) -> &'static str {
        match self {
            Self::CaptureInLookaround => "capture group inside lookaround",
            Self::LookaroundInLookbehind => "lookaround nested inside lookbehind",
            Self::AssertInLookbehind => "unsupported assertion inside lookbehind",
            Self::TooManyGroups => "too many capture groups",
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for CompileError {}

/// Zero-width assertion kinds carried on `Assert` instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssertKind {
    StreamStart,
    StreamEnd,
    WordBoundary,
    NotWordBoundary,
    /// Lookaround, indexing into `Program::looks`.
    Look(u16),
}

/// One automaton instruction. `next` fields are instruction indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inst {
    /// Consume one code point matching the pooled class.
    Char { class: u16, next: u32 },
    /// Fork; `primary` is the preferred branch.
    Split { primary: u32, secondary: u32 },
    /// Record the global cursor into a capture slot.
    Save { slot: u16, next: u32 },
    /// Zero-width assertion.
    Assert { kind: AssertKind, next: u32 },
    /// Accepting state.
    Match,
}

/// A flat instruction list with its entry point and per-state
/// retention needs.
#[derive(Debug, Clone)]
pub(crate) struct Automaton {
    pub(crate) insts: Vec<Inst>,
    pub(crate) start: u32,
    /// Maximum lookbehind width a thread at each state could still
    /// consult. `UNBOUNDED` pins the retention boundary to stream
    /// start.
    pub(crate) needs: Vec<u32>,
}

/// A compiled lookaround sub-automaton.
///
/// Lookbehind bodies are compiled from the reversed expression and
/// simulated backwards over retained text; lookahead bodies run
/// forwards as deferred watches in lockstep with the main input.
#[derive(Debug, Clone)]
pub(crate) struct Look {
    pub(crate) auto: Automaton,
    pub(crate) behind: bool,
    pub(crate) positive: bool,
    pub(crate) min_w: u32,
    pub(crate) max_w: u32,
}

/// An immutable compiled pattern.
///
/// Shared read-only (`&Program`) across any number of matcher
/// instances; compilation happens once, matching state lives entirely
/// in the matcher.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) classes: Vec<CharClass>,
    pub(crate) main: Automaton,
    pub(crate) looks: Vec<Look>,
    pub(crate) group_count: u16,
    pub(crate) group_names: Vec<Option<String>>,
    /// Required leading ASCII byte, if every match must start with one.
    pub(crate) prefilter: Option<u8>,
}

impl Program {
    /// Compile an expression tree.
    ///
    /// The whole pattern is wrapped as capture group 0.
    pub fn compile(expr: &Expr) -> Result<Program, CompileError> {
        let mut c = Compiler {
            classes: Vec::new(),
            looks: Vec::new(),
            next_group: 1,
            group_names: vec![None],
        };

        let mut insts = Vec::new();
        let pc_match = push(&mut insts, Inst::Match);
        let pc_close = push(&mut insts, Inst::Save { slot: 1, next: pc_match });
        let body = c.compile(&mut insts, expr, pc_close, Ctx::Main)?;
        let start = push(&mut insts, Inst::Save { slot: 0, next: body });

        let needs = compute_needs(&insts, &c.looks);
        let prefilter = compute_prefilter(&insts, start, &c.classes);

        // A `{0}` repeat never emits its body; its groups still count.
        c.group_names.resize(c.next_group as usize, None);

        Ok(Program {
            classes: c.classes,
            main: Automaton { insts, start, needs },
            looks: c.looks,
            group_count: c.next_group,
            group_names: c.group_names,
            prefilter,
        })
    }

    /// Number of capture groups, including group 0 (the whole match).
    pub fn group_count(&self) -> usize {
        self.group_count as usize
    }

    /// Resolve a named group to its index.
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.group_names
            .iter()
            .position(|n| n.as_deref() == Some(name))
    }

    /// Name of a group, if it has one.
    pub fn group_name(&self, index: usize) -> Option<&str> {
        self.group_names.get(index)?.as_deref()
    }

    /// Whether any lookbehind in the pattern has unbounded width.
    ///
    /// Such a pattern forces the matcher to retain the whole stream,
    /// which is refused at matcher construction unless explicitly
    /// allowed.
    pub fn has_unbounded_lookbehind(&self) -> bool {
        self.looks
            .iter()
            .any(|l| l.behind && l.max_w == UNBOUNDED)
    }

    pub(crate) fn class(&self, idx: u16) -> &CharClass {
        &self.classes[idx as usize]
    }
}

/// Compilation context: what construct encloses the current subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Main,
    Ahead,
    Behind,
}

struct Compiler {
    classes: Vec<CharClass>,
    looks: Vec<Look>,
    next_group: u16,
    group_names: Vec<Option<String>>,
}

fn push(insts: &mut Vec<Inst>, inst: Inst) -> u32 {
    let pc = insts.len() as u32;
    insts.push(inst);
    pc
}

impl Compiler {
    fn intern(&mut self, class: CharClass) -> u16 {
        if let Some(i) = self.classes.iter().position(|c| *c == class) {
            return i as u16;
        }
        let i = self.classes.len() as u16;
        self.classes.push(class);
        i
    }

    /// Compile `expr` with continuation `next`, returning the entry
    /// instruction. Instructions are emitted back-to-front so every
    /// `next` is known when its instruction is written; only unbounded
    /// loops need a patched placeholder.
    fn compile(
        &mut self,
        insts: &mut Vec<Inst>,
        expr: &Expr,
        next: u32,
        ctx: Ctx,
    ) -> Result<u32, CompileError> {
        match expr {
            Expr::Empty => Ok(next),

            Expr::Literal(s) => {
                let mut pc = next;
                for c in s.chars().rev() {
                    let class = self.intern(CharClass::single(c));
                    pc = push(insts, Inst::Char { class, next: pc });
                }
                Ok(pc)
            }

            Expr::Class(c) => {
                let class = self.intern(c.clone());
                Ok(push(insts, Inst::Char { class, next }))
            }

            Expr::Any => {
                let class = self.intern(CharClass::Any);
                Ok(push(insts, Inst::Char { class, next }))
            }

            Expr::Concat(items) => {
                // Children are emitted right-to-left; capture numbering
                // must stay left-to-right, so each child gets its
                // precomputed group base.
                let base = self.next_group;
                let mut offsets = Vec::with_capacity(items.len());
                let mut total: u16 = 0;
                for item in items {
                    offsets.push(total);
                    total = total.saturating_add(count_captures(item));
                }
                let mut pc = next;
                for (item, off) in items.iter().zip(&offsets).rev() {
                    self.next_group = base + off;
                    pc = self.compile(insts, item, pc, ctx)?;
                }
                self.next_group = base + total;
                Ok(pc)
            }

            Expr::Alt(branches) => {
                if branches.is_empty() {
                    return Ok(next);
                }
                let base = self.next_group;
                let mut offsets = Vec::with_capacity(branches.len());
                let mut total: u16 = 0;
                for b in branches {
                    offsets.push(total);
                    total = total.saturating_add(count_captures(b));
                }
                let mut starts = Vec::with_capacity(branches.len());
                for (b, off) in branches.iter().zip(&offsets) {
                    self.next_group = base + off;
                    starts.push(self.compile(insts, b, next, ctx)?);
                }
                self.next_group = base + total;
                let mut pc = *starts.last().expect("non-empty");
                for &s in starts.iter().rev().skip(1) {
                    pc = push(insts, Inst::Split { primary: s, secondary: pc });
                }
                Ok(pc)
            }

            Expr::Repeat { expr, min, max, greedy } => {
                self.compile_repeat(insts, expr, *min, *max, *greedy, next, ctx)
            }

            Expr::Group(inner) => self.compile(insts, inner, next, ctx),

            Expr::Capture { expr, name } => {
                if ctx != Ctx::Main {
                    return Err(CompileError::CaptureInLookaround);
                }
                if self.next_group >= MAX_GROUPS {
                    return Err(CompileError::TooManyGroups);
                }
                let g = self.next_group;
                self.next_group += 1;
                // Children compile right-to-left and repeat bodies are
                // emitted several times, so group numbers arrive in any
                // order; names index by group number, first write wins.
                let gi = g as usize;
                if gi >= self.group_names.len() {
                    self.group_names.resize(gi + 1, None);
                }
                if self.group_names[gi].is_none() {
                    self.group_names[gi] = name.clone();
                }
                let close = push(insts, Inst::Save { slot: 2 * g + 1, next });
                let body = self.compile(insts, expr, close, ctx)?;
                Ok(push(insts, Inst::Save { slot: 2 * g, next: body }))
            }

            Expr::Lookahead { expr, positive } => {
                if ctx == Ctx::Behind {
                    return Err(CompileError::LookaroundInLookbehind);
                }
                let id = self.compile_look(expr, false, *positive)?;
                Ok(push(insts, Inst::Assert { kind: AssertKind::Look(id), next }))
            }

            Expr::Lookbehind { expr, positive } => {
                if ctx == Ctx::Behind {
                    return Err(CompileError::LookaroundInLookbehind);
                }
                let id = self.compile_look(expr, true, *positive)?;
                Ok(push(insts, Inst::Assert { kind: AssertKind::Look(id), next }))
            }

            Expr::StreamStart => {
                Ok(push(insts, Inst::Assert { kind: AssertKind::StreamStart, next }))
            }

            Expr::StreamEnd => {
                if ctx == Ctx::Behind {
                    return Err(CompileError::AssertInLookbehind);
                }
                Ok(push(insts, Inst::Assert { kind: AssertKind::StreamEnd, next }))
            }

            Expr::WordBoundary => {
                if ctx == Ctx::Behind {
                    return Err(CompileError::AssertInLookbehind);
                }
                Ok(push(insts, Inst::Assert { kind: AssertKind::WordBoundary, next }))
            }

            Expr::NotWordBoundary => {
                if ctx == Ctx::Behind {
                    return Err(CompileError::AssertInLookbehind);
                }
                Ok(push(insts, Inst::Assert { kind: AssertKind::NotWordBoundary, next }))
            }
        }
    }

    fn compile_repeat(
        &mut self,
        insts: &mut Vec<Inst>,
        body: &Expr,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        next: u32,
        ctx: Ctx,
    ) -> Result<u32, CompileError> {
        // The body may be emitted several times; every copy must reuse
        // the same capture numbering.
        let gbase = self.next_group;
        let gcount = count_captures(body);

        let mut pc = next;
        match max {
            None => {
                let split = push(insts, Inst::Split { primary: 0, secondary: 0 });
                self.next_group = gbase;
                let entry = self.compile(insts, body, split, ctx)?;
                insts[split as usize] = if greedy {
                    Inst::Split { primary: entry, secondary: next }
                } else {
                    Inst::Split { primary: next, secondary: entry }
                };
                pc = split;
            }
            Some(m) => {
                // `m - min` optional layers, innermost first; skipping a
                // layer skips all remaining iterations.
                for _ in min..m {
                    self.next_group = gbase;
                    let entry = self.compile(insts, body, pc, ctx)?;
                    pc = push(
                        insts,
                        if greedy {
                            Inst::Split { primary: entry, secondary: next }
                        } else {
                            Inst::Split { primary: next, secondary: entry }
                        },
                    );
                }
            }
        }
        for _ in 0..min {
            self.next_group = gbase;
            pc = self.compile(insts, body, pc, ctx)?;
        }
        self.next_group = gbase + gcount;
        Ok(pc)
    }

    fn compile_look(
        &mut self,
        body: &Expr,
        behind: bool,
        positive: bool,
    ) -> Result<u16, CompileError> {
        let (min_w, max_w) = expr_width(body);
        let mut sub = Vec::new();
        let pc_match = push(&mut sub, Inst::Match);
        let start = if behind {
            let rev = reverse_expr(body);
            self.compile(&mut sub, &rev, pc_match, Ctx::Behind)?
        } else {
            self.compile(&mut sub, body, pc_match, Ctx::Ahead)?
        };
        let needs = compute_needs(&sub, &self.looks);
        let id = self.looks.len() as u16;
        self.looks.push(Look {
            auto: Automaton { insts: sub, start, needs },
            behind,
            positive,
            min_w,
            max_w,
        });
        Ok(id)
    }
}

/// Number of capture groups in a subtree.
fn count_captures(expr: &Expr) -> u16 {
    match expr {
        Expr::Capture { expr, .. } => 1 + count_captures(expr),
        Expr::Group(inner) | Expr::Repeat { expr: inner, .. } => count_captures(inner),
        Expr::Concat(items) | Expr::Alt(items) => {
            items.iter().map(count_captures).sum()
        }
        // Captures inside lookaround are rejected during compilation.
        _ => 0,
    }
}

/// Minimum and maximum consumed width of a subtree, in code points.
/// `UNBOUNDED` marks an unbounded maximum.
fn expr_width(expr: &Expr) -> (u32, u32) {
    match expr {
        Expr::Empty
        | Expr::Lookahead { .. }
        | Expr::Lookbehind { .. }
        | Expr::StreamStart
        | Expr::StreamEnd
        | Expr::WordBoundary
        | Expr::NotWordBoundary => (0, 0),
        Expr::Literal(s) => {
            let n = s.chars().count() as u32;
            (n, n)
        }
        Expr::Class(_) | Expr::Any => (1, 1),
        Expr::Concat(items) => items.iter().fold((0, 0), |(lo, hi), e| {
            let (elo, ehi) = expr_width(e);
            (lo.saturating_add(elo), add_width(hi, ehi))
        }),
        Expr::Alt(items) => {
            if items.is_empty() {
                return (0, 0);
            }
            items.iter().fold((u32::MAX, 0), |(lo, hi), e| {
                let (elo, ehi) = expr_width(e);
                (lo.min(elo), hi.max(ehi))
            })
        }
        Expr::Repeat { expr, min, max, .. } => {
            let (elo, ehi) = expr_width(expr);
            let lo = elo.saturating_mul(*min);
            let hi = match max {
                Some(m) => mul_width(ehi, *m),
                None => {
                    if ehi == 0 {
                        0
                    } else {
                        UNBOUNDED
                    }
                }
            };
            (lo, hi)
        }
        Expr::Group(inner) | Expr::Capture { expr: inner, .. } => expr_width(inner),
    }
}

fn add_width(a: u32, b: u32) -> u32 {
    if a == UNBOUNDED || b == UNBOUNDED {
        UNBOUNDED
    } else {
        a.saturating_add(b)
    }
}

fn mul_width(a: u32, b: u32) -> u32 {
    if a == UNBOUNDED {
        UNBOUNDED
    } else {
        a.saturating_mul(b)
    }
}

/// Mirror an expression for backward simulation of lookbehind.
fn reverse_expr(expr: &Expr) -> Expr {
    match expr {
        Expr::Literal(s) => Expr::Literal(s.chars().rev().collect()),
        Expr::Concat(items) => {
            Expr::Concat(items.iter().rev().map(reverse_expr).collect())
        }
        Expr::Alt(items) => Expr::Alt(items.iter().map(reverse_expr).collect()),
        Expr::Repeat { expr, min, max, greedy } => Expr::Repeat {
            expr: Box::new(reverse_expr(expr)),
            min: *min,
            max: *max,
            greedy: *greedy,
        },
        Expr::Group(inner) => Expr::Group(Box::new(reverse_expr(inner))),
        Expr::Capture { expr, name } => Expr::Capture {
            expr: Box::new(reverse_expr(expr)),
            name: name.clone(),
        },
        other => other.clone(),
    }
}

/// Per-state retention needs: the widest lookbehind a thread parked at
/// each state could still consult. Propagated backwards to a fixed
/// point; consuming edges shrink the need by one since the cursor will
/// have advanced by then.
fn compute_needs(insts: &[Inst], looks: &[Look]) -> Vec<u32> {
    let imm = |inst: &Inst| -> u32 {
        match inst {
            Inst::Assert { kind: AssertKind::Look(id), .. } => {
                let l = &looks[*id as usize];
                if l.behind {
                    l.max_w
                } else {
                    l.auto.needs.iter().copied().max().unwrap_or(0)
                }
            }
            _ => 0,
        }
    };
    let shrink = |n: u32| -> u32 {
        if n == UNBOUNDED {
            UNBOUNDED
        } else {
            n.saturating_sub(1)
        }
    };

    let mut needs: Vec<u32> = insts.iter().map(imm).collect();
    loop {
        let mut changed = false;
        for (i, inst) in insts.iter().enumerate() {
            let flow = match inst {
                Inst::Char { next, .. } => shrink(needs[*next as usize]),
                Inst::Split { primary, secondary } => {
                    needs[*primary as usize].max(needs[*secondary as usize])
                }
                Inst::Save { next, .. } => needs[*next as usize],
                Inst::Assert { next, .. } => imm(inst).max(needs[*next as usize]),
                Inst::Match => 0,
            };
            if flow > needs[i] {
                needs[i] = flow;
                changed = true;
            }
        }
        if !changed {
            return needs;
        }
    }
}

/// A single required leading ASCII byte, if every match starts with
/// one. Lets an idle matcher skip dead scan regions with `memchr`.
fn compute_prefilter(insts: &[Inst], start: u32, classes: &[CharClass]) -> Option<u8> {
    let mut byte: Option<u8> = None;
    let mut seen = vec![false; insts.len()];
    let mut stack = vec![start];
    while let Some(pc) = stack.pop() {
        if seen[pc as usize] {
            continue;
        }
        seen[pc as usize] = true;
        match &insts[pc as usize] {
            Inst::Char { class, .. } => {
                let b = classes[*class as usize].single_ascii()?;
                match byte {
                    Some(prev) if prev != b => return None,
                    _ => byte = Some(b),
                }
            }
            Inst::Split { primary, secondary } => {
                stack.push(*primary);
                stack.push(*secondary);
            }
            Inst::Save { next, .. } => stack.push(*next),
            // Assertions at the entry make position matter; no skip.
            Inst::Assert { .. } => return None,
            // The pattern can match empty; every position is a start.
            Inst::Match => return None,
        }
    }
    byte
}
