//! Oracle harness: a chunked run must commit exactly the matches a
//! one-shot run of the same text commits, for any chunking.

use seam_core::program::Expr;
use seam_core::{find_all, CharClass, Config, Error, MatchData, Outcome, Program, StreamMatcher};

/// Split `text` at the given ascending char offsets.
pub fn chunks_at(text: &str, cuts: &[usize]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut at = 0;
    for &cut in cuts {
        let cut = cut.min(chars.len());
        if cut > at {
            chunks.push(chars[at..cut].iter().collect());
            at = cut;
        }
    }
    chunks.push(chars[at..].iter().collect());
    chunks
}

/// Feed chunks then finish, returning every committed span in order.
pub fn chunked_spans(prog: &Program, chunks: &[String], config: Config) -> Vec<(u64, u64)> {
    let mut m = StreamMatcher::new(prog, config).expect("matcher construction");
    let mut out = Vec::new();
    for chunk in chunks {
        match m.feed(chunk) {
            Ok(outcomes) => {
                for o in outcomes {
                    if let Outcome::Matched(d) = o {
                        out.push((d.span.start, d.span.end));
                    }
                }
            }
            // A terminal commit mid-stream ends the run.
            Err(Error::FeedAfterDone) => break,
            Err(e) => panic!("feed failed: {e}"),
        }
    }
    for o in m.finish().expect("finish") {
        if let Outcome::Matched(d) = o {
            out.push((d.span.start, d.span.end));
        }
    }
    out
}

pub fn spans(matches: &[MatchData]) -> Vec<(u64, u64)> {
    matches.iter().map(|m| (m.span.start, m.span.end)).collect()
}

pub fn oracle_spans(prog: &Program, text: &str, config: Config) -> Vec<(u64, u64)> {
    spans(&find_all(prog, text, config).expect("one-shot run"))
}

/// Assert a specific chunking commits exactly what the one-shot run
/// does, with enough context to replay a failure.
pub fn assert_chunking_matches_oracle(
    name: &str,
    prog: &Program,
    text: &str,
    cuts: &[usize],
    config: Config,
) {
    let expected = oracle_spans(prog, text, config);
    let chunks = chunks_at(text, cuts);
    let actual = chunked_spans(prog, &chunks, config);
    assert_eq!(
        actual, expected,
        "pattern {name:?} on {text:?} split at {cuts:?} (config {config:?})"
    );
}

/// Patterns covering every construct the matcher supports.
pub fn pattern_battery() -> Vec<(&'static str, Program)> {
    let exprs: Vec<(&'static str, Expr)> = vec![
        ("literal", Expr::literal("ab")),
        ("alt_prefix", Expr::alt(vec![Expr::literal("a"), Expr::literal("ab")])),
        ("plus", Expr::literal("a").plus()),
        (
            "star_then",
            Expr::seq(vec![Expr::literal("a").star(), Expr::literal("b")]),
        ),
        ("lazy_plus", Expr::literal("a").repeat(1, None, false)),
        ("bounded", Expr::literal("a").repeat(1, Some(3), true)),
        ("class_plus", Expr::class(CharClass::range('a', 'b')).plus()),
        (
            "behind",
            Expr::seq(vec![Expr::literal("a").behind(), Expr::literal("b")]),
        ),
        (
            "neg_behind",
            Expr::seq(vec![Expr::literal("a").not_behind(), Expr::literal("b")]),
        ),
        (
            "ahead",
            Expr::seq(vec![Expr::literal("a"), Expr::literal("b").ahead()]),
        ),
        (
            "neg_ahead",
            Expr::seq(vec![Expr::literal("a"), Expr::literal("b").not_ahead()]),
        ),
        (
            "greedy_ahead",
            Expr::seq(vec![
                Expr::literal("a"),
                Expr::literal("b").plus(),
                Expr::literal("b").ahead(),
            ]),
        ),
        ("anchor_start", Expr::seq(vec![Expr::StreamStart, Expr::literal("a")])),
        ("anchor_end", Expr::seq(vec![Expr::literal("a"), Expr::StreamEnd])),
        (
            "word_bounded",
            Expr::seq(vec![Expr::WordBoundary, Expr::literal("ab"), Expr::WordBoundary]),
        ),
        (
            "captures",
            Expr::seq(vec![Expr::literal("a").capture(), Expr::literal("b").capture()]),
        ),
    ];
    exprs
        .into_iter()
        .map(|(name, e)| (name, Program::compile(&e).expect("battery pattern")))
        .collect()
}
