//! Boundary tests: chunk splitting must be invisible.
//!
//! For any chunking of any text, the committed matches must be exactly
//! what a one-shot run of the whole text commits. Exhaustive single
//! cuts catch off-by-one boundary handling; seeded multi-cut runs
//! cover the rest.

mod common;

use common::{
    assert_chunking_matches_oracle, chunked_spans, chunks_at, oracle_spans, pattern_battery, Gen,
};
use seam_core::program::Expr;
use seam_core::{Config, Error, Outcome, Program, StreamMatcher};

const TEXTS: &[&str] = &[
    "",
    "a",
    "b",
    "ab",
    "ba",
    "aab",
    "abb",
    "abab",
    "bbab",
    "abba",
    "a ab b",
    "aaabbb",
    "ab ab ab",
    "xxxxabxx",
];

fn configs() -> Vec<Config> {
    vec![
        Config::default(),
        Config { global: true, ..Config::default() },
        Config { sticky: true, ..Config::default() },
        Config { global: true, sticky: true, ..Config::default() },
    ]
}

#[test]
fn test_every_single_cut_matches_oracle() {
    for (name, prog) in &pattern_battery() {
        for text in TEXTS {
            for config in configs() {
                let len = text.chars().count();
                for cut in 0..=len {
                    assert_chunking_matches_oracle(name, prog, text, &[cut], config);
                }
            }
        }
    }
}

#[test]
fn test_char_by_char_matches_oracle() {
    for (name, prog) in &pattern_battery() {
        for text in TEXTS {
            for config in configs() {
                let len = text.chars().count();
                let cuts: Vec<usize> = (1..len).collect();
                assert_chunking_matches_oracle(name, prog, text, &cuts, config);
            }
        }
    }
}

#[test]
fn test_random_chunkings_match_oracle() {
    let mut g = Gen::from_env_or_random();
    let seed = g.seed;
    for (name, prog) in &pattern_battery() {
        for _ in 0..40 {
            let text = g.text(24);
            let cuts = g.cuts(text.chars().count());
            for config in configs() {
                let expected = oracle_spans(prog, &text, config);
                let actual = chunked_spans(prog, &chunks_at(&text, &cuts), config);
                assert_eq!(
                    actual, expected,
                    "pattern {name:?} on {text:?} split at {cuts:?} \
                     (config {config:?}, seed {seed})"
                );
            }
        }
    }
}

#[test]
fn test_byte_level_splits_match_oracle() {
    // feed_bytes may split anywhere, including inside a code point.
    let prog = Program::compile(&Expr::literal("héé")).unwrap();
    let text = "xéhééx";
    let bytes = text.as_bytes();
    let config = Config { global: true, ..Config::default() };
    let expected = oracle_spans(&prog, text, config);

    for cut in 0..=bytes.len() {
        let mut m = StreamMatcher::new(&prog, config).unwrap();
        let mut got = Vec::new();
        for part in [&bytes[..cut], &bytes[cut..]] {
            for o in m.feed_bytes(part).unwrap() {
                if let Outcome::Matched(d) = o {
                    got.push((d.span.start, d.span.end));
                }
            }
        }
        for o in m.finish().unwrap() {
            if let Outcome::Matched(d) = o {
                got.push((d.span.start, d.span.end));
            }
        }
        assert_eq!(got, expected, "byte split at {cut}");
    }
}

#[test]
fn test_lookbehind_window_split_every_way() {
    // The lookbehind window straddles every possible boundary.
    let prog = Program::compile(&Expr::seq(vec![
        Expr::literal("ab").behind(),
        Expr::literal("cd"),
    ]))
    .unwrap();
    let text = "xabcdxabcd";
    for config in configs() {
        let len = text.chars().count();
        for cut in 0..=len {
            assert_chunking_matches_oracle("behind_wide", &prog, text, &[cut], config);
        }
    }
}

#[test]
fn test_terminal_commit_mid_chunk_ignores_rest() {
    // Without the global flag the first commit is terminal; the rest
    // of the chunk must not produce further outcomes.
    let prog = Program::compile(&Expr::literal("ab")).unwrap();
    let mut m = StreamMatcher::new(&prog, Config::default()).unwrap();
    let out = m.feed("abababab").unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].as_match().unwrap().span.start, 0);
    assert_eq!(m.feed("ab"), Err(Error::FeedAfterDone));
}
