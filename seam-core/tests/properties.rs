//! Property-based tests for the streaming matcher
//!
//! These verify invariants that must hold for ANY input and ANY
//! chunking, not just crafted examples. proptest generates random
//! texts and split points and shrinks failures to minimal cases.

mod common;

use common::{chunked_spans, chunks_at, oracle_spans, pattern_battery};
use proptest::prelude::*;
use seam_core::program::Expr;
use seam_core::{Config, Error, Outcome, Program, StreamMatcher};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    }
}

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop::sample::select(vec!['a', 'b', 'c', ' ']), 0..32)
        .prop_map(|cs| cs.into_iter().collect())
}

fn cuts_strategy() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0usize..32, 0..6).prop_map(|mut v| {
        v.sort_unstable();
        v.dedup();
        v
    })
}

proptest! {
    #![proptest_config(config())]

    /// Chunking is invisible: any split of any text commits exactly
    /// the one-shot matches.
    #[test]
    fn chunking_never_changes_matches(text in text_strategy(), cuts in cuts_strategy()) {
        for (name, prog) in &pattern_battery() {
            for cfg in [Config::default(), Config { global: true, ..Config::default() }] {
                let expected = oracle_spans(prog, &text, cfg);
                let actual = chunked_spans(prog, &chunks_at(&text, &cuts), cfg);
                prop_assert_eq!(
                    &actual, &expected,
                    "pattern {} on {:?} split at {:?}", name, text, cuts
                );
            }
        }
    }

    /// Committed matches in a global scan are ordered and do not
    /// overlap; empty matches still make progress.
    #[test]
    fn global_matches_are_ordered_and_disjoint(text in text_strategy()) {
        let cfg = Config { global: true, ..Config::default() };
        for (name, prog) in &pattern_battery() {
            let found = oracle_spans(prog, &text, cfg);
            for pair in found.windows(2) {
                prop_assert!(
                    pair[1].0 >= pair[0].1 && pair[1].0 > pair[0].0,
                    "pattern {} on {:?}: spans {:?} out of order", name, text, &found
                );
            }
            for (s, e) in found {
                prop_assert!(s <= e && e <= text.chars().count() as u64);
            }
        }
    }

    /// The reported pending suffix is always a suffix of what was
    /// consumed so far.
    #[test]
    fn retained_is_a_suffix_of_consumed(text in text_strategy(), cuts in cuts_strategy()) {
        for (_, prog) in &pattern_battery() {
            let cfg = Config { global: true, ..Config::default() };
            let mut m = StreamMatcher::new(prog, cfg).unwrap();
            let mut consumed = String::new();
            for chunk in chunks_at(&text, &cuts) {
                consumed.push_str(&chunk);
                for o in m.feed(&chunk).unwrap() {
                    if let Outcome::Pending { retained } = o {
                        prop_assert!(
                            consumed.ends_with(&retained),
                            "{:?} not a suffix of {:?}", retained, consumed
                        );
                    }
                }
            }
        }
    }

    /// A pattern with a bounded lookbehind keeps at most that much
    /// context while no match attempt is in progress.
    #[test]
    fn bounded_lookbehind_bounds_retention(text in text_strategy()) {
        let prog = Program::compile(&Expr::seq(vec![
            Expr::literal("ab").behind(),
            Expr::literal("c"),
        ]))
        .unwrap();
        let cfg = Config { global: true, ..Config::default() };
        let mut m = StreamMatcher::new(&prog, cfg).unwrap();
        for c in text.chars() {
            let chunk: String = c.to_string();
            for o in m.feed(&chunk).unwrap() {
                if let Outcome::Pending { retained } = o {
                    prop_assert!(retained.chars().count() <= 2, "retained {:?}", retained);
                }
            }
        }
    }

    /// Arbitrary byte chunkings of valid UTF-8 never panic and agree
    /// with the one-shot run.
    #[test]
    fn byte_splits_agree_with_oracle(
        text in "[ab é😀]{0,12}",
        cut in 0usize..48,
    ) {
        let prog = Program::compile(&Expr::literal("aé")).unwrap();
        let cfg = Config { global: true, ..Config::default() };
        let expected = oracle_spans(&prog, &text, cfg);

        let bytes = text.as_bytes();
        let cut = cut.min(bytes.len());
        let mut m = StreamMatcher::new(&prog, cfg).unwrap();
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
        prop_assert_eq!(got, expected, "byte split at {}", cut);
    }

    /// Feeding garbage bytes reports an error instead of panicking.
    #[test]
    fn invalid_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let prog = Program::compile(&Expr::literal("ab")).unwrap();
        let mut m = StreamMatcher::new(&prog, Config::default()).unwrap();
        match m.feed_bytes(&bytes) {
            Ok(_) => {
                // Valid so far; finishing must either succeed or flag
                // an incomplete trailing sequence.
                match m.finish() {
                    Ok(_) | Err(Error::InvalidUtf8) => {}
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
            }
            Err(Error::InvalidUtf8) => {}
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }
}
