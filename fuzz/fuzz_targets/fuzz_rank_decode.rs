#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pwtable::rules::{Lexicon, Rule, parse_rule};
use std::sync::Arc;

#[derive(Debug, Arbitrary)]
struct Input {
    rule: String,
    words: Vec<Vec<u8>>,
    ranks: Vec<u64>,
}

fuzz_target!(|input: Input| {
    let Ok(spec) = parse_rule(&input.rule) else {
        return;
    };
    let Ok(rule) = Rule::build(&spec, Arc::new(Lexicon::from_words(&input.words))) else {
        return;
    };

    // Every in-range rank renders within max_len; out-of-range ranks are errors
    let mut out = Vec::new();
    for rank in input.ranks {
        match rule.kth(rank, &mut out, true) {
            Ok(len) => {
                assert!(rank < rule.size());
                assert_eq!(len, out.len());
                assert!(len <= rule.max_len());
                // A built rule never needs more than one empty-retry
                assert!(rule.kth(rank, &mut out, false).is_ok_and(|len| len > 0));
            }
            Err(_) => assert!(rank >= rule.size()),
        }
    }
});
