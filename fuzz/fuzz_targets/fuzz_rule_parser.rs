#![no_main]

use libfuzzer_sys::fuzz_target;
use pwtable::rules::{Lexicon, Rule, parse_rule};
use std::sync::Arc;

fuzz_target!(|data: &str| {
    // Arbitrary text must parse or fail cleanly, never panic
    let Ok(spec) = parse_rule(data) else {
        return;
    };

    // A built rule prints back to text that parses to the same terms
    let lexicon = Arc::new(Lexicon::from_words(["a", "bc"]));
    if let Ok(rule) = Rule::build(&spec, lexicon) {
        let reparsed = parse_rule(&rule.to_string()).expect("printed rule must parse");
        assert_eq!(reparsed, spec);
    }
});
