//! Generated strings must be full matches of their pattern
//!
//! The `regex` crate serves as the reference matcher, so only constructs both
//! dialects agree on appear here: no backreferences, lookarounds, anchors or
//! possessive quantifiers.

use regen::{Flags, Pattern};
use regex::Regex;

const PATTERNS: &[&str] = &[
    "",
    "abc",
    "[a-z]{3,8}",
    "[0-9]{3}-[0-9]{4}",
    "(foo|bar|baz)+",
    "\\d+\\.\\d{2}",
    "[^abc]{2,5}",
    "[A-Za-z_][A-Za-z0-9_]*",
    "(?i)[a-f]{4}",
    "\\w+@\\w+\\.(com|net|org)",
    "x?y*z+",
    "[\\s\\S]{0,6}",
    "(?:ab|c){2,3}d",
    "\\x41\\u0042[\\x{43}-E]",
    "[a-z&&[^aeiou]]{5}",
    ".{1,10}",
    "\\t\\n\\r",
    "(a|)b",
    "\\p{Alpha}{3}\\p{Lower}",
    "[\\d\\-+]{4,}",
    "colou?r",
    "a{2}b{0,3}c{1,}",
    "(((x)))+",
    "[.*+?(){}|]{3}",
    "\\.\\*\\+\\?",
];

fn reference(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{})$", pattern)).unwrap()
}

#[test]
fn test_unsized_generation_matches() {
    for &source in PATTERNS {
        let pattern = Pattern::compile(source, Flags::NONE).unwrap();
        let matcher = reference(source);
        for seed in -50..50 {
            let value = pattern.generate(seed).unwrap();
            assert!(
                matcher.is_match(&value),
                "{:?} generated {:?} for seed {}",
                source,
                value,
                seed
            );
        }
    }
}

#[test]
fn test_sized_generation_matches() {
    for &source in PATTERNS {
        let pattern = Pattern::compile(source, Flags::NONE).unwrap();
        let matcher = reference(source);
        for seed in [0, 1, 17, -99, i64::MIN, i64::MAX] {
            for target in [0, 1, 3, 8, 40] {
                let value = pattern.generate_sized(seed, target).unwrap();
                assert!(
                    matcher.is_match(&value),
                    "{:?} generated {:?} for seed {} at target {}",
                    source,
                    value,
                    seed,
                    target
                );
            }
        }
    }
}

#[test]
fn test_flags_match_inline_equivalents() {
    let cases = [
        ("[k-m]{6}", Flags::CASE_INSENSITIVE, "(?i)[k-m]{6}"),
        (".{5}", Flags::DOTALL, "(?s).{5}"),
        ("a b # spaced\n c", Flags::COMMENTS, "abc"),
    ];
    for (source, flags, equivalent) in cases {
        let pattern = Pattern::compile(source, flags).unwrap();
        let matcher = reference(equivalent);
        for seed in 0..100 {
            let value = pattern.generate(seed).unwrap();
            assert!(matcher.is_match(&value), "{:?} generated {:?}", source, value);
        }
    }
}

#[test]
fn test_shrink_candidates_match() {
    for &source in PATTERNS {
        let pattern = Pattern::compile(source, Flags::NONE).unwrap();
        let matcher = reference(source);
        for seed in [3, 4242] {
            let failing = pattern.generate_sized(seed, 30).unwrap();
            for candidate in pattern.shrink(seed, &failing) {
                assert!(
                    matcher.is_match(&candidate),
                    "{:?} shrank {:?} to {:?}",
                    source,
                    failing,
                    candidate
                );
            }
        }
    }
}
