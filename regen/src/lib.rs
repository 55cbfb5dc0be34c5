#![allow(clippy::result_large_err)]

//! # Regen - Strings from Regular Expressions
//!
//! Regen compiles a regular expression (in the `java.util.regex` dialect) into
//! a tree that can produce strings the pattern matches. Generation is a pure
//! function of the pattern and a seed, an optional length target bounds the
//! output, and failing values can be shrunk towards smaller matches for
//! property-based testing.
//!
//! ## Quick Start
//!
//! ```rust
//! use regen::{Flags, compile, generate, generate_sized};
//!
//! let pattern = compile("[a-z]+@[a-z]+\\.(com|org)", Flags::NONE).unwrap();
//!
//! // Same seed, same string
//! let value = generate(&pattern, 7).unwrap();
//! assert_eq!(value, generate(&pattern, 7).unwrap());
//!
//! // Bounded output
//! let short = generate_sized(&pattern, 7, 12).unwrap();
//! assert!(short.chars().count() <= 12);
//! ```
//!
//! ## Shrinking
//!
//! ```rust
//! use regen::{Flags, ShrinkEngine, compile, generate_sized};
//!
//! let pattern = compile("[a-z]{3,40}", Flags::NONE).unwrap();
//! let failing = generate_sized(&pattern, 1, 40).unwrap();
//!
//! let result = ShrinkEngine::new().shrink(&pattern, 1, &failing, |value| {
//!     if value.len() >= 3 { Err("too long") } else { Ok(()) }
//! });
//! assert_eq!(result.minimal.len(), 3);
//! ```

pub mod ast;
pub mod charset;
pub mod config;
pub mod error;
pub mod generator;
pub mod parallel;
pub mod parser;
pub mod pattern;
pub mod rng;
pub mod shrink;

// Re-export the main public API
pub use ast::{Bound, GroupId, GroupKind, Node, NodeKind, QuantifierKind};
pub use charset::{CaseFolding, CharSet, CharSetBuilder};
pub use config::{ConfigError, Flags};
pub use error::{CompileError, GenerationError};
pub use generator::GenerationContext;
pub use parallel::{ParallelConfig, generate_batch};
pub use pattern::Pattern;
pub use rng::{HostRandom, Lcg, RandomSource};
pub use shrink::{ShrinkConfig, ShrinkEngine, ShrinkResult, Shrinks};

/// Compile `pattern` under `flags`
pub fn compile(pattern: &str, flags: Flags) -> Result<Pattern, CompileError> {
    Pattern::compile(pattern, flags)
}

/// Generate the string `pattern` yields for `seed`
pub fn generate(pattern: &Pattern, seed: i64) -> Result<String, GenerationError> {
    pattern.generate(seed)
}

/// Generate a string of at most `max(target, min_length(pattern))` characters
pub fn generate_sized(pattern: &Pattern, seed: i64, target: usize) -> Result<String, GenerationError> {
    pattern.generate_sized(seed, target)
}

/// Lazily produce smaller matches of `pattern` for a failing value
///
/// `failing` is expected to be the value generated for `seed`. Every yielded
/// string matches the pattern and is strictly shorter than `failing`, or as
/// long but drawn from a narrower alphabet.
pub fn shrink<'a>(pattern: &'a Pattern, seed: i64, failing: &str) -> Shrinks<'a, Lcg> {
    pattern.shrink(seed, failing)
}

pub fn min_length(pattern: &Pattern) -> usize {
    pattern.min_length()
}

pub fn max_length(pattern: &Pattern) -> Bound {
    pattern.max_length()
}
