//! Compiled pattern handle.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::ast::{Bound, Node};
use crate::config::Flags;
use crate::error::{CompileError, GenerationError};
use crate::generator;
use crate::parser;
use crate::rng::{Lcg, RandomSource};
use crate::shrink::Shrinks;

/// A compiled pattern, immutable and shareable across threads
///
/// ```
/// use regen::{Flags, Pattern};
///
/// let pattern = Pattern::compile("[0-9]{3}-[0-9]{4}", Flags::NONE).unwrap();
/// let value = pattern.generate(42).unwrap();
/// assert_eq!(value.len(), 8);
/// assert_eq!(value, pattern.generate(42).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    flags: Flags,
    root: Node,
}

impl Pattern {
    pub fn compile(source: &str, flags: Flags) -> Result<Self, CompileError> {
        let root = parser::parse(source, flags)?.simplify();
        debug!(
            pattern = source,
            %flags,
            min_length = root.min_length(),
            max_length = %root.max_length(),
            "compiled pattern"
        );
        Ok(Self {
            source: source.to_string(),
            flags,
            root,
        })
    }

    /// Wrap a hand-built tree; its rendering stands in for the source text
    pub fn from_node(root: Node) -> Self {
        Self {
            source: root.to_string(),
            flags: Flags::NONE,
            root,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn min_length(&self) -> usize {
        self.root.min_length()
    }

    pub fn max_length(&self) -> Bound {
        self.root.max_length()
    }

    /// Generate with an [`Lcg`] seeded by `seed` and no length target
    pub fn generate(&self, seed: i64) -> Result<String, GenerationError> {
        self.generate_with(Lcg::new(seed), None)
            .map(|(value, _)| value)
    }

    /// Generate a string no longer than `max(target, min_length)`
    pub fn generate_sized(&self, seed: i64, target: usize) -> Result<String, GenerationError> {
        self.generate_with(Lcg::new(seed), Some(target))
            .map(|(value, _)| value)
    }

    /// Generate from any random source, returning the advanced source
    pub fn generate_with<R: RandomSource>(
        &self,
        source: R,
        target: Option<usize>,
    ) -> Result<(String, R), GenerationError> {
        generator::generate(&self.root, source, target)
    }

    /// The same pattern restructured for the given length target
    pub fn sized(&self, target: usize) -> Pattern {
        Self {
            source: self.source.clone(),
            flags: self.flags,
            root: self.root.sized(target),
        }
    }

    /// Smaller candidates for `failing`, the value generated for `seed`
    pub fn shrink(&self, seed: i64, failing: &str) -> Shrinks<'_, Lcg> {
        Shrinks::new(&self.root, Lcg::new(seed), failing)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Pattern {
    type Err = CompileError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::compile(source, Flags::NONE)
    }
}
