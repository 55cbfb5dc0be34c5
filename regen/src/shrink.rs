//! Shrinking failing strings to smaller matches of the same pattern.
//!
//! Candidates come from two streams. The length stream regenerates from the
//! original random source at growing targets `min, 2t + 1, ...` that stay
//! below the failing length. The narrowing stream replaces every character
//! class with a simpler subset and regenerates at the failing length.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::ast::Node;
use crate::charset::{ALPHANUMERIC, CharSet, CharSetBuilder};
use crate::config::ConfigError;
use crate::generator::generate;
use crate::pattern::Pattern;
use crate::rng::RandomSource;

static LOWER_ALPHANUMERIC: LazyLock<CharSet> = LazyLock::new(|| {
    CharSetBuilder::new()
        .range('0', '9')
        .range('a', 'z')
        .build()
});

/// Number of narrowing levels: alphanumerics, lowercase and digits, one member
pub const NARROWING_LEVELS: usize = 3;

/// Narrow `set` by every level up to and including `level`
///
/// A step that would leave the set empty is skipped.
pub fn narrow(set: &CharSet, level: usize) -> CharSet {
    let mut narrowed = set.clone();
    for step in 0..=level.min(NARROWING_LEVELS - 1) {
        let next = match step {
            0 => narrowed.intersect(&ALPHANUMERIC),
            1 => narrowed.intersect(&LOWER_ALPHANUMERIC),
            _ => narrowed.nth(0).map(CharSet::single).unwrap_or_else(CharSet::empty),
        };
        if !next.is_empty() {
            narrowed = next;
        }
    }
    narrowed
}

/// Which stream produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkOrigin {
    /// Regenerated at a smaller target length
    Length { target: usize },
    /// Regenerated with classes narrowed to the given level
    Narrowed { level: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub origin: ShrinkOrigin,
}

/// Lazy, finite sequence of smaller strings matching a pattern
///
/// Every candidate differs from the failing value and is no longer than it.
/// Length candidates are strictly shorter.
#[derive(Debug, Clone)]
pub struct Shrinks<'a, R> {
    root: &'a Node,
    source: R,
    failing: String,
    failing_length: usize,
    next_target: Option<usize>,
    last: Option<String>,
    level: usize,
}

impl<'a, R: RandomSource> Shrinks<'a, R> {
    /// Shrink `failing`, which was generated from `root` starting at `source`
    pub fn new(root: &'a Node, source: R, failing: &str) -> Self {
        let failing_length = failing.chars().count();
        let next_target = (root.min_length() < failing_length).then_some(root.min_length());
        Self {
            root,
            source,
            failing: failing.to_string(),
            failing_length,
            next_target,
            last: None,
            level: 0,
        }
    }

    /// Skip narrowing levels below `level`
    pub fn starting_at_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    fn regenerate(&self, root: &Node, target: usize) -> Option<String> {
        match generate(root, self.source.clone(), Some(target)) {
            Ok((value, _)) => Some(value),
            Err(error) => {
                debug!(%error, target, "skipping shrink candidate");
                None
            }
        }
    }

    fn next_by_length(&mut self) -> Option<Candidate> {
        while let Some(target) = self.next_target {
            self.next_target = target
                .checked_mul(2)
                .and_then(|doubled| doubled.checked_add(1))
                .filter(|&next| next < self.failing_length);
            let Some(value) = self.regenerate(self.root, target) else {
                continue;
            };
            let length = value.chars().count();
            if length < self.failing_length && self.last.as_deref() != Some(value.as_str()) {
                trace!(target, length, "length candidate");
                self.last = Some(value.clone());
                return Some(Candidate {
                    value,
                    origin: ShrinkOrigin::Length { target },
                });
            }
        }
        None
    }

    fn next_by_narrowing(&mut self) -> Option<Candidate> {
        while self.level < NARROWING_LEVELS {
            let level = self.level;
            self.level += 1;
            let narrowed = self.root.map_classes(&|set| narrow(set, level));
            if narrowed == *self.root {
                continue;
            }
            let Some(value) = self.regenerate(&narrowed, self.failing_length) else {
                continue;
            };
            if value != self.failing && value.chars().count() <= self.failing_length {
                trace!(level, "narrowed candidate");
                return Some(Candidate {
                    value,
                    origin: ShrinkOrigin::Narrowed { level },
                });
            }
        }
        None
    }

    /// The next candidate together with the stream that produced it
    pub fn next_candidate(&mut self) -> Option<Candidate> {
        self.next_by_length().or_else(|| self.next_by_narrowing())
    }
}

impl<R: RandomSource> Iterator for Shrinks<'_, R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_candidate().map(|candidate| candidate.value)
    }
}

/// Outcome of [`ShrinkEngine::shrink`]
#[derive(Debug, Clone)]
pub struct ShrinkResult {
    /// The generated value the property first rejected
    pub failing: String,
    /// Smallest match found that the property still rejects
    pub minimal: String,
    /// Candidates that replaced the current value
    pub accepted: usize,
    /// Candidates handed to the property
    pub tried: usize,
    /// False when the iteration or time limit ended the search
    pub exhausted: bool,
    pub elapsed: Duration,
}

impl ShrinkResult {
    fn unchanged(failing: &str) -> Self {
        Self {
            failing: failing.to_string(),
            minimal: failing.to_string(),
            accepted: 0,
            tried: 0,
            exhausted: true,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether `minimal` differs from the original failing value
    pub fn was_shrunk(&self) -> bool {
        self.accepted > 0
    }
}

/// Configuration for shrinking behavior
#[derive(Debug, Clone)]
pub struct ShrinkConfig {
    /// Maximum number of candidates tried
    pub max_iterations: usize,
    /// Timeout for shrinking process
    pub timeout: Duration,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            timeout: Duration::from_secs(10),
        }
    }
}

impl ShrinkConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidShrinkIterations(self.max_iterations));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Drives the shrink streams against a property until no candidate fails
#[derive(Debug, Clone, Default)]
pub struct ShrinkEngine {
    config: ShrinkConfig,
}

impl ShrinkEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ShrinkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShrinkConfig {
        &self.config
    }

    /// Find a small string that still fails `property`
    ///
    /// `failing` must be the value `pattern` generated for `seed`. The first
    /// candidate that fails is accepted and the streams restart from it.
    /// After a narrowing step the next round starts at the following level.
    pub fn shrink<F, E>(
        &self,
        pattern: &Pattern,
        seed: i64,
        failing: &str,
        mut property: F,
    ) -> ShrinkResult
    where
        F: FnMut(&str) -> Result<(), E>,
    {
        let start_time = Instant::now();
        if property(failing).is_ok() {
            debug!("value does not fail, nothing to shrink");
            return ShrinkResult::unchanged(failing);
        }

        let mut result = ShrinkResult::unchanged(failing);
        let mut level = 0;

        'rounds: loop {
            let mut candidates = pattern.shrink(seed, &result.minimal).starting_at_level(level);
            loop {
                if result.tried >= self.config.max_iterations || start_time.elapsed() >= self.config.timeout {
                    debug!(accepted = result.accepted, tried = result.tried, "shrinking stopped early");
                    result.exhausted = false;
                    break 'rounds;
                }
                let Some(candidate) = candidates.next_candidate() else {
                    debug!(accepted = result.accepted, tried = result.tried, "shrinking completed");
                    break 'rounds;
                };
                result.tried += 1;
                if property(&candidate.value).is_err() {
                    result.accepted += 1;
                    level = match candidate.origin {
                        ShrinkOrigin::Length { .. } => 0,
                        ShrinkOrigin::Narrowed { level } => level + 1,
                    };
                    debug!(
                        step = result.accepted,
                        length = candidate.value.chars().count(),
                        origin = ?candidate.origin,
                        "found smaller failing value"
                    );
                    result.minimal = candidate.value;
                    continue 'rounds;
                }
            }
        }

        result.elapsed = start_time.elapsed();
        result
    }
}
