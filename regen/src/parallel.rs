//! Parallel batch generation over many seeds.

use tracing::debug;

use crate::config::ConfigError;
use crate::error::GenerationError;
use crate::pattern::Pattern;
use crate::rng::Lcg;

/// Configuration for parallel execution
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use for parallel execution
    pub num_threads: usize,
    /// Smallest batch worth splitting across threads
    pub batch_size: usize,
    /// Whether to enable parallel execution
    pub enabled: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            batch_size: 10,
            enabled: true,
        }
    }
}

impl ParallelConfig {
    /// Always generate on the calling thread
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::InvalidThreads(self.num_threads));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }
}

fn generate_sequential(
    pattern: &Pattern,
    seeds: &[i64],
    target: Option<usize>,
) -> Result<Vec<String>, GenerationError> {
    seeds
        .iter()
        .map(|&seed| {
            pattern
                .generate_with(Lcg::new(seed), target)
                .map(|(value, _)| value)
        })
        .collect()
}

/// Generate one string per seed, in seed order
///
/// Each output equals what [`Pattern::generate`] (or
/// [`Pattern::generate_sized`] with a target) returns for that seed; only
/// the scheduling differs.
pub fn generate_batch(
    pattern: &Pattern,
    seeds: &[i64],
    target: Option<usize>,
    config: &ParallelConfig,
) -> Result<Vec<String>, GenerationError> {
    if !config.enabled || config.num_threads <= 1 || seeds.len() < config.batch_size {
        debug!(count = seeds.len(), "generating batch sequentially");
        return generate_sequential(pattern, seeds, target);
    }

    let num_threads = config.num_threads.min(seeds.len());
    let chunk_size = seeds.len().div_ceil(num_threads);
    debug!(
        count = seeds.len(),
        threads = num_threads,
        chunk_size,
        "generating batch in parallel"
    );

    let outcome = crossbeam::scope(|s| -> Result<Vec<String>, GenerationError> {
        let handles: Vec<_> = seeds
            .chunks(chunk_size)
            .map(|chunk| s.spawn(move |_| generate_sequential(pattern, chunk, target)))
            .collect();

        let mut values = Vec::with_capacity(seeds.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => values.extend(chunk?),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(values)
    });

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
