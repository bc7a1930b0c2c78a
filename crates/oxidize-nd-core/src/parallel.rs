//! Chunked fork-join execution of bulk array operations.
//!
//! Work is split into disjoint, deterministic output ranges. Every chunk task
//! is joined before a result is returned; if any chunk fails the output
//! buffer is dropped and one error is returned, so partial results are never
//! observable. When several chunks fail in parallel, the error returned is
//! whichever one rayon observes first, which is not necessarily the error of
//! the lowest-index chunk. Sequential runs always return the lowest-index
//! error.
//!
//! There is no timeout: a chunk that never finishes blocks the calling
//! thread indefinitely.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dtype::Element;
use crate::error::{TensorError, TensorResult};
use crate::iterator::StridePointerIterator;
use crate::layout::StrideLayout;
use crate::order::Order;
use crate::storage::Storage;

const DEFAULT_CHUNK_SIZE: usize = 4096;
const DEFAULT_MIN_PARALLEL_LEN: usize = 32 * 1024;

pub const ENV_CHUNK_SIZE: &str = "OXIDIZE_ND_CHUNK_SIZE";
pub const ENV_MIN_PARALLEL_LEN: &str = "OXIDIZE_ND_MIN_PARALLEL_LEN";
pub const ENV_THREADS: &str = "OXIDIZE_ND_THREADS";

/// Tuning of chunked execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Elements per chunk task.
    pub chunk_size: usize,
    /// Operations smaller than this run on the calling thread.
    pub min_parallel_len: usize,
    /// Dedicated pool size; `None` uses the global rayon pool. A pool is
    /// built the first time a size is used and shared by every later
    /// operation asking for that size, for the rest of the process.
    pub threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_parallel_len: DEFAULT_MIN_PARALLEL_LEN,
            threads: None,
        }
    }
}

impl ParallelConfig {
    /// Configuration that never forks.
    pub fn sequential() -> Self {
        ParallelConfig {
            min_parallel_len: usize::MAX,
            ..Default::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_min_parallel_len(mut self, min_parallel_len: usize) -> Self {
        self.min_parallel_len = min_parallel_len;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn validate(&self) -> TensorResult<()> {
        if self.chunk_size == 0 {
            return Err(TensorError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.threads == Some(0) {
            return Err(TensorError::InvalidConfig("threads must be positive".into()));
        }
        Ok(())
    }

    /// Defaults overridden by the `OXIDIZE_ND_*` environment variables.
    pub fn from_env() -> TensorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TensorResult<Self> {
        let parse = |key: &str| -> TensorResult<Option<usize>> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|e| {
                    TensorError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))
                }),
            }
        };
        let mut config = ParallelConfig::default();
        if let Some(v) = parse(ENV_CHUNK_SIZE)? {
            config.chunk_size = v;
        }
        if let Some(v) = parse(ENV_MIN_PARALLEL_LEN)? {
            config.min_parallel_len = v;
        }
        if let Some(v) = parse(ENV_THREADS)? {
            config.threads = Some(v);
        }
        config.validate()?;
        Ok(config)
    }

    fn is_parallel(&self, len: usize) -> bool {
        len >= self.min_parallel_len && len > self.chunk_size
    }

    /// Run `op` inside the configured pool.
    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> TensorResult<R> {
        match self.threads {
            None => Ok(op()),
            Some(n) => Ok(pool(n)?.install(op)),
        }
    }

    fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// The shared pool of `threads` workers.
fn pool(threads: usize) -> TensorResult<Arc<ThreadPool>> {
    static POOLS: OnceLock<Mutex<HashMap<usize, Arc<ThreadPool>>>> = OnceLock::new();
    let mut pools = POOLS.get_or_init(Default::default).lock();
    if let Some(pool) = pools.get(&threads) {
        return Ok(Arc::clone(pool));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map(Arc::new)
        .map_err(|e| TensorError::ThreadPool(e.to_string()))?;
    debug!(threads, "built thread pool");
    pools.insert(threads, Arc::clone(&pool));
    Ok(pool)
}

/// Disjoint ranges of at most `chunk_size` covering `0..total`.
pub fn chunk_bounds(total: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..total)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(total))
        .collect()
}

fn gather_range<T: Element>(
    storage: &dyn Storage<T>,
    layout: &StrideLayout,
    order: Order,
    start: usize,
    out: &mut [T],
) -> TensorResult<()> {
    let positions: Vec<usize> =
        StridePointerIterator::range(layout, order, start, start + out.len())?.collect();
    storage.gather(&positions, out)
}

/// Read every element of `layout` from `storage` into a new buffer, in the
/// sequence `StridePointerIterator` produces for `order`.
pub fn gather_chunked<T: Element>(
    storage: &dyn Storage<T>,
    layout: &StrideLayout,
    order: Order,
    config: &ParallelConfig,
) -> TensorResult<Vec<T>> {
    config.validate()?;
    let total = layout.size();
    let mut out = vec![T::ZERO; total];
    if !config.is_parallel(total) {
        for range in chunk_bounds(total, config.chunk_size) {
            let start = range.start;
            gather_range(storage, layout, order, start, &mut out[range])?;
        }
        return Ok(out);
    }

    let chunk = config.chunk_size;
    debug!(
        total,
        chunks = total.div_ceil(chunk),
        threads = config.thread_count(),
        "parallel gather"
    );
    config.install(|| {
        out.par_chunks_mut(chunk)
            .enumerate()
            .try_for_each(|(i, slice)| gather_range(storage, layout, order, i * chunk, slice))
    })??;
    Ok(out)
}

/// Evaluate `f(i)` for `i in 0..len`, chunked like `gather_chunked`.
pub fn map_chunked<R, F>(len: usize, config: &ParallelConfig, f: F) -> TensorResult<Vec<R>>
where
    R: Send,
    F: Fn(usize) -> TensorResult<R> + Sync + Send,
{
    config.validate()?;
    if !config.is_parallel(len) {
        return (0..len).map(&f).collect();
    }
    debug!(
        len,
        chunks = len.div_ceil(config.chunk_size),
        threads = config.thread_count(),
        "parallel map"
    );
    let chunk = config.chunk_size;
    config.install(|| {
        (0..len)
            .into_par_iter()
            .with_min_len(chunk)
            .map(&f)
            .collect::<TensorResult<Vec<R>>>()
    })?
}
