//! Worker-pool adapter for the bulk-synchronous solve phases.
//!
//! Both solve phases have the same shape: a mutable slice is split into
//! fixed-size blocks, every block is processed independently, and each block
//! may hand back a partial result. [`ParallelRuntime::map_blocks`] runs that
//! shape on a dedicated pool and returns the partials **in block order**, so
//! the caller can reduce them sequentially and get the same floating-point
//! sums regardless of how blocks were scheduled onto threads. A pool of width
//! one degenerates to a serial loop and is fully supported.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{AdmmError, Result};

/// A fixed-width worker pool the reasoner runs its phases on.
///
/// Kept separate from rayon's global pool so the configured width applies to
/// this solver alone.
pub struct ParallelRuntime {
    pool: ThreadPool,
    num_threads: usize,
}

impl ParallelRuntime {
    /// Builds a pool of the given width.
    ///
    /// # Errors
    ///
    /// Returns [`AdmmError::InvalidConfig`] for a zero width or when the pool
    /// cannot be created.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(AdmmError::InvalidConfig {
                detail: "num_threads must be > 0".to_string(),
            });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| AdmmError::InvalidConfig {
                detail: format!("failed to build worker pool: {e}"),
            })?;

        Ok(Self { pool, num_threads })
    }

    /// The pool width.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Splits `items` into blocks of `block_size` and runs `job` once per
    /// block, in parallel on this pool.
    ///
    /// `job` receives the block index and a mutable view of the block; no two
    /// invocations see the same element. Partial results come back indexed by
    /// block, independent of scheduling.
    pub fn map_blocks<T, R, F>(&self, items: &mut [T], block_size: usize, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(usize, &mut [T]) -> R + Send + Sync,
    {
        assert!(block_size > 0, "block_size must be > 0");

        self.pool.install(|| {
            items
                .par_chunks_mut(block_size)
                .enumerate()
                .map(|(block_index, block)| job(block_index, block))
                .collect()
        })
    }
}
