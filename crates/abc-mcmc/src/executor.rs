use abc_core::{AbcError, ErrorInfo};
use rayon::prelude::*;

/// Fixed-size worker pool mapping a task function over an ordered batch.
///
/// Results come back in input order whatever the completion order, and the
/// first task failure aborts the batch.
pub struct ParallelExecutor {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("workers", &self.workers)
            .finish()
    }
}

impl ParallelExecutor {
    /// Builds a pool with `workers` threads.
    pub fn new(workers: usize) -> Result<Self, AbcError> {
        if workers == 0 {
            return Err(AbcError::Config(
                ErrorInfo::new("workers-zero", "executor needs at least one worker")
                    .with_hint("set `workers` to a positive value"),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("abc-worker-{index}"))
            .build()
            .map_err(|err| AbcError::Config(ErrorInfo::new("thread-pool", err.to_string())))?;
        Ok(Self { pool, workers })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Applies `task(index, item)` to every item and returns the results in input order.
    pub fn run<T, R, F>(&self, tasks: &[T], task: F) -> Result<Vec<R>, AbcError>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> Result<R, AbcError> + Sync + Send,
    {
        self.pool.install(|| {
            tasks
                .par_iter()
                .enumerate()
                .map(|(index, item)| task(index, item))
                .collect()
        })
    }
}
