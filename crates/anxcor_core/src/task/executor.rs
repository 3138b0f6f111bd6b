//! Executor collaborator for off-thread stage computation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use crate::models::LabeledArray;

use super::errors::{ExecutorError, ExecutorResult, StageResult};

/// An owned unit of work shipped to an executor.
pub type Job = Box<dyn FnOnce() -> StageResult<LabeledArray> + Send + 'static>;

/// Something that can run a [`Job`] and hand back its result.
pub trait Executor: Send + Sync {
    fn submit(&self, job: Job) -> ExecutorResult<JobHandle>;
}

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    receiver: mpsc::Receiver<ExecutorResult<StageResult<LabeledArray>>>,
}

impl JobHandle {
    /// Handle plus the sender a worker delivers the outcome through.
    pub fn channel() -> (mpsc::Sender<ExecutorResult<StageResult<LabeledArray>>>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }

    /// Block until the job finishes.
    pub fn wait(self) -> ExecutorResult<StageResult<LabeledArray>> {
        self.receiver.recv().map_err(|_| ExecutorError::Disconnected)?
    }
}

/// Runs a job, turning a panic into [`ExecutorError::Panicked`].
pub fn run_catching(job: Job) -> ExecutorResult<StageResult<LabeledArray>> {
    panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| ExecutorError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Executor backed by a dedicated rayon thread pool.
pub struct PoolExecutor {
    pool: rayon::ThreadPool,
}

impl PoolExecutor {
    /// Build a pool with `threads` workers (0 lets rayon choose).
    pub fn new(threads: usize) -> ExecutorResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("anxcor-worker-{}", i))
            .build()
            .map_err(|e| ExecutorError::Rejected(e.to_string()))?;
        tracing::debug!("Started executor pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for PoolExecutor {
    fn submit(&self, job: Job) -> ExecutorResult<JobHandle> {
        let (sender, handle) = JobHandle::channel();
        self.pool.spawn(move || {
            // the caller may have stopped waiting; nothing to report then
            let _ = sender.send(run_catching(job));
        });
        Ok(handle)
    }
}

impl std::fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("threads", &self.threads())
            .finish()
    }
}
