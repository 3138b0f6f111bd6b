//! Task execution and caching framework.
//!
//! A [`Task`] wraps one [`Stage`] with an [`ExecutionMode`]. Invoking it
//! either passes input through, loads a cached result, or computes (locally
//! or through an [`Executor`]), then stamps provenance and optionally
//! writes the result back to the cache.

pub mod errors;
pub mod executor;
pub mod runner;
pub mod signature;
pub mod stage;

pub use errors::{ExecutorError, ExecutorResult, StageError, StageResult, TaskError, TaskResult};
pub use executor::{run_catching, Executor, Job, JobHandle, PoolExecutor};
pub use runner::{ExecutionMode, Task, TaskConfig, TaskContext};
pub use signature::cache_stem;
pub use stage::{ComputeFn, PostReadFn, Stage};
