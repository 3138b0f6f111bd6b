//! Error types for stages, executors and tasks.
//!
//! Errors chain through layers: Task → Stage → Operation → Detail.

use std::path::PathBuf;

use thiserror::Error;

use crate::correlation::CorrelationError;
use crate::filters::FilterError;
use crate::models::ArrayError;
use crate::store::StoreError;

/// Failure inside a stage's compute function.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Array(#[from] ArrayError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// The stage received the wrong number of inputs.
    #[error("Expected {expected} input(s), got {got}")]
    Arity { expected: usize, got: usize },

    /// Inputs cannot be combined.
    #[error("Incompatible inputs: {0}")]
    Incompatible(String),
}

impl StageError {
    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::Incompatible(message.into())
    }
}

/// Result type for stage compute functions.
pub type StageResult<T> = Result<T, StageError>;

/// Failure of the executor collaborator itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// The executor refused the job.
    #[error("Job submission rejected: {0}")]
    Rejected(String),

    /// The job panicked on a worker.
    #[error("Job panicked: {0}")]
    Panicked(String),

    /// The worker went away without delivering a result.
    #[error("Worker dropped the result channel")]
    Disconnected,
}

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Task-level error with stage context.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The stage's compute function failed.
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: StageError,
    },

    /// The result could not be written to the cache.
    #[error("Stage '{stage}' could not write cache at {}: {source}", .path.display())]
    CacheWrite {
        stage: String,
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// Submission or collection through the executor failed.
    #[error("Stage '{stage}' executor failure: {source}")]
    Executor {
        stage: String,
        #[source]
        source: ExecutorError,
    },

    /// Tasks accept one or two inputs.
    #[error("Stage '{stage}' invoked with {got} inputs; expected 1 or 2")]
    Arity { stage: String, got: usize },

    /// A cache key component is empty or contains a path separator.
    #[error("Stage '{stage}' has invalid cache key component '{component}'")]
    InvalidKey { stage: String, component: String },
}

impl TaskError {
    pub fn stage_failed(stage: impl Into<String>, source: StageError) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            source,
        }
    }

    pub fn cache_write(stage: impl Into<String>, path: impl Into<PathBuf>, source: StoreError) -> Self {
        Self::CacheWrite {
            stage: stage.into(),
            path: path.into(),
            source,
        }
    }

    pub fn executor(stage: impl Into<String>, source: ExecutorError) -> Self {
        Self::Executor {
            stage: stage.into(),
            source,
        }
    }

    pub fn invalid_key(stage: impl Into<String>, component: impl Into<String>) -> Self {
        Self::InvalidKey {
            stage: stage.into(),
            component: component.into(),
        }
    }
}

/// Result type for task invocation.
pub type TaskResult<T> = Result<T, TaskError>;
