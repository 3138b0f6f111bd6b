//! anxcor core - ambient-noise cross-correlation engine
//!
//! Labeled seismic arrays flow through processing stages (filtering,
//! tapering, correlation, stacking). Each stage runs as a [`task::Task`]
//! that can pass input through, reuse a cached result, or compute and
//! optionally persist its output.

pub mod config;
pub mod correlation;
pub mod filters;
pub mod logging;
pub mod models;
pub mod source;
pub mod stages;
pub mod store;
pub mod task;

pub use correlation::{cross_correlate, CorrelationError, CorrelationParams};
pub use models::{ArrayKind, Attributes, Axis, LabeledArray};
pub use source::{MemorySource, WaveformSource};
pub use store::{ArrayStore, StoreError};
pub use task::{ExecutionMode, Executor, PoolExecutor, Stage, Task, TaskConfig, TaskContext, TaskError};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
