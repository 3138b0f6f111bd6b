//! Memoizing task wrapper around a stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::LabeledArray;
use crate::store;

use super::errors::{StageResult, TaskError, TaskResult};
use super::executor::{Executor, Job};
use super::signature::cache_stem;
use super::stage::Stage;

/// How a task treats the cache.
///
/// Reading and writing are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "dir")]
pub enum ExecutionMode {
    /// Pass the first input through untouched.
    Disabled,
    /// Compute every time, never touch the cache.
    #[default]
    Compute,
    /// Try the cache under this directory, compute on a miss.
    ReadCache(PathBuf),
    /// Compute and persist under this directory.
    WriteCache(PathBuf),
}

/// Immutable per-task configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskConfig {
    pub mode: ExecutionMode,
}

impl TaskConfig {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }
}

/// Identifies one window of work for cache keying.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskContext {
    pub starttime: f64,
    pub station: String,
}

impl TaskContext {
    pub fn new(starttime: f64, station: impl Into<String>) -> Self {
        Self {
            starttime,
            station: station.into(),
        }
    }
}

/// A stage plus its execution mode.
#[derive(Debug, Clone)]
pub struct Task {
    stage: Stage,
    config: TaskConfig,
}

impl Task {
    pub fn new(stage: Stage, config: TaskConfig) -> Self {
        Self { stage, config }
    }

    /// Same stage under a different execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.config.mode
    }

    /// Run the stage on one or two inputs.
    ///
    /// In read mode a cached result short-circuits computation; a missing or
    /// unreadable artifact falls through to compute. With an executor the
    /// computation is submitted as an owned job and awaited. Results carry
    /// merged input attributes, the stage's constant metadata, and one more
    /// entry in the `operations` log.
    pub fn invoke(
        &self,
        inputs: &[&LabeledArray],
        ctx: &TaskContext,
        executor: Option<&dyn Executor>,
    ) -> TaskResult<LabeledArray> {
        let name = self.stage.name();
        if inputs.is_empty() || inputs.len() > 2 {
            return Err(TaskError::Arity {
                stage: name.to_string(),
                got: inputs.len(),
            });
        }

        match &self.config.mode {
            ExecutionMode::Disabled => {
                tracing::debug!("Stage '{}' disabled; passing input through", name);
                return Ok(inputs[0].clone());
            }
            ExecutionMode::ReadCache(dir) => {
                let stem = cache_stem(dir, name, ctx.starttime, &ctx.station)?;
                match store::read::<f64>(&stem) {
                    Ok(cached) => {
                        tracing::debug!("Cache hit for '{}' at {}", name, stem.display());
                        return Ok(self.stage.post_read(cached));
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("Cache miss for '{}' at {}", name, stem.display());
                    }
                    Err(e) => {
                        tracing::warn!("Unreadable cache for '{}' ({}); recomputing", name, e);
                    }
                }
            }
            ExecutionMode::Compute | ExecutionMode::WriteCache(_) => {}
        }

        let computed = match executor {
            None => self.stage.compute(inputs),
            Some(executor) => {
                let compute = self.stage.compute_fn();
                let owned: Vec<LabeledArray> = inputs.iter().map(|a| (*a).clone()).collect();
                let job: Job = Box::new(move || -> StageResult<LabeledArray> {
                    let refs: Vec<&LabeledArray> = owned.iter().collect();
                    compute(&refs)
                });
                executor
                    .submit(job)
                    .and_then(|handle| handle.wait())
                    .map_err(|e| TaskError::executor(name, e))?
            }
        };
        let mut result = computed.map_err(|e| TaskError::stage_failed(name, e))?;

        self.stamp(&mut result, inputs);

        if let ExecutionMode::WriteCache(dir) = &self.config.mode {
            let stem = cache_stem(dir, name, ctx.starttime, &ctx.station)?;
            store::write(&result, &stem).map_err(|e| TaskError::cache_write(name, stem.clone(), e))?;
            tracing::debug!("Cached '{}' at {}", name, stem.display());
        }

        tracing::info!(
            "Stage '{}' completed for {} at {}",
            name,
            ctx.station,
            crate::models::iso_timestamp(ctx.starttime)
        );
        Ok(result)
    }

    fn stamp(&self, result: &mut LabeledArray, inputs: &[&LabeledArray]) {
        let mut attrs = inputs[0].attrs.clone();
        if let Some(second) = inputs.get(1) {
            attrs.merge(&second.attrs);
        }
        attrs.merge(&result.attrs);
        for (key, value) in self.stage.metadata() {
            attrs.insert(key.clone(), value.clone());
        }
        attrs.push_operation(self.stage.operation());
        result.attrs = attrs;

        let name = match inputs {
            [single] => single.name().to_string(),
            [first, second, ..] => format!("{}:{}", first.name(), second.name()),
            [] => return,
        };
        result.set_name(name);
    }
}
