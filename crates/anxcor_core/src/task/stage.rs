//! Stage descriptors.

use std::fmt;
use std::sync::Arc;

use crate::models::{AttrValue, LabeledArray};

use super::errors::StageResult;

/// Pure compute function of a stage.
pub type ComputeFn = Arc<dyn Fn(&[&LabeledArray]) -> StageResult<LabeledArray> + Send + Sync>;

/// Transform applied to an array loaded from the cache.
pub type PostReadFn = fn(LabeledArray) -> LabeledArray;

fn identity(array: LabeledArray) -> LabeledArray {
    array
}

/// A named processing step: compute function plus the metadata it stamps.
///
/// `name` keys the cache directory; `operation` is the entry appended to
/// the provenance log. They are usually the same string.
#[derive(Clone)]
pub struct Stage {
    name: String,
    operation: String,
    compute: ComputeFn,
    metadata: Vec<(String, AttrValue)>,
    post_read: PostReadFn,
}

impl Stage {
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&[&LabeledArray]) -> StageResult<LabeledArray> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            operation: name.clone(),
            name,
            compute: Arc::new(compute),
            metadata: Vec::new(),
            post_read: identity,
        }
    }

    /// Provenance entry differing from the stage name.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Constant attribute stamped on every result.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn with_post_read(mut self, post_read: PostReadFn) -> Self {
        self.post_read = post_read;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn metadata(&self) -> &[(String, AttrValue)] {
        &self.metadata
    }

    pub fn compute(&self, inputs: &[&LabeledArray]) -> StageResult<LabeledArray> {
        (self.compute)(inputs)
    }

    /// Shared handle to the compute function, for shipping to a worker.
    pub fn compute_fn(&self) -> ComputeFn {
        Arc::clone(&self.compute)
    }

    pub fn post_read(&self, array: LabeledArray) -> LabeledArray {
        (self.post_read)(array)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("operation", &self.operation)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
