//! Cache path derivation.

use std::path::{Path, PathBuf};

use crate::models::time_signature;
use crate::store::check_component;

use super::errors::{TaskError, TaskResult};

/// `<dir>/<stage>/<time signature>/<station>`.
///
/// Every component is validated so distinct `(stage, time, station)`
/// triples can never map to the same path.
pub fn cache_stem(dir: &Path, stage: &str, starttime: f64, station: &str) -> TaskResult<PathBuf> {
    let signature = time_signature(starttime);
    let mut path = dir.to_path_buf();
    for component in [stage, signature.as_str(), station] {
        check_component(component).map_err(|_| TaskError::invalid_key(stage, component))?;
        path.push(component);
    }
    Ok(path)
}
