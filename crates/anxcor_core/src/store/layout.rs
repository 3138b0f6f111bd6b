//! Kind-driven directory layout for saved arrays.

use std::path::{Path, PathBuf};

use crate::models::{iso_timestamp, ArrayError, ArrayKind, LabeledArray, OPERATIONS, PAIR_AXIS, STATION_AXIS};

use super::artifact::{self, StoredElement};
use super::{StoreError, StoreResult};

/// File stem used for combined datasets.
pub const COMBINED_STEM: &str = "combined_data";

/// Saves arrays under a root directory, choosing the sub-path from the
/// array's kind.
#[derive(Debug, Clone)]
pub struct ArrayStore {
    root: PathBuf,
}

impl ArrayStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stem (extension-less path) an array is saved under.
    ///
    /// - stacked: `<root>/<pair>/<stacks>/<starttime>`
    /// - single station: `<root>/<last operation>/<starttime>/<station>`
    /// - combined: `<root>/<first pair>|<pair count>/combined_data`
    pub fn path_for<T>(&self, array: &LabeledArray<T>) -> StoreResult<PathBuf> {
        let components: Vec<String> = match array.kind() {
            ArrayKind::Stacked => {
                let pair = array.first_label(PAIR_AXIS)?.to_string();
                let stacks = array
                    .attrs
                    .stacks()
                    .ok_or_else(|| ArrayError::MissingAttribute(crate::models::STACKS.to_string()))?;
                vec![pair, stacks.to_string(), iso_timestamp(array.starttime()?)]
            }
            ArrayKind::SingleStation => {
                let operation = array
                    .attrs
                    .last_operation()
                    .ok_or_else(|| ArrayError::MissingAttribute(OPERATIONS.to_string()))?
                    .to_string();
                let station = match array.first_label(STATION_AXIS) {
                    Ok(station) => station,
                    Err(_) => array.first_label(PAIR_AXIS)?,
                };
                vec![operation, iso_timestamp(array.starttime()?), station.to_string()]
            }
            ArrayKind::CombinedDataset => {
                let pairs = array.labels(PAIR_AXIS)?;
                let first = pairs
                    .first()
                    .ok_or_else(|| ArrayError::Shape("combined dataset has no pairs".to_string()))?;
                vec![format!("{}|{}", first, pairs.len()), COMBINED_STEM.to_string()]
            }
        };

        let mut path = self.root.clone();
        for component in components {
            check_component(&component)?;
            path.push(component);
        }
        Ok(path)
    }

    /// Save under [`path_for`](Self::path_for) and return the stem used.
    pub fn save<T: StoredElement>(&self, array: &LabeledArray<T>) -> StoreResult<PathBuf> {
        let stem = self.path_for(array)?;
        artifact::write(array, &stem)?;
        tracing::info!("Saved {} array '{}' to {}", array.kind(), array.name(), stem.display());
        Ok(stem)
    }

    pub fn load<T: StoredElement>(&self, stem: &Path) -> StoreResult<LabeledArray<T>> {
        artifact::read(stem)
    }
}

/// Reject path components that are empty, relative markers, or contain a
/// separator.
pub fn check_component(component: &str) -> StoreResult<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('/')
        || component.contains('\\')
        || component.contains(std::path::MAIN_SEPARATOR)
    {
        return Err(StoreError::InvalidComponent(component.to_string()));
    }
    Ok(())
}
