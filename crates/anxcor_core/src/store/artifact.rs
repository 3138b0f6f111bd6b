//! Payload and attribute sidecar persistence.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use num_complex::Complex64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{ArrayKind, AttrValue, Attributes, Axis, LabeledArray};

use super::{StoreError, StoreResult};

const PAYLOAD_EXT: &str = ".json";
const SIDECAR_EXT: &str = ".metadata.json";
const TEMP_EXT: &str = ".tmp";

/// Element types that can be written to the store.
pub trait StoredElement: Serialize + DeserializeOwned + Clone {
    fn is_finite(&self) -> bool;
}

impl StoredElement for f64 {
    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

impl StoredElement for Complex64 {
    fn is_finite(&self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

#[derive(Serialize)]
struct PayloadRef<'a, T> {
    name: &'a str,
    kind: ArrayKind,
    axes: &'a [Axis],
    data: &'a ArrayD<T>,
}

#[derive(Deserialize)]
struct Payload<T> {
    name: String,
    kind: ArrayKind,
    axes: Vec<Axis>,
    data: ArrayD<T>,
}

/// Path of the numeric payload for `stem`.
pub fn payload_path(stem: &Path) -> PathBuf {
    with_suffix(stem, PAYLOAD_EXT)
}

/// Path of the attribute sidecar for `stem`.
pub fn sidecar_path(stem: &Path) -> PathBuf {
    with_suffix(stem, SIDECAR_EXT)
}

// Stems routinely contain dots (station ids, fractional timestamps), so
// suffixes are appended rather than set with `with_extension`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// True when both artifacts for `stem` are present.
pub fn exists(stem: &Path) -> bool {
    payload_path(stem).is_file() && sidecar_path(stem).is_file()
}

/// Persist `array` as `<stem>.json` plus `<stem>.metadata.json`.
///
/// Parent directories are created as needed. Each artifact goes to a
/// temporary sibling first and is renamed into place, payload before
/// sidecar, so a visible sidecar always has a complete payload next to it.
pub fn write<T: StoredElement>(array: &LabeledArray<T>, stem: &Path) -> StoreResult<()> {
    if let Some(index) = array.data().iter().position(|v| !v.is_finite()) {
        return Err(StoreError::NonFinite {
            path: payload_path(stem),
            index,
        });
    }

    if let Some(field) = non_finite_field(array) {
        return Err(StoreError::NonFiniteField {
            path: stem.to_path_buf(),
            field,
        });
    }

    if let Some(parent) = stem.parent() {
        fs::create_dir_all(parent)?;
    }

    let payload = PayloadRef {
        name: array.name(),
        kind: array.kind(),
        axes: array.axes(),
        data: array.data(),
    };
    let payload_json = serde_json::to_vec(&payload).map_err(|e| StoreError::Encode {
        path: payload_path(stem),
        source: e,
    })?;
    let sidecar_json = serde_json::to_vec_pretty(&array.attrs).map_err(|e| StoreError::Encode {
        path: sidecar_path(stem),
        source: e,
    })?;

    atomic_write(&payload_path(stem), &payload_json)?;
    atomic_write(&sidecar_path(stem), &sidecar_json)?;

    tracing::debug!("Stored '{}' at {}", array.name(), stem.display());
    Ok(())
}

// serde_json writes NaN and infinities as `null`, which neither a float
// attribute nor a coordinate can be read back from.
fn non_finite_field<T>(array: &LabeledArray<T>) -> Option<String> {
    let attr = array.attrs.iter().find_map(|(key, value)| match value {
        AttrValue::Float(v) if !v.is_finite() => Some(format!("attrs.{}", key)),
        _ => None,
    });
    attr.or_else(|| {
        array.axes().iter().find_map(|axis| {
            axis.coords
                .values()
                .filter(|values| values.iter().any(|v| !v.is_finite()))
                .map(|_| format!("axes.{}", axis.name))
        })
    })
}

/// Load the array stored under `stem`.
pub fn read<T: StoredElement>(stem: &Path) -> StoreResult<LabeledArray<T>> {
    let payload_file = payload_path(stem);
    let sidecar_file = sidecar_path(stem);
    for path in [&payload_file, &sidecar_file] {
        if !path.is_file() {
            return Err(StoreError::NotFound(path.clone()));
        }
    }

    let payload: Payload<T> = parse(&payload_file)?;
    let attrs: Attributes = parse(&sidecar_file)?;

    let array = LabeledArray::new(payload.name, payload.data, payload.axes)
        .map_err(|e| StoreError::Invalid {
            path: payload_file,
            source: e,
        })?
        .with_kind(payload.kind)
        .with_attrs(attrs);
    Ok(array)
}

fn parse<D: DeserializeOwned>(path: &Path) -> StoreResult<D> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Format {
        path: path.to_path_buf(),
        source: e,
    })
}

fn atomic_write(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let temp_path = with_suffix(path, TEMP_EXT);
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
