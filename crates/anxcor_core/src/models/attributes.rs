//! Attribute mapping carried by every labeled array.
//!
//! Attributes are the provenance and sampling metadata of an array
//! (`delta`, `starttime`, the `operations` log, `stacks`, plus any
//! stage-declared constants). They are persisted separately from the
//! numeric payload, so they must round-trip through JSON unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::array::{ArrayError, ArrayResult};

/// Sampling interval in seconds.
pub const DELTA: &str = "delta";
/// Epoch seconds of the first sample.
pub const STARTTIME: &str = "starttime";
/// Newline-joined provenance log.
pub const OPERATIONS: &str = "operations";
/// Number of correlation windows combined into a stack.
pub const STACKS: &str = "stacks";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// Numeric view of the value; integers widen to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

/// Ordered string-keyed attribute mapping.
///
/// Cloning is a deep copy, so two branches of a lineage never share
/// provenance state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    /// Merge `other` into `self`; keys present in both take `other`'s value.
    pub fn merge(&mut self, other: &Attributes) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Required numeric attribute.
    pub fn float(&self, key: &str) -> ArrayResult<f64> {
        let value = self
            .get(key)
            .ok_or_else(|| ArrayError::MissingAttribute(key.to_string()))?;
        value.as_f64().ok_or_else(|| ArrayError::AttributeType {
            key: key.to_string(),
            expected: "numeric",
        })
    }

    /// Sampling interval in seconds.
    pub fn delta(&self) -> ArrayResult<f64> {
        self.float(DELTA)
    }

    /// Epoch seconds of the first sample.
    pub fn starttime(&self) -> ArrayResult<f64> {
        self.float(STARTTIME)
    }

    /// Raw provenance log, if any stage has been applied.
    pub fn operations(&self) -> Option<&str> {
        self.get(OPERATIONS).and_then(AttrValue::as_str)
    }

    /// Provenance entries in application order.
    pub fn operation_list(&self) -> Vec<&str> {
        match self.operations() {
            Some(log) if !log.is_empty() => log.split('\n').collect(),
            _ => Vec::new(),
        }
    }

    pub fn last_operation(&self) -> Option<&str> {
        self.operations()
            .filter(|log| !log.is_empty())
            .and_then(|log| log.rsplit('\n').next())
    }

    /// Append one entry to the provenance log, starting it if absent.
    pub fn push_operation(&mut self, operation: &str) {
        let log = match self.operations() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, operation),
            _ => operation.to_string(),
        };
        self.insert(OPERATIONS, log);
    }

    pub fn stacks(&self) -> Option<i64> {
        self.get(STACKS).and_then(AttrValue::as_i64)
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
