//! The labeled array value type.

use ndarray::{ArrayD, Axis as NdAxis, IxDyn};
use serde::{Deserialize, Serialize};

use super::attributes::{Attributes, DELTA, STARTTIME};

pub const CHANNEL_AXIS: &str = "channel";
pub const STATION_AXIS: &str = "station_id";
pub const TIME_AXIS: &str = "time";
pub const FREQUENCY_AXIS: &str = "frequency";
pub const PAIR_AXIS: &str = "pair";
pub const SRC_CHAN_AXIS: &str = "src_chan";
pub const REC_CHAN_AXIS: &str = "rec_chan";

/// Error types for labeled array construction and access.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArrayError {
    /// A required attribute is absent.
    #[error("Missing required attribute '{0}'")]
    MissingAttribute(String),

    /// An attribute is present with the wrong type.
    #[error("Attribute '{key}' is not {expected}")]
    AttributeType { key: String, expected: &'static str },

    /// Coordinate count disagrees with the data extent.
    #[error("Axis '{axis}' has {coords} coordinates but data extent is {extent}")]
    CoordinateLength {
        axis: String,
        coords: usize,
        extent: usize,
    },

    /// Number of labeled axes differs from the data rank.
    #[error("Expected {expected} axes, got {got}")]
    AxisCount { expected: usize, got: usize },

    /// A named axis is absent.
    #[error("Missing axis '{0}'")]
    MissingAxis(String),

    /// An axis exists but is not label-valued (or not value-valued).
    #[error("Axis '{0}' has the wrong coordinate type")]
    CoordinateType(String),

    /// Data could not be arranged into the requested shape.
    #[error("Invalid shape: {0}")]
    Shape(String),
}

/// Result type for array operations.
pub type ArrayResult<T> = Result<T, ArrayError>;

/// Coordinates along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum Coords {
    /// Identifiers (channels, stations, pairs).
    Labels(Vec<String>),
    /// Numeric positions (epoch seconds, lags, frequencies).
    Values(Vec<f64>),
}

impl Coords {
    pub fn len(&self) -> usize {
        match self {
            Coords::Labels(v) => v.len(),
            Coords::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Option<&[String]> {
        match self {
            Coords::Labels(v) => Some(v),
            Coords::Values(_) => None,
        }
    }

    pub fn values(&self) -> Option<&[f64]> {
        match self {
            Coords::Values(v) => Some(v),
            Coords::Labels(_) => None,
        }
    }
}

/// A named axis with its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub coords: Coords,
}

impl Axis {
    pub fn labels<S: Into<String>>(name: &str, labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.to_string(),
            coords: Coords::Labels(labels.into_iter().map(Into::into).collect()),
        }
    }

    pub fn values(name: &str, values: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            coords: Coords::Values(values),
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// What an array represents; fixes its on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKind {
    /// A window (or a per-window result) tied to one station or pair.
    #[default]
    SingleStation,
    /// An aggregate of several correlation windows.
    Stacked,
    /// Several pairs combined along the `pair` axis.
    CombinedDataset,
}

impl std::fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayKind::SingleStation => write!(f, "single_station"),
            ArrayKind::Stacked => write!(f, "stacked"),
            ArrayKind::CombinedDataset => write!(f, "combined_dataset"),
        }
    }
}

/// N-dimensional buffer with per-axis coordinates and attributes.
///
/// The coordinate count on every axis always equals the buffer extent on
/// that axis; constructors reject anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray<T = f64> {
    name: String,
    kind: ArrayKind,
    data: ArrayD<T>,
    axes: Vec<Axis>,
    pub attrs: Attributes,
}

impl<T> LabeledArray<T> {
    /// Build an array, validating axes against the data shape.
    pub fn new(name: impl Into<String>, data: ArrayD<T>, axes: Vec<Axis>) -> ArrayResult<Self> {
        validate_axes(data.shape(), &axes)?;
        Ok(Self {
            name: name.into(),
            kind: ArrayKind::default(),
            data,
            axes,
            attrs: Attributes::new(),
        })
    }

    pub fn with_kind(mut self, kind: ArrayKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Extent of the last (time or frequency) axis.
    pub fn samples(&self) -> usize {
        self.data.shape().last().copied().unwrap_or(0)
    }

    pub fn axis_index(&self, name: &str) -> ArrayResult<usize> {
        self.axes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| ArrayError::MissingAxis(name.to_string()))
    }

    pub fn axis(&self, name: &str) -> ArrayResult<&Axis> {
        let idx = self.axis_index(name)?;
        Ok(&self.axes[idx])
    }

    pub fn labels(&self, axis: &str) -> ArrayResult<&[String]> {
        self.axis(axis)?
            .coords
            .labels()
            .ok_or_else(|| ArrayError::CoordinateType(axis.to_string()))
    }

    pub fn coord_values(&self, axis: &str) -> ArrayResult<&[f64]> {
        self.axis(axis)?
            .coords
            .values()
            .ok_or_else(|| ArrayError::CoordinateType(axis.to_string()))
    }

    /// First label on a label-valued axis.
    pub fn first_label(&self, axis: &str) -> ArrayResult<&str> {
        self.labels(axis)?
            .first()
            .map(String::as_str)
            .ok_or_else(|| ArrayError::Shape(format!("axis '{}' is empty", axis)))
    }

    pub fn delta(&self) -> ArrayResult<f64> {
        self.attrs.delta()
    }

    pub fn starttime(&self) -> ArrayResult<f64> {
        self.attrs.starttime()
    }

    /// Same labels, name, kind and attributes over a new buffer of equal shape.
    pub fn with_data<U>(&self, data: ArrayD<U>) -> ArrayResult<LabeledArray<U>> {
        validate_axes(data.shape(), &self.axes)?;
        Ok(LabeledArray {
            name: self.name.clone(),
            kind: self.kind,
            data,
            axes: self.axes.clone(),
            attrs: self.attrs.clone(),
        })
    }

    /// Same leading labels over a buffer whose last axis is replaced.
    pub fn with_last_axis<U>(&self, data: ArrayD<U>, last: Axis) -> ArrayResult<LabeledArray<U>> {
        let mut axes = self.axes.clone();
        match axes.last_mut() {
            Some(slot) => *slot = last,
            None => return Err(ArrayError::Shape("array has no axes".to_string())),
        }
        validate_axes(data.shape(), &axes)?;
        Ok(LabeledArray {
            name: self.name.clone(),
            kind: self.kind,
            data,
            axes,
            attrs: self.attrs.clone(),
        })
    }

    pub fn into_data(self) -> ArrayD<T> {
        self.data
    }
}

impl LabeledArray<f64> {
    /// Build a single-station window laid out as `channel × station_id × time`.
    ///
    /// `traces` holds one equally long sample vector per channel.
    pub fn window(
        station: &str,
        channels: &[&str],
        traces: Vec<Vec<f64>>,
        starttime: f64,
        delta: f64,
    ) -> ArrayResult<Self> {
        if traces.len() != channels.len() {
            return Err(ArrayError::CoordinateLength {
                axis: CHANNEL_AXIS.to_string(),
                coords: channels.len(),
                extent: traces.len(),
            });
        }
        let samples = traces.first().map(Vec::len).unwrap_or(0);
        if traces.iter().any(|t| t.len() != samples) {
            return Err(ArrayError::Shape(
                "all traces in a window must have the same length".to_string(),
            ));
        }

        let flat: Vec<f64> = traces.into_iter().flatten().collect();
        let data = ArrayD::from_shape_vec(IxDyn(&[channels.len(), 1, samples]), flat)
            .map_err(|e| ArrayError::Shape(e.to_string()))?;

        let times = (0..samples).map(|i| starttime + i as f64 * delta).collect();
        let axes = vec![
            Axis::labels(CHANNEL_AXIS, channels.iter().copied()),
            Axis::labels(STATION_AXIS, [station]),
            Axis::values(TIME_AXIS, times),
        ];

        let mut array = Self::new(station, data, axes)?;
        array.attrs.insert(DELTA, delta);
        array.attrs.insert(STARTTIME, starttime);
        Ok(array)
    }
}

/// Apply `f` to every lane along the last axis, producing lanes of `out_len`.
pub(crate) fn map_lanes<T, U, F>(data: &ArrayD<T>, out_len: usize, mut f: F) -> ArrayResult<ArrayD<U>>
where
    T: Clone,
    F: FnMut(&[T]) -> Vec<U>,
{
    let ndim = data.ndim();
    if ndim == 0 {
        return Err(ArrayError::Shape("cannot map lanes of a scalar".to_string()));
    }

    let mut shape = data.shape().to_vec();
    shape[ndim - 1] = out_len;

    let mut flat = Vec::with_capacity(shape.iter().product());
    for lane in data.lanes(NdAxis(ndim - 1)) {
        let input: Vec<T> = lane.iter().cloned().collect();
        let output = f(&input);
        if output.len() != out_len {
            return Err(ArrayError::Shape(format!(
                "lane transform produced {} samples, expected {}",
                output.len(),
                out_len
            )));
        }
        flat.extend(output);
    }

    ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|e| ArrayError::Shape(e.to_string()))
}

fn validate_axes(shape: &[usize], axes: &[Axis]) -> ArrayResult<()> {
    if shape.len() != axes.len() {
        return Err(ArrayError::AxisCount {
            expected: shape.len(),
            got: axes.len(),
        });
    }
    for (axis, &extent) in axes.iter().zip(shape) {
        if axis.len() != extent {
            return Err(ArrayError::CoordinateLength {
                axis: axis.name.clone(),
                coords: axis.len(),
                extent,
            });
        }
    }
    Ok(())
}
