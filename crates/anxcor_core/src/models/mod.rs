//! Data model: labeled arrays, their attributes, and time helpers.

pub mod array;
pub mod attributes;
pub mod time;

pub use array::{
    ArrayError, ArrayKind, ArrayResult, Axis, Coords, LabeledArray, CHANNEL_AXIS, FREQUENCY_AXIS,
    PAIR_AXIS, REC_CHAN_AXIS, SRC_CHAN_AXIS, STATION_AXIS, TIME_AXIS,
};
pub use attributes::{AttrValue, Attributes, DELTA, OPERATIONS, STACKS, STARTTIME};
pub use time::{iso_timestamp, time_signature, truncate_to, DELTA_PRECISION, STARTTIME_PRECISION};
