//! Waveform source collaborator.
//!
//! Station adapters live outside this crate; they hand windows to the
//! engine as single-station labeled arrays (`channel × station_id × time`).

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{truncate_to, LabeledArray, STARTTIME_PRECISION};

/// Errors from a waveform source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// No data for the station over the requested span.
    #[error("No data for station '{station}' between {start} and {end}")]
    NotAvailable { station: String, start: f64, end: f64 },

    /// The adapter failed for a reason of its own.
    #[error("Waveform source failure: {0}")]
    Backend(String),
}

/// Result type for waveform sources.
pub type SourceResult<T> = Result<T, SourceError>;

/// Supplies raw windows for a station and epoch span.
pub trait WaveformSource: Send + Sync {
    fn fetch(&self, station: &str, start: f64, end: f64) -> SourceResult<LabeledArray>;
}

/// In-memory source keyed by station and start time, for tests and
/// replaying stored windows.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    windows: HashMap<(String, i64), LabeledArray>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `window` under its first station label and start time.
    pub fn insert(&mut self, window: LabeledArray) -> crate::models::ArrayResult<()> {
        let station = window.first_label(crate::models::STATION_AXIS)?.to_string();
        let key = (station, centis(window.starttime()?));
        self.windows.insert(key, window);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

fn centis(epoch: f64) -> i64 {
    (truncate_to(epoch, STARTTIME_PRECISION) * STARTTIME_PRECISION).round() as i64
}

impl WaveformSource for MemorySource {
    fn fetch(&self, station: &str, start: f64, end: f64) -> SourceResult<LabeledArray> {
        self.windows
            .get(&(station.to_string(), centis(start)))
            .cloned()
            .ok_or_else(|| SourceError::NotAvailable {
                station: station.to_string(),
                start,
                end,
            })
    }
}
