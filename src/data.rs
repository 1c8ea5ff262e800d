use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// A single measurement taken at a specific point in time.
///
/// Concentrations are in µg/m³ with one decimal digit of resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// When the frame carrying the measurement was received.
    pub timestamp: DateTime<Utc>,
    /// PM2.5 concentration in µg/m³.
    pub pm2_5: f32,
    /// PM10 concentration in µg/m³.
    pub pm10: f32,
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.1} (PM2.5), {:.1} (PM10) µg/m³",
            self.timestamp.to_rfc2822(),
            self.pm2_5,
            self.pm10
        )
    }
}

/// Firmware build date as reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firmware {
    /// Years since 2000.
    pub year: u8,
    pub month: u8,
    pub day: u8,
}

impl fmt::Display for Firmware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "20{:02}-{}-{}", self.year, self.month, self.day)
    }
}

/// Decodes the PM2.5 and PM10 counts of a data frame.
///
/// Each value is a little-endian `u16` holding tenths of µg/m³.
///
/// # Errors
///
/// - [`FrameError::Length`] if `raw` is not exactly 4 bytes long.
pub fn decode_concentrations(raw: &[u8]) -> Result<(f32, f32), FrameError> {
    let raw: [u8; 4] = raw.try_into().map_err(|_| FrameError::Length {
        expected: 4,
        actual: raw.len(),
    })?;

    let pm2_5 = u16::from_le_bytes([raw[0], raw[1]]) as f32 / 10.0;
    let pm10 = u16::from_le_bytes([raw[2], raw[3]]) as f32 / 10.0;
    Ok((pm2_5, pm10))
}
