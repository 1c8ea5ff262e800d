use core::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr};

use crate::constants::{DEFAULT_TIMEOUT, WORK_PERIOD_MAX};

/// Represents the reporting mode of the SDS011 sensor.
#[derive(
    PartialEq, Eq, Copy, Clone, Debug, Display, EnumString, FromRepr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReportingMode {
    /// In Active mode, the sensor automatically reports data.
    Active = 0x00,
    /// In Query mode, the sensor only reports data when queried.
    Query = 0x01,
}

/// Represents the power state of the SDS011 sensor.
#[derive(
    PartialEq, Eq, Copy, Clone, Debug, Display, EnumString, FromRepr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum WorkMode {
    /// Laser and fan powered down.
    Sleep = 0x00,
    /// Laser and fan running, the sensor is measuring.
    Active = 0x01,
}

/// Minutes between automatic measurement cycles, `0` meaning continuous.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Default)]
pub struct WorkPeriod(u8);

impl WorkPeriod {
    /// Continuous operation.
    pub const CONTINUOUS: WorkPeriod = WorkPeriod(0);
    /// Longest period the sensor accepts.
    pub const MAX: WorkPeriod = WorkPeriod(WORK_PERIOD_MAX);

    /// Returns the period in minutes.
    pub fn minutes(self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for WorkPeriod {
    type Error = i32;

    fn try_from(minutes: i32) -> Result<Self, Self::Error> {
        match u8::try_from(minutes) {
            Ok(m) if m <= WORK_PERIOD_MAX => Ok(WorkPeriod(m)),
            _ => Err(minutes),
        }
    }
}

/// Represents the unique identifier of the SDS011 sensor.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct DeviceId {
    /// The first byte of the device ID.
    pub id1: u8,
    /// The second byte of the device ID.
    pub id2: u8,
}

impl Default for DeviceId {
    /// Returns the wildcard id, which every sensor answers to.
    fn default() -> DeviceId {
        DeviceId {
            id1: 0xff,
            id2: 0xff,
        }
    }
}

/// How strictly inbound frames are checked.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub enum Framing {
    /// Only the frame length and checksum are verified.
    #[default]
    Permissive,
    /// Head and tail markers are verified as well.
    Strict,
}

/// Configuration settings for the SDS011 sensor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    /// The device ID commands are addressed to.
    pub id: DeviceId,
    /// The reporting mode the sensor is expected to be in.
    pub mode: ReportingMode,
    /// How long a single transaction may wait for its response frame.
    pub timeout: Duration,
    /// Validation policy for inbound frames.
    pub framing: Framing,
}

impl Config {
    /// Creates a new `Config` instance.
    ///
    /// # Arguments
    ///
    /// * `id` - The `DeviceId` for the sensor.
    /// * `mode` - The `ReportingMode` for the sensor.
    pub fn new(id: DeviceId, mode: ReportingMode) -> Config {
        Config {
            id,
            mode,
            ..Config::default()
        }
    }
    /// Sets the device ID for the configuration.
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = id;
        self
    }
    /// Sets the reporting mode for the configuration.
    pub fn mode(mut self, mode: ReportingMode) -> Self {
        self.mode = mode;
        self
    }
    /// Sets the transaction timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
    /// Sets the frame validation policy.
    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }
}

/// Provides default configuration values for the SDS011 sensor.
impl Default for Config {
    /// The default configuration uses the wildcard device ID, `Query` mode,
    /// a five second timeout and permissive framing.
    fn default() -> Config {
        Config {
            id: DeviceId::default(),
            mode: ReportingMode::Query,
            timeout: DEFAULT_TIMEOUT,
            framing: Framing::Permissive,
        }
    }
}
