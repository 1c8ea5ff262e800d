//! Async driver for the Nova Fitness SDS011 fine dust sensor.
//!
//! The sensor speaks a fixed binary protocol over a 9600 baud 8N1 serial
//! line: 19-byte command frames out, 10-byte response frames back, both
//! protected by a one-byte additive checksum. [`Sds011`] wraps a serial
//! channel implementing [`embedded_io_async::Read`] and
//! [`embedded_io_async::Write`] and exposes the sensor settings and
//! measurements as typed operations.
//!
//! With the `native-serial` feature (enabled by default) a port can be
//! opened by path:
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sds011::{Config, Sds011, WorkMode};
//!
//! let mut sensor = Sds011::open("/dev/ttyUSB0", Config::default())?;
//! sensor.set_work_mode(WorkMode::Active).await?;
//! println!("{}", sensor.query_data().await?);
//! # Ok(())
//! # }
//! ```
//!
//! Every operation is a single transaction bounded by the timeout in [`Config`].
//! Failures are returned to the caller as they are; there is no retry.

use chrono::Utc;
use embedded_io_async::{Read, Write};
use log::debug;

mod constants;
pub use constants::*;

mod error;
pub use error::*;

mod config;
pub use config::*;

mod data;
pub use data::*;

pub mod frame;
use frame::{Command, ResponseFrame};

mod transport;
pub use transport::Transport;

#[cfg(feature = "native-serial")]
pub mod serial;

#[cfg(test)]
mod mock;

pub use embedded_io_async;

// Offset of the value byte echoed in command replies.
const VALUE_INDEX: usize = 4;

/// Represents an SDS011 air quality sensor.
///
/// The sensor owns its serial channel; operations take `&mut self`, so a
/// single instance can never run two transactions at once.
///
/// # Type Parameters
///
/// * `Serial`: The type of the serial interface used to communicate with the sensor.
///   It must implement `embedded_io_async::Read` and `embedded_io_async::Write`.
pub struct Sds011<Serial> {
    transport: Transport<Serial>,
    config: Config,
}

impl<S> Sds011<S>
where
    S: Read + Write,
{
    /// Creates a new `Sds011` sensor instance.
    ///
    /// # Arguments
    ///
    /// * `serial`: The serial interface for communication with the sensor.
    /// * `config`: The initial configuration for the sensor.
    pub fn new(serial: S, config: Config) -> Self {
        Self {
            transport: Transport::new(serial, config.timeout, config.framing),
            config,
        }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gives the serial channel back, closing the sensor.
    pub fn release(self) -> S {
        self.transport.into_inner()
    }

    /// Brings the sensor into the reporting mode of the configuration.
    ///
    /// This involves:
    /// - Setting the reporting mode (Active or Query).
    /// - If Query mode, putting the sensor to sleep until data is needed.
    /// - If Active mode, setting the working period to continuous.
    pub async fn init(&mut self) -> Result<(), Error<S::Error>> {
        self.set_reporting_mode(self.config.mode).await?;

        match self.config.mode {
            ReportingMode::Query => self.set_work_mode(WorkMode::Sleep).await?,
            ReportingMode::Active => self.set_work_period(0).await?,
        }

        debug!("SDS011 init sequence complete.");
        Ok(())
    }

    /// Retrieves the firmware build date of the sensor.
    ///
    /// The reply carries year, month and day in bytes 3 to 5; the year counts
    /// from 2000.
    pub async fn get_firmware(&mut self) -> Result<Firmware, Error<S::Error>> {
        let reply = self.execute(Command::GetFirmware).await?;

        let firmware = Firmware {
            year: reply.byte(3),
            month: reply.byte(4),
            day: reply.byte(5),
        };
        debug!("Firmware version: {}", firmware);
        Ok(firmware)
    }

    /// Queries the sensor's current work mode.
    ///
    /// # Errors
    ///
    /// * [`Error::UnexpectedReply`] if the sensor reports an unknown mode byte.
    pub async fn get_work_mode(&mut self) -> Result<WorkMode, Error<S::Error>> {
        let value = self.execute(Command::GetWorkMode).await?.byte(VALUE_INDEX);
        let mode = WorkMode::from_repr(value).ok_or(Error::UnexpectedReply(value))?;
        debug!("Queried work mode: {:?}", mode);
        Ok(mode)
    }

    /// Puts the sensor to sleep or wakes it up.
    ///
    /// # Errors
    ///
    /// * [`Error::ConfirmationMismatch`] if the sensor echoes a different mode.
    pub async fn set_work_mode(&mut self, mode: WorkMode) -> Result<(), Error<S::Error>> {
        debug!("Setting work mode to: {:?}", mode);
        let reply = self.execute(Command::SetWorkMode(mode)).await?;
        confirm("work mode", mode as u8, &reply)
    }

    /// Queries the sensor's current reporting mode.
    ///
    /// # Errors
    ///
    /// * [`Error::UnexpectedReply`] if the sensor reports an unknown mode byte.
    pub async fn get_reporting_mode(&mut self) -> Result<ReportingMode, Error<S::Error>> {
        let value = self
            .execute(Command::GetReportingMode)
            .await?
            .byte(VALUE_INDEX);
        let mode = ReportingMode::from_repr(value).ok_or(Error::UnexpectedReply(value))?;
        debug!("Queried reporting mode: {:?}", mode);
        Ok(mode)
    }

    /// Sets the sensor's reporting mode (Active or Query).
    ///
    /// On success the configured mode is updated, which steers
    /// [`Sds011::read_data`].
    ///
    /// # Errors
    ///
    /// * [`Error::ConfirmationMismatch`] if the sensor echoes a different mode.
    pub async fn set_reporting_mode(
        &mut self,
        mode: ReportingMode,
    ) -> Result<(), Error<S::Error>> {
        debug!("Setting reporting mode to: {:?}", mode);
        let reply = self.execute(Command::SetReportingMode(mode)).await?;
        confirm("reporting mode", mode as u8, &reply)?;
        self.config.mode = mode;
        Ok(())
    }

    /// Queries the sensor's working period in minutes, `0` meaning continuous.
    pub async fn get_work_period(&mut self) -> Result<u8, Error<S::Error>> {
        let period = self.execute(Command::GetWorkPeriod).await?.byte(VALUE_INDEX);
        debug!("Queried working period: {} minutes", period);
        Ok(period)
    }

    /// Sets the sensor's working period.
    ///
    /// - A value of `0` sets the sensor to continuous working mode.
    /// - Values from `1` to `30` make the sensor work for 30 seconds, then
    ///   sleep for the rest of each `minutes` long period.
    ///
    /// # Errors
    ///
    /// * [`Error::OutOfRange`] if `minutes` is outside `0..=30`; nothing is sent.
    /// * [`Error::ConfirmationMismatch`] if the sensor echoes a different period.
    pub async fn set_work_period(&mut self, minutes: i32) -> Result<(), Error<S::Error>> {
        let period = WorkPeriod::try_from(minutes).map_err(Error::OutOfRange)?;
        debug!("Setting working period to: {} minutes", period.minutes());
        let reply = self.execute(Command::SetWorkPeriod(period)).await?;
        confirm("working period", period.minutes(), &reply)
    }

    /// Asks the sensor for a measurement.
    ///
    /// Only meaningful in Query reporting mode, with the sensor awake.
    pub async fn query_data(&mut self) -> Result<DataPoint, Error<S::Error>> {
        debug!("Querying sensor data");
        let reply = self.execute(Command::QueryData).await?;
        data_point(&reply)
    }

    /// Waits for the next measurement the sensor pushes on its own.
    ///
    /// Used in Active reporting mode; no command is sent.
    pub async fn wait_for_data(&mut self) -> Result<DataPoint, Error<S::Error>> {
        debug!("Waiting for sensor data");
        let reply = self.transport.receive().await?;
        data_point(&reply)
    }

    /// Reads a measurement the way the configured reporting mode requires.
    pub async fn read_data(&mut self) -> Result<DataPoint, Error<S::Error>> {
        match self.config.mode {
            ReportingMode::Query => self.query_data().await,
            ReportingMode::Active => self.wait_for_data().await,
        }
    }

    async fn execute(&mut self, command: Command) -> Result<ResponseFrame, Error<S::Error>> {
        let frame = command.frame(self.config.id);
        self.transport.execute(&frame).await
    }
}

fn confirm<E>(setting: &'static str, expected: u8, reply: &ResponseFrame) -> Result<(), Error<E>> {
    let actual = reply.byte(VALUE_INDEX);
    if actual != expected {
        return Err(Error::ConfirmationMismatch {
            setting,
            expected,
            actual,
        });
    }
    Ok(())
}

fn data_point<E>(reply: &ResponseFrame) -> Result<DataPoint, Error<E>> {
    let (pm2_5, pm10) = decode_concentrations(&reply.data()[..4])?;
    debug!("Processed frame - PM2.5: {}, PM10: {}", pm2_5, pm10);
    Ok(DataPoint {
        timestamp: Utc::now(),
        pm2_5,
        pm10,
    })
}
