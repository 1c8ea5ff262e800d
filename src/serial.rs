//! Native serial ports, backed by `tokio-serial`.

use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::constants::BAUD_RATE;
use crate::{Config, Sds011};

/// Error type of [`SerialPort`].
#[derive(Error, Debug)]
pub enum PortError {
    /// The port could not be opened or configured.
    #[error("cannot open serial port: {0}")]
    Open(#[from] tokio_serial::Error),
    /// Reading from or writing to the port failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl embedded_io_async::Error for PortError {
    fn kind(&self) -> ErrorKind {
        match self {
            PortError::Open(_) => ErrorKind::NotConnected,
            PortError::Io(err) => match err.kind() {
                std::io::ErrorKind::TimedOut => ErrorKind::TimedOut,
                std::io::ErrorKind::Interrupted => ErrorKind::Interrupted,
                std::io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
                _ => ErrorKind::Other,
            },
        }
    }
}

/// A serial port configured for the sensor (9600 baud, 8N1, no flow control).
#[derive(Debug)]
pub struct SerialPort(SerialStream);

/// Opens the serial port at `path`.
///
/// Must be called from within a Tokio runtime.
pub fn open(path: &str) -> Result<SerialPort, PortError> {
    let stream = tokio_serial::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .open_native_async()?;

    log::debug!("Opened serial port {}", path);
    Ok(SerialPort(stream))
}

impl ErrorType for SerialPort {
    type Error = PortError;
}

impl Read for SerialPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.0.read(buf).await?)
    }
}

impl Write for SerialPort {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(self.0.write(buf).await?)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(self.0.flush().await?)
    }
}

impl Sds011<SerialPort> {
    /// Opens the serial port at `path` and wraps it in a sensor.
    pub fn open(path: &str, config: Config) -> Result<Self, PortError> {
        Ok(Sds011::new(open(path)?, config))
    }
}
