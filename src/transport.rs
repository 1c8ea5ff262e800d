use core::time::Duration;

use embedded_io_async::{Read, Write};
use log::{debug, trace};

use crate::config::Framing;
use crate::constants::TAIL;
use crate::error::Error;
use crate::frame::{self, CommandFrame, ResponseFrame};

// Size of a single read from the channel.
const READ_CHUNK: usize = 32;

// Upper bound on reads issued while draining stale input.
const MAX_DRAIN_READS: usize = 64;

/// Runs write-then-read transactions over a serial channel.
///
/// Inbound bytes are collected in an internal buffer and cut at each tail
/// byte. Whatever follows a tail stays buffered for the next read, so frames
/// the sensor pushes back to back in active reporting mode are not lost.
///
/// A read is bounded by the configured timeout. When it expires, or when the
/// caller drops a read before it finishes, with part of a frame received, the
/// next read skips everything up to and including the following tail byte.
/// The rest of the interrupted frame is dropped that way instead of being
/// taken for the start of a new one.
pub struct Transport<S> {
    serial: S,
    rx: Vec<u8>,
    reading: bool,
    resync: bool,
    timeout: Duration,
    framing: Framing,
}

impl<S> Transport<S>
where
    S: Read + Write,
{
    /// Wraps `serial`, bounding every read by `timeout` and validating
    /// inbound frames according to `framing`.
    pub fn new(serial: S, timeout: Duration, framing: Framing) -> Self {
        Self {
            serial,
            rx: Vec::with_capacity(READ_CHUNK),
            reading: false,
            resync: false,
            timeout,
            framing,
        }
    }

    /// Sends a command frame and returns the validated response frame.
    ///
    /// Input left over from earlier reads is dropped first so the reply
    /// cannot be confused with stale bytes. There is no retry.
    pub async fn execute(
        &mut self,
        command: &CommandFrame,
    ) -> Result<ResponseFrame, Error<S::Error>> {
        self.discard_pending().await?;
        self.write_frame(command).await?;
        self.receive().await
    }

    /// Waits for the next complete frame without sending anything.
    pub async fn receive(&mut self) -> Result<ResponseFrame, Error<S::Error>> {
        if self.reading {
            debug!(
                "Previous read was abandoned, dropping {} buffered bytes",
                self.rx.len()
            );
            self.drop_partial();
        }

        let timeout = self.timeout;
        self.reading = true;
        let raw = match tokio::time::timeout(timeout, self.read_until_tail()).await {
            Ok(raw) => raw,
            Err(_) => {
                debug!(
                    "No frame within {:?}, dropping {} buffered bytes",
                    timeout,
                    self.rx.len()
                );
                self.drop_partial();
                self.reading = false;
                return Err(Error::Timeout(timeout));
            }
        };
        self.reading = false;

        let frame = frame::validate(&raw?, self.framing)?;
        trace!("Received frame: {:02X?}", frame.as_bytes());
        Ok(frame)
    }

    /// Gives the serial channel back. Buffered input is lost.
    pub fn into_inner(self) -> S {
        self.serial
    }

    // Forgets an interrupted frame. Its remaining bytes may still be in
    // flight, so the next read skips past the next tail byte first.
    fn drop_partial(&mut self) {
        if !self.rx.is_empty() {
            self.rx.clear();
            self.resync = true;
        }
    }

    async fn write_frame(&mut self, command: &CommandFrame) -> Result<(), Error<S::Error>> {
        let bytes = command.as_bytes();
        trace!("Writing command: {:02X?}", bytes);

        let written = self.serial.write(bytes).await.map_err(Error::Io)?;
        if written != bytes.len() {
            return Err(Error::ShortWrite {
                expected: bytes.len(),
                written,
            });
        }
        self.serial.flush().await.map_err(Error::Io)
    }

    // Reads until a tail byte has been buffered and returns everything up to
    // and including it. Has no deadline of its own.
    async fn read_until_tail(&mut self) -> Result<Vec<u8>, Error<S::Error>> {
        loop {
            if let Some(end) = self.rx.iter().position(|&b| b == TAIL) {
                if self.resync {
                    self.resync = false;
                    debug!("Skipped {} bytes of an interrupted frame", end + 1);
                    self.rx.drain(..=end);
                    continue;
                }
                return Ok(self.rx.drain(..=end).collect());
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.serial.read(&mut chunk).await.map_err(Error::Io)?;
            if n == 0 {
                return Err(Error::UnexpectedEof);
            }
            trace!("Read from port: {:02X?}", &chunk[..n]);
            self.rx.extend_from_slice(&chunk[..n]);
        }
    }

    // Clears the buffer and reads off whatever the channel has ready right
    // now, without waiting for more. Best effort: a port that has not yet
    // signalled readiness for bytes that just arrived keeps them, and they
    // are then read as the start of the reply.
    async fn discard_pending(&mut self) -> Result<(), Error<S::Error>> {
        let mut dropped = core::mem::take(&mut self.rx).len();
        self.reading = false;
        self.resync = false;

        let mut chunk = [0u8; READ_CHUNK];
        for _ in 0..MAX_DRAIN_READS {
            match tokio::time::timeout(Duration::ZERO, self.serial.read(&mut chunk)).await {
                Ok(Ok(n)) if n > 0 => dropped += n,
                Ok(Ok(_)) | Err(_) => break,
                Ok(Err(e)) => return Err(Error::Io(e)),
            }
        }

        if dropped > 0 {
            debug!("Discarded {} stale bytes before command", dropped);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceId;
    use crate::constants::{DATA_REPORT_ID, REPLY_ID};
    use crate::error::FrameError;
    use crate::frame::{response, Command};
    use crate::mock::{init_logger, MockPort};
    use tokio::time::Instant;

    fn transport(port: MockPort) -> Transport<MockPort> {
        Transport::new(port, Duration::from_secs(5), Framing::Permissive)
    }

    #[tokio::test]
    async fn execute_writes_frame_and_returns_reply() {
        init_logger();

        let reply = response(REPLY_ID, [0x07, 0x12, 0x03, 0x16, 0xff, 0xff]);
        let mut port = MockPort::default();
        port.reply(&reply);
        let mut transport = transport(port);

        let command = Command::GetFirmware.frame(DeviceId::default());
        let frame = transport.execute(&command).await.unwrap();

        assert_eq!(frame.as_bytes(), reply.as_slice());
        assert_eq!(transport.into_inner().written(), command.as_bytes());
    }

    #[tokio::test]
    async fn short_write_is_reported() {
        init_logger();

        let mut port = MockPort::default();
        port.short_writes();
        let mut transport = transport(port);

        let err = transport
            .execute(&Command::GetWorkMode.frame(DeviceId::default()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ShortWrite {
                expected: 19,
                written: 18
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_tail_times_out() {
        init_logger();

        let mut port = MockPort::default();
        port.reply(&[0xAA, 0xC5, 0x07, 0x12]);
        let mut transport = transport(port);

        let start = Instant::now();
        let err = transport
            .execute(&Command::GetFirmware.frame(DeviceId::default()))
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, Error::Timeout(_)));
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_frame_does_not_leak_past_timeout() {
        init_logger();

        let mut port = MockPort::default();
        port.reply(&[0xAA, 0xC5, 0x06, 0x00]);
        port.reply(&response(REPLY_ID, [0x06, 0x00, 0x01, 0x00, 0xff, 0xff]));
        let mut transport = transport(port);

        let command = Command::GetWorkMode.frame(DeviceId::default());
        assert!(matches!(
            transport.execute(&command).await,
            Err(Error::Timeout(_))
        ));

        let frame = transport.execute(&command).await.unwrap();
        assert_eq!(frame.byte(4), 0x01);
    }

    #[tokio::test]
    async fn stale_input_is_discarded_before_command() {
        init_logger();

        let mut port = MockPort::default();
        port.push(&response(DATA_REPORT_ID, [0x0A, 0x00, 0x14, 0x00, 0xff, 0xff]));
        port.reply(&response(REPLY_ID, [0x08, 0x00, 0x05, 0x00, 0xff, 0xff]));
        let mut transport = transport(port);

        let frame = transport
            .execute(&Command::GetWorkPeriod.frame(DeviceId::default()))
            .await
            .unwrap();

        assert_eq!(frame.reply_type(), REPLY_ID);
        assert_eq!(frame.byte(4), 0x05);
    }

    #[tokio::test]
    async fn receive_keeps_bytes_after_tail() {
        init_logger();

        let first = response(DATA_REPORT_ID, [0x0A, 0x00, 0x14, 0x00, 0xff, 0xff]);
        let second = response(DATA_REPORT_ID, [0x0B, 0x00, 0x15, 0x00, 0xff, 0xff]);
        let mut port = MockPort::default();
        port.push(&[first.clone(), second.clone()].concat());
        let mut transport = transport(port);

        assert_eq!(transport.receive().await.unwrap().as_bytes(), first.as_slice());
        assert_eq!(transport.receive().await.unwrap().as_bytes(), second.as_slice());
    }

    #[tokio::test]
    async fn early_tail_byte_yields_length_error() {
        init_logger();

        let mut port = MockPort::default();
        port.push(&[0xAA, 0xC0, 0xAB]);
        let mut transport = transport(port);

        assert!(matches!(
            transport.receive().await,
            Err(Error::Frame(FrameError::Length {
                expected: 10,
                actual: 3
            }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_read_skips_rest_of_frame() {
        init_logger();

        let interrupted = response(DATA_REPORT_ID, [0x0A, 0x00, 0x14, 0x00, 0xff, 0xff]);
        let next = response(DATA_REPORT_ID, [0x0B, 0x00, 0x15, 0x00, 0xff, 0xff]);
        let mut port = MockPort::default();
        port.push(&interrupted[..3]);
        let mut transport = transport(port);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), transport.receive()).await;
        assert!(abandoned.is_err());

        transport.serial.push(&interrupted[3..]);
        transport.serial.push(&next);
        assert_eq!(transport.receive().await.unwrap().as_bytes(), next.as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_read_skips_rest_of_frame() {
        init_logger();

        let interrupted = response(DATA_REPORT_ID, [0x0A, 0x00, 0x14, 0x00, 0xff, 0xff]);
        let next = response(DATA_REPORT_ID, [0x0B, 0x00, 0x15, 0x00, 0xff, 0xff]);
        let mut port = MockPort::default();
        port.push(&interrupted[..3]);
        let mut transport = transport(port);

        assert!(matches!(transport.receive().await, Err(Error::Timeout(_))));

        transport.serial.push(&interrupted[3..]);
        transport.serial.push(&next);
        assert_eq!(transport.receive().await.unwrap().as_bytes(), next.as_slice());
    }

    #[tokio::test]
    async fn end_of_stream_is_an_error() {
        init_logger();

        let mut port = MockPort::default();
        port.push(&[0xAA, 0xC0]);
        port.close();
        let mut transport = transport(port);

        assert!(matches!(
            transport.receive().await,
            Err(Error::UnexpectedEof)
        ));
    }
}
