//! Scripted serial port for tests.

use core::convert::Infallible;
use std::collections::VecDeque;

use embedded_io_async::{ErrorType, Read, Write};
use log::LevelFilter;

use crate::constants::COMMAND_LEN;

pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::max())
        .is_test(true)
        .try_init();
}

/// Behaves like a half-duplex sensor: each time a full command frame has been
/// written, the next scripted reply becomes readable. Reads with nothing
/// available never complete, unless the port has been closed.
#[derive(Debug, Default)]
pub struct MockPort {
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    written: Vec<u8>,
    pending_write: usize,
    short_writes: bool,
    closed: bool,
}

impl MockPort {
    /// Queues a reply released after the next command.
    pub fn reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }

    /// Makes bytes readable right away, as if pushed by the sensor.
    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Every write accepts one byte less than offered.
    pub fn short_writes(&mut self) {
        self.short_writes = true;
    }

    /// Reads return end-of-stream once the buffer is empty.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Number of complete command frames written so far.
    pub fn commands(&self) -> usize {
        self.written.len() / COMMAND_LEN
    }
}

impl ErrorType for MockPort {
    type Error = Infallible;
}

impl Read for MockPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.rx.is_empty() {
            if self.closed || buf.is_empty() {
                return Ok(0);
            }
            return core::future::pending().await;
        }

        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let n = if self.short_writes {
            buf.len().saturating_sub(1)
        } else {
            buf.len()
        };
        self.written.extend_from_slice(&buf[..n]);

        self.pending_write += n;
        while self.pending_write >= COMMAND_LEN {
            self.pending_write -= COMMAND_LEN;
            if let Some(reply) = self.replies.pop_front() {
                self.rx.extend(reply);
            }
        }
        Ok(n)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
