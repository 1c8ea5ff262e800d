use core::time::Duration;

use thiserror::Error;

/// Errors raised while encoding or validating frames.
///
/// These come from pure codec functions and carry no channel state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A frame or a value payload has the wrong size.
    #[error("unexpected length, want {expected}, have {actual}")]
    Length { expected: usize, actual: usize },
    /// The checksum byte does not match the sum of the data bytes.
    #[error("checksum mismatch, computed {expected:#04x}, received {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },
    /// A raw command template could not be turned into a frame body.
    #[error("malformed command template: {0}")]
    MalformedInput(String),
    /// Strict framing only: the first byte is not the frame head.
    #[error("invalid frame head {0:#04x}")]
    InvalidHeader(u8),
    /// Strict framing only: the last byte is not the frame tail.
    #[error("invalid frame tail {0:#04x}")]
    InvalidTail(u8),
}

/// Error type for sensor operations.
///
/// The generic parameter `E` is the error type of the serial channel.
#[derive(Error, Debug)]
pub enum Error<E> {
    /// The serial channel failed.
    #[error("serial I/O error: {0:?}")]
    Io(E),
    /// The serial channel reached end-of-stream before a frame tail.
    #[error("unexpected end of stream")]
    UnexpectedEof,
    /// The serial channel accepted fewer bytes than the command frame holds.
    #[error("short write, want {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },
    /// No complete frame arrived in time (device in sleep mode?).
    #[error("timed out after {0:?} waiting for a response frame")]
    Timeout(Duration),
    /// The received frame failed validation.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The device echoed a different value than the one that was set.
    #[error("unexpected {setting} confirmation, want {expected:#04x}, have {actual:#04x}")]
    ConfirmationMismatch {
        setting: &'static str,
        expected: u8,
        actual: u8,
    },
    /// The requested working period is outside `0..=30` minutes.
    #[error("working period {0} out of range, must be between 0 and 30 minutes")]
    OutOfRange(i32),
    /// The device answered with a value this driver does not know.
    #[error("unexpected reply value {0:#04x}")]
    UnexpectedReply(u8),
}
