//! Command and response frames.
//!
//! Outbound: `AA B4 <class> <rw> <payload[11]> <id1> <id2> <checksum> AB` (19 bytes).
//! Inbound: `AA <reply> <data[6]> <checksum> AB` (10 bytes).
//!
//! The checksum is the low byte of the sum of everything between the two
//! leading marker bytes and the checksum itself.

use log::trace;

use crate::config::{DeviceId, Framing, ReportingMode, WorkMode, WorkPeriod};
use crate::constants::*;
use crate::error::FrameError;

/// Sums the bytes, wrapping at 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Whether a command reads or writes a setting.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Access {
    Read = 0x00,
    Write = 0x01,
}

/// The fixed command set understood by the sensor.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Command {
    GetReportingMode,
    SetReportingMode(ReportingMode),
    QueryData,
    GetWorkMode,
    SetWorkMode(WorkMode),
    GetFirmware,
    GetWorkPeriod,
    SetWorkPeriod(WorkPeriod),
}

impl Command {
    /// Command class byte.
    pub fn class(self) -> u8 {
        match self {
            Command::GetReportingMode | Command::SetReportingMode(_) => 0x02,
            Command::QueryData => 0x04,
            Command::GetWorkMode | Command::SetWorkMode(_) => 0x06,
            Command::GetFirmware => 0x07,
            Command::GetWorkPeriod | Command::SetWorkPeriod(_) => 0x08,
        }
    }

    /// Whether the command reads or writes the setting.
    pub fn access(self) -> Access {
        match self {
            Command::SetReportingMode(_) | Command::SetWorkMode(_) | Command::SetWorkPeriod(_) => {
                Access::Write
            }
            _ => Access::Read,
        }
    }

    /// The first payload byte; only set commands carry one.
    pub fn value(self) -> u8 {
        match self {
            Command::SetReportingMode(mode) => mode as u8,
            Command::SetWorkMode(mode) => mode as u8,
            Command::SetWorkPeriod(period) => period.minutes(),
            _ => 0x00,
        }
    }

    /// Builds the wire frame for this command, addressed to `id`.
    pub fn frame(self, id: DeviceId) -> CommandFrame {
        let mut body = [0u8; COMMAND_BODY_LEN];
        body[0] = HEAD;
        body[1] = COMMAND_ID;
        body[2] = self.class();
        body[3] = self.access() as u8;
        body[4] = self.value();
        body[4 + COMMAND_PAYLOAD_LEN] = id.id1;
        body[5 + COMMAND_PAYLOAD_LEN] = id.id2;
        CommandFrame::new(body)
    }
}

/// A complete 19-byte command frame, checksum and tail included.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct CommandFrame([u8; COMMAND_LEN]);

impl CommandFrame {
    /// Seals a frame body by appending its checksum and the tail byte.
    pub fn new(body: [u8; COMMAND_BODY_LEN]) -> Self {
        let mut frame = [0u8; COMMAND_LEN];
        frame[..COMMAND_BODY_LEN].copy_from_slice(&body);
        frame[COMMAND_BODY_LEN] = checksum(&body[2..]);
        frame[COMMAND_BODY_LEN + 1] = TAIL;
        Self(frame)
    }

    /// Builds a frame from a hex template such as
    /// `aab40700` followed by 22 zero digits and `ffff`.
    ///
    /// # Errors
    ///
    /// - [`FrameError::MalformedInput`] if the template is not valid hex or
    ///   does not decode to exactly 17 bytes.
    pub fn from_hex(template: &str) -> Result<Self, FrameError> {
        let bytes = hex::decode(template).map_err(|e| FrameError::MalformedInput(e.to_string()))?;
        let body: [u8; COMMAND_BODY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            FrameError::MalformedInput(format!(
                "want {} bytes, have {}",
                COMMAND_BODY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::new(body))
    }

    /// The complete frame as written to the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A validated 10-byte response frame.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct ResponseFrame([u8; RESPONSE_LEN]);

impl ResponseFrame {
    /// The reply type, `0xC5` for command replies or `0xC0` for data reports.
    pub fn reply_type(&self) -> u8 {
        self.0[1]
    }

    /// Byte at `index`, counted from the head byte.
    pub fn byte(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// The six bytes covered by the checksum.
    pub fn data(&self) -> &[u8] {
        &self.0[2..8]
    }

    /// The complete frame as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Validates a raw inbound frame.
///
/// # Errors
///
/// - [`FrameError::Length`] if `raw` is not exactly 10 bytes long.
/// - [`FrameError::Checksum`] if byte 8 does not match the data checksum.
/// - [`FrameError::InvalidHeader`] / [`FrameError::InvalidTail`] under
///   [`Framing::Strict`] when the markers are wrong.
pub fn validate(raw: &[u8], framing: Framing) -> Result<ResponseFrame, FrameError> {
    let frame: [u8; RESPONSE_LEN] = raw.try_into().map_err(|_| FrameError::Length {
        expected: RESPONSE_LEN,
        actual: raw.len(),
    })?;

    let computed = checksum(&frame[2..8]);
    if computed != frame[8] {
        trace!("Bad checksum in frame {:02X?}", frame);
        return Err(FrameError::Checksum {
            expected: computed,
            actual: frame[8],
        });
    }

    if framing == Framing::Strict {
        if frame[0] != HEAD {
            return Err(FrameError::InvalidHeader(frame[0]));
        }
        if frame[9] != TAIL {
            return Err(FrameError::InvalidTail(frame[9]));
        }
    }

    Ok(ResponseFrame(frame))
}

#[cfg(test)]
pub(crate) fn response(reply_type: u8, data: [u8; 6]) -> Vec<u8> {
    let mut raw = vec![HEAD, reply_type];
    raw.extend_from_slice(&data);
    raw.push(checksum(&data));
    raw.push(TAIL);
    raw
}
