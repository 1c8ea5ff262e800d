use core::time::Duration;

// HEAD is the byte that marks the beginning of any frame (command or data).
pub const HEAD: u8 = 0xAA;

// TAIL is the byte that marks the end of any frame (command or data). Inbound
// frames are delimited on it.
pub const TAIL: u8 = 0xAB;

// COMMAND_ID is the byte that identifies a command frame sent to the sensor.
pub const COMMAND_ID: u8 = 0xB4;

// DATA_REPORT_ID is the byte that identifies a data report frame received from the sensor.
// This is used in active reporting mode or as a reply to a data query.
pub const DATA_REPORT_ID: u8 = 0xC0;

// REPLY_ID is the byte that identifies a reply frame received from the sensor
// in response to a command.
pub const REPLY_ID: u8 = 0xC5;

/// Length of a command frame on the wire.
pub const COMMAND_LEN: usize = 19;

/// Length of a command frame without its checksum and tail.
pub const COMMAND_BODY_LEN: usize = COMMAND_LEN - 2;

/// Number of payload bytes following the read/write selector.
pub const COMMAND_PAYLOAD_LEN: usize = 11;

/// Length of a response frame on the wire.
pub const RESPONSE_LEN: usize = 10;

/// Serial line settings expected by the sensor (8N1).
pub const BAUD_RATE: u32 = 9600;

/// How long a transaction waits for a complete response frame.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest accepted working period, in minutes.
pub const WORK_PERIOD_MAX: u8 = 30;
