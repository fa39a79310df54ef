//! Error taxonomy shared by every layer of the crate
//!
//! Errors fall into five families: I/O on the serial handle, framing violations, acknowledgement
//! mismatches, device side rejections and usage errors detected before any byte is written. Only
//! the first three leave the link in an unknown position, see [`Error::desynchronizes_link`].
use thiserror::Error;

use crate::mcu::command::{AckId, RequestId, ResetKind, TxStatus};

pub type Result<T> = core::result::Result<T, Error>;

/// Well-formed acknowledgement whose status field tells the request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ConfigRx { radio: u8, code: u8 },
    PrepareTx { code: u8 },
    Reset { kind: ResetKind, code: u8 },
    SetCoefTempRssi { radio: u8, code: u8 },
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Rejection::ConfigRx { radio, code } => {
                write!(f, "CONFIG_RX of radio #{} rejected with 0x{:02X}", radio, code)
            }
            Rejection::PrepareTx { code } => write!(f, "PREPARE_TX rejected with 0x{:02X}", code),
            Rejection::Reset { kind, code } => {
                write!(f, "RESET ({:?}) rejected with 0x{:02X}", kind, code)
            }
            Rejection::SetCoefTempRssi { radio, code } => write!(
                f,
                "SET_COEF_TEMP_RSSI of radio #{} rejected with 0x{:02X}",
                radio, code
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Serial link closed while reading a frame")]
    Disconnected,

    #[error("Read was interrupted, frame position is lost")]
    Interrupted,

    #[error("Acknowledgement of {declared} bytes does not fit the {capacity} bytes buffer")]
    AckTooLarge { declared: usize, capacity: usize },

    #[error("Request payload of {len} bytes exceeds the {capacity} bytes buffer")]
    RequestTooLarge { len: usize, capacity: usize },

    #[error("Acknowledgement {ack:?} carries {len} payload bytes, layout needs {needed}")]
    MalformedAck { ack: AckId, len: usize, needed: usize },

    #[error("Wrong acknowledgement type (expected: 0x{code:02X}, got: 0x{actual:02X})", code = .expected.code())]
    UnexpectedAck { expected: AckId, actual: u8 },

    #[error("Acknowledgement id 0x{actual:02X} does not match request id 0x{expected:02X}")]
    CorrelationMismatch { expected: u8, actual: u8 },

    #[error("Request {request:?} carries {len} payload bytes, layout needs {needed}")]
    MalformedRequest {
        request: RequestId,
        len: usize,
        needed: usize,
    },

    #[error("Unknown {what} code 0x{code:02X}")]
    UnknownCode { what: &'static str, code: u8 },

    #[error("{0}")]
    Rejected(Rejection),

    #[error("Transmission ended with status {0:?}")]
    TxFailed(TxStatus),

    #[error("Transmission did not reach a terminal status within {0:?}")]
    TxPollTimeout(std::time::Duration),

    #[error("MCU version mismatch (expected: {expected}, got: {actual})")]
    FirmwareMismatch { expected: String, actual: String },

    #[error("Concentrator is already running")]
    AlreadyStarted,

    #[error("Concentrator is not running")]
    NotStarted,

    #[error("Board is not configured, no TTY path set")]
    BoardNotConfigured,

    #[error("No RX radio known, ping the concentrator first")]
    NoRxRadio,

    #[error("Invalid channel {index} ({available} radios available)")]
    InvalidChannel { index: u8, available: u8 },

    #[error("Channel 1 cannot be disabled (radio #1 needs to be configured)")]
    Radio1Disabled,

    #[error("Payload of {0} bytes is too long")]
    PayloadTooLong(usize),

    #[error("Invalid coding rate 0x{0:02X}")]
    InvalidCodingRate(u8),

    #[error("Invalid bandwidth {0}")]
    InvalidBandwidth(u16),

    #[error("Invalid spreading factor {0}")]
    InvalidSpreadingFactor(u8),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// The read cursor no longer sits on a frame boundary and the session has to be reopened
    pub fn desynchronizes_link(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Serial(_)
                | Error::Disconnected
                | Error::Interrupted
                | Error::AckTooLarge { .. }
                | Error::MalformedAck { .. }
                | Error::UnexpectedAck { .. }
                | Error::CorrelationMismatch { .. }
        )
    }
}
