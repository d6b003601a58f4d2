// src/error.rs

use std::io;
use thiserror::Error;

use crate::packet::PacketType;

/// The primary error type for the `sk6-rs` library.
#[derive(Error, Debug)]
pub enum ShakeError {
    #[error("Short read while framing: expected {expected} bytes, got {actual}")]
    FramingShortRead { expected: usize, actual: usize },

    #[error("No recognizable packet header within {scanned} bytes")]
    UnrecognizedHeader { scanned: usize },

    #[error("Acknowledgment received with no command outstanding")]
    UnexpectedAcknowledgment,

    #[error("Cannot decode {kind} packet: {reason}")]
    Decode { kind: PacketType, reason: String },

    #[error("Invalid field at offset {offset}: {message}")]
    InvalidField { offset: usize, message: String },

    #[error("Device info block malformed: {0}")]
    DeviceInfo(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Timeout waiting for acknowledgment: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("A command is already awaiting acknowledgment")]
    CommandPending,

    #[error("Command cancelled before an acknowledgment arrived")]
    Cancelled,

    #[error("Transport returned no data for {idle_reads} consecutive reads")]
    TransportClosed { idle_reads: u32 },

    #[error("Device rejected command for register {address:#06x}")]
    Rejected { address: u16 },

    #[error("Cannot encode {kind} packet: {reason}")]
    NotEncodable { kind: PacketType, reason: String },
}

impl ShakeError {
    /// Whether the reader loop can carry on after this error.
    ///
    /// Everything caused by a single malformed or unexpected packet is
    /// recoverable; transport failures are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ShakeError::FramingShortRead { .. }
            | ShakeError::UnrecognizedHeader { .. }
            | ShakeError::UnexpectedAcknowledgment
            | ShakeError::Decode { .. }
            | ShakeError::InvalidField { .. }
            | ShakeError::DeviceInfo(_) => true,
            ShakeError::Io(e) => matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted),
            ShakeError::Timeout(_)
            | ShakeError::CommandPending
            | ShakeError::Cancelled
            | ShakeError::TransportClosed { .. }
            | ShakeError::Rejected { .. }
            | ShakeError::NotEncodable { .. } => false,
        }
    }

    pub(crate) fn decode(kind: PacketType, reason: impl Into<String>) -> Self {
        ShakeError::Decode {
            kind,
            reason: reason.into(),
        }
    }
}
