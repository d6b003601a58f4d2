//! Reading the remainder of ASCII packets.
//!
//! Besides plain data packets this handles the `$TIM` playback envelope,
//! the adaptive checksum trailer, and the control packets that carry no
//! sensor data (`$PLC`, `$RFI`, the start-up banner).

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::constants::{
    ASCII_HEADER_LEN, CHECKSUM_LEN, LINE_TERMINATOR, MAX_PACKET_LEN, PLAYBACK_SEQ_FIELD_LEN, PLAYBACK_SEQ_FILLER,
    RFID_TAG_LEN, TIMESTAMP_DIGITS,
};
use crate::device_info::{self, DeviceInfo};
use crate::error::ShakeError;
use crate::fields;
use crate::packet::{PacketType, WireFormat, classify_header};
use crate::sync::Header;
use crate::transport::{ByteSource, Link};

/// Timestamp carried by a `$TIM` envelope, in hundredths of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackEnvelope {
    pub timestamp: u64,
}

impl PlaybackEnvelope {
    pub fn seconds(&self) -> f64 {
        self.timestamp as f64 / 100.0
    }
}

/// A complete ASCII data packet, normalized to its live layout.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiFrame {
    pub kind: PacketType,
    pub bytes: BytesMut,
    pub playback: Option<PlaybackEnvelope>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AsciiPacket {
    /// Data, event or acknowledgment packet for the extractor.
    Frame(AsciiFrame),
    PlaybackComplete,
    RfidTag(String),
    StartupInfo(DeviceInfo),
}

/// Read the rest of the ASCII packet whose header has just been classified.
pub fn read_packet<S: ByteSource>(link: &mut Link<S>, header: Header) -> Result<AsciiPacket, ShakeError> {
    let Header { kind, mut bytes } = header;
    match kind {
        PacketType::Timestamp => {
            read_exact(link, &mut bytes, kind.wire_len() - ASCII_HEADER_LEN)?;
            let envelope = PlaybackEnvelope {
                timestamp: fields::decimal_u64(&bytes, ASCII_HEADER_LEN + 1, TIMESTAMP_DIGITS)?,
            };
            let inner = read_inner_header(link)?;
            trace!(timestamp = envelope.timestamp, kind = %inner.kind, "playback envelope");
            read_data(link, inner, Some(envelope)).map(AsciiPacket::Frame)
        }
        PacketType::PlaybackComplete => {
            read_exact(link, &mut bytes, kind.wire_len() - ASCII_HEADER_LEN)?;
            Ok(AsciiPacket::PlaybackComplete)
        }
        PacketType::RfidTag => {
            read_exact(link, &mut bytes, kind.wire_len() - ASCII_HEADER_LEN)?;
            let tag = fields::text(&bytes, ASCII_HEADER_LEN + 1, RFID_TAG_LEN)?;
            Ok(AsciiPacket::RfidTag(tag))
        }
        PacketType::StartupInfo => device_info::read_info(link).map(AsciiPacket::StartupInfo),
        _ => read_data(link, Header { kind, bytes }, None).map(AsciiPacket::Frame),
    }
}

fn read_exact<S: ByteSource>(link: &mut Link<S>, bytes: &mut BytesMut, n: usize) -> Result<(), ShakeError> {
    let got = link.read_into(bytes, n)?;
    if got != n {
        debug!(expected = n, actual = got, partial = hex::encode(&bytes[..]), "short ASCII packet");
        return Err(ShakeError::FramingShortRead {
            expected: n,
            actual: got,
        });
    }
    Ok(())
}

fn read_inner_header<S: ByteSource>(link: &mut Link<S>) -> Result<Header, ShakeError> {
    let mut bytes = BytesMut::with_capacity(MAX_PACKET_LEN);
    read_exact(link, &mut bytes, ASCII_HEADER_LEN)?;
    match classify_header(&bytes, WireFormat::Ascii) {
        Some(kind) if kind.is_playback_payload() => Ok(Header { kind, bytes }),
        Some(kind) => Err(ShakeError::decode(
            PacketType::Timestamp,
            format!("envelope cannot carry a {kind} packet"),
        )),
        None => Err(ShakeError::decode(
            PacketType::Timestamp,
            format!("unrecognized inner header {}", hex::encode(&bytes[..])),
        )),
    }
}

fn read_data<S: ByteSource>(
    link: &mut Link<S>,
    header: Header,
    playback: Option<PlaybackEnvelope>,
) -> Result<AsciiFrame, ShakeError> {
    let Header { kind, mut bytes } = header;

    let mut remaining = kind.wire_len() - ASCII_HEADER_LEN;
    if playback.is_some() {
        // historical packets omit the ",ss" sequence field
        remaining -= PLAYBACK_SEQ_FIELD_LEN;
    }
    read_exact(link, &mut bytes, remaining)?;

    if playback.is_some() {
        bytes.truncate(bytes.len() - 2);
        bytes.extend_from_slice(PLAYBACK_SEQ_FILLER);
    }
    // a normalized playback frame is always terminated, so it can only turn
    // checksum mode off
    if kind.has_checksum() {
        detect_checksum(link, &mut bytes)?;
    }

    trace!(%kind, bytes = hex::encode(&bytes[..]), "ASCII frame");
    Ok(AsciiFrame { kind, bytes, playback })
}

/// Track whether the device is appending `*HH` trailers.
///
/// The mode flips only on a transition: a packet that still lacks its
/// terminator turns it on, a terminated packet turns it off.
fn detect_checksum<S: ByteSource>(link: &mut Link<S>, bytes: &mut BytesMut) -> Result<(), ShakeError> {
    let terminated = bytes.last() == Some(&LINE_TERMINATOR);
    if !terminated {
        if !link.state.checksum {
            debug!("checksum trailer detected, checksum mode on");
            link.state.checksum = true;
        }
        read_exact(link, bytes, CHECKSUM_LEN)?;
    } else if link.state.checksum {
        debug!("packet without checksum trailer, checksum mode off");
        link.state.checksum = false;
    }
    Ok(())
}
