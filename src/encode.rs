//! Host→device commands and device→host packet builders.
//!
//! The builders produce byte-exact SK6 packets. They are used by the offline
//! decoder's self-test, by simulators, and by the test suite. Every builder
//! checks the result against the packet table so a value that overflows its
//! field is an error rather than a malformed packet.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

use crate::constants::{RAW_MARKER, TIMESTAMP_DIGITS};
use crate::error::ShakeError;
use crate::packet::PacketType;

/// Register access command, answered by `$ACK` or `$NAK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read { address: u16 },
    Write { address: u16, value: u8 },
}

impl Command {
    pub fn address(&self) -> u16 {
        match *self {
            Command::Read { address } | Command::Write { address, .. } => address,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Command::Read { address } => format!("$REA,{address:04X},00\r\n").into_bytes(),
            Command::Write { address, value } => format!("$WRI,{address:04X},{value:02X}\r\n").into_bytes(),
        }
    }
}

fn ascii_code(kind: PacketType) -> Result<&'static str, ShakeError> {
    kind.ascii_code()
        .and_then(|code| std::str::from_utf8(code).ok())
        .ok_or(ShakeError::NotEncodable {
            kind,
            reason: "not an ASCII packet".into(),
        })
}

fn raw_selector(kind: PacketType) -> Result<u8, ShakeError> {
    kind.raw_selector().ok_or(ShakeError::NotEncodable {
        kind,
        reason: "not a raw packet".into(),
    })
}

fn check_len(kind: PacketType, packet: Vec<u8>, expected: usize) -> Result<Vec<u8>, ShakeError> {
    if packet.len() != expected {
        return Err(ShakeError::NotEncodable {
            kind,
            reason: format!("built {} bytes, layout needs {expected}", packet.len()),
        });
    }
    Ok(packet)
}

/// `$XXX,±dddd,±dddd,±dddd,ss\r\n`
pub fn ascii_triple(kind: PacketType, values: [i16; 3], seq: u8) -> Result<Vec<u8>, ShakeError> {
    let mut packet = Vec::with_capacity(kind.wire_len());
    write!(
        packet,
        "{},{:+05},{:+05},{:+05},{:02}\r\n",
        ascii_code(kind)?,
        values[0],
        values[1],
        values[2],
        seq % 100
    )?;
    check_len(kind, packet, kind.wire_len())
}

/// `$XXX,dddd,ss\r\n`
pub fn ascii_single(kind: PacketType, value: u16, seq: u8) -> Result<Vec<u8>, ShakeError> {
    let mut packet = Vec::with_capacity(kind.wire_len());
    write!(packet, "{},{:04},{:02}\r\n", ascii_code(kind)?, value, seq % 100)?;
    check_len(kind, packet, kind.wire_len())
}

/// `$XXX,ss\r\n` for navigation and capacitive-threshold events.
pub fn ascii_event(kind: PacketType, seq: u8) -> Result<Vec<u8>, ShakeError> {
    let mut packet = Vec::with_capacity(kind.wire_len());
    write!(packet, "{},{:02}\r\n", ascii_code(kind)?, seq % 100)?;
    check_len(kind, packet, kind.wire_len())
}

/// Insert a `*HH` trailer before the terminator. `HH` is the XOR of the
/// bytes between `$` and `*`.
pub fn with_checksum(packet: &[u8]) -> Vec<u8> {
    let body_end = packet.len().saturating_sub(2);
    let sum = packet.get(1..body_end).unwrap_or_default().iter().fold(0u8, |acc, b| acc ^ b);
    let mut out = Vec::with_capacity(packet.len() + 3);
    out.extend_from_slice(&packet[..body_end]);
    out.extend_from_slice(format!("*{sum:02X}").as_bytes());
    out.extend_from_slice(&packet[body_end..]);
    out
}

/// Wrap a live ASCII data packet in a `$TIM` envelope, dropping its `,ss`
/// sequence field the way the device does for stored readings.
pub fn playback(timestamp: u64, live: &[u8]) -> Result<Vec<u8>, ShakeError> {
    if timestamp >= 10u64.pow(TIMESTAMP_DIGITS as u32) {
        return Err(ShakeError::NotEncodable {
            kind: PacketType::Timestamp,
            reason: format!("timestamp {timestamp} wider than {TIMESTAMP_DIGITS} digits"),
        });
    }
    let Some(body) = live.len().checked_sub(5).map(|end| &live[..end]) else {
        return Err(ShakeError::NotEncodable {
            kind: PacketType::Timestamp,
            reason: "inner packet too short".into(),
        });
    };
    let mut packet = Vec::with_capacity(PacketType::Timestamp.wire_len() + live.len());
    write!(packet, "$TIM,{timestamp:010},")?;
    packet.extend_from_slice(body);
    packet.extend_from_slice(b"\r\n");
    Ok(packet)
}

/// `$ACK,AAAA,VV\r\n`
pub fn ack(address: u16, value: u8) -> Vec<u8> {
    format!("$ACK,{address:04X},{value:02X}\r\n").into_bytes()
}

/// `$NAK,AAAA,VV\r\n`
pub fn nak(address: u16, value: u8) -> Vec<u8> {
    format!("$NAK,{address:04X},{value:02X}\r\n").into_bytes()
}

pub fn rfid(tag: &str) -> Result<Vec<u8>, ShakeError> {
    check_len(
        PacketType::RfidTag,
        format!("$RFI,{tag}\r\n").into_bytes(),
        PacketType::RfidTag.wire_len(),
    )
}

fn raw_packet(kind: PacketType, body: &[u8], seq: Option<u8>) -> Result<Vec<u8>, ShakeError> {
    let mut packet = Vec::with_capacity(kind.wire_len());
    packet.extend_from_slice(&[RAW_MARKER, RAW_MARKER, raw_selector(kind)?]);
    packet.extend_from_slice(body);
    let expected = match seq {
        Some(seq) => {
            packet.push(seq);
            kind.wire_len()
        }
        None => kind.wire_len() - 1,
    };
    check_len(kind, packet, expected)
}

/// Three little-endian `i16` values (inertial sensors, shaking).
pub fn raw_triple(kind: PacketType, values: [i16; 3], seq: Option<u8>) -> Result<Vec<u8>, ShakeError> {
    let mut body = Vec::with_capacity(6);
    for value in values {
        body.write_i16::<LittleEndian>(value)?;
    }
    raw_packet(kind, &body, seq)
}

/// One little-endian `u16` (heading, capacitive, analog, event code).
pub fn raw_single(kind: PacketType, value: u16, seq: Option<u8>) -> Result<Vec<u8>, ShakeError> {
    let mut body = Vec::with_capacity(2);
    body.write_u16::<LittleEndian>(value)?;
    raw_packet(kind, &body, seq)
}

/// Audio sample packet carrying μ-law bytes.
pub fn raw_audio(kind: PacketType, samples: &[u8], seq: Option<u8>) -> Result<Vec<u8>, ShakeError> {
    raw_packet(kind, samples, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        assert_eq!(Command::Read { address: 0x1234 }.encode(), b"$REA,1234,00\r\n");
        assert_eq!(
            Command::Write {
                address: 0x00AB,
                value: 0x5
            }
            .encode(),
            b"$WRI,00AB,05\r\n"
        );
    }

    #[test]
    fn test_ascii_layouts() {
        assert_eq!(
            ascii_triple(PacketType::Acc, [123, -456, 0], 7).unwrap(),
            b"$ACC,+0123,-0456,+0000,07\r\n"
        );
        assert_eq!(ascii_single(PacketType::Heading, 3599, 42).unwrap(), b"$HED,3599,42\r\n");
        assert_eq!(ascii_event(PacketType::NavCentre, 1).unwrap(), b"$NVC,01\r\n");
    }

    #[test]
    fn test_layout_mismatch_is_rejected() {
        assert!(ascii_single(PacketType::Acc, 1, 0).is_err());
        assert!(ascii_single(PacketType::Heading, 12345, 0).is_err());
        assert!(ascii_triple(PacketType::Gyro, [10000, 0, 0], 0).is_err());
        assert!(raw_single(PacketType::Heading, 1, None).is_err());
    }

    #[test]
    fn test_checksum_trailer() {
        let packet = with_checksum(b"$NVU,01\r\n");
        assert_eq!(packet.len(), 12);
        assert_eq!(&packet[..7], b"$NVU,01");
        assert_eq!(packet[7], b'*');
        assert_eq!(&packet[10..], b"\r\n");
    }

    #[test]
    fn test_playback_drops_sequence_field() {
        let live = ascii_single(PacketType::Cap0, 321, 55).unwrap();
        assert_eq!(playback(12345, &live).unwrap(), b"$TIM,0000012345,$CS0,0321\r\n");
    }

    #[test]
    fn test_raw_layouts() {
        assert_eq!(
            raw_triple(PacketType::RawAcc, [1, -1, 256], Some(9)).unwrap(),
            vec![0x7F, 0x7F, 0x7E, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x01, 0x09]
        );
        assert_eq!(
            raw_single(PacketType::RawEvent, 3, None).unwrap(),
            vec![0x7F, 0x7F, 0x76, 0x03, 0x00]
        );
    }
}
