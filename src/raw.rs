//! Reading the remainder of raw binary packets.
//!
//! Raw packets may or may not end with a sequence byte, and there is no
//! length field to say which. The last byte of a full-length read is
//! therefore judged by value: `0x7F` always starts the next raw header, `$`
//! and `\n` are ambiguous and only count as a sequence byte when they continue
//! the channel's counter, everything else is a sequence byte.

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::constants::{ASCII_LEAD, RAW_HEADER_LEN, RAW_MARKER, STARTUP_LEAD};
use crate::error::ShakeError;
use crate::packet::PacketType;
use crate::sync::Header;
use crate::transport::{ByteSource, Link};

#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub kind: PacketType,
    /// Header, body, and the sequence byte when `has_seq` is set.
    pub bytes: BytesMut,
    pub has_seq: bool,
}

impl RawFrame {
    pub fn body(&self) -> &[u8] {
        let end = if self.has_seq { self.bytes.len() - 1 } else { self.bytes.len() };
        &self.bytes[RAW_HEADER_LEN..end]
    }

    pub fn seq(&self) -> Option<u8> {
        if self.has_seq { self.bytes.last().copied() } else { None }
    }
}

/// What the final byte of a full-length raw packet turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailing {
    Sequence,
    /// First byte of the next packet
    Lookahead,
}

/// Judge a trailing byte against the channel's last sequence number.
pub fn classify_trailing(byte: u8, counter: u8) -> Trailing {
    match byte {
        RAW_MARKER => Trailing::Lookahead,
        ASCII_LEAD | STARTUP_LEAD if byte != counter.wrapping_add(1) => Trailing::Lookahead,
        _ => Trailing::Sequence,
    }
}

/// Read the rest of the raw packet whose header has just been classified.
/// `counter` is the last sequence number seen on the packet's channel.
pub fn read_packet<S: ByteSource>(link: &mut Link<S>, header: Header, counter: u8) -> Result<RawFrame, ShakeError> {
    let Header { kind, mut bytes } = header;
    let remaining = kind.wire_len() - RAW_HEADER_LEN;
    let got = link.read_into(&mut bytes, remaining)?;

    if remaining - got > 1 {
        debug!(expected = remaining, actual = got, partial = hex::encode(&bytes[..]), "short raw packet");
        return Err(ShakeError::FramingShortRead {
            expected: remaining,
            actual: got,
        });
    }

    let has_seq = if got < remaining {
        // no trailing byte: the device has sequence numbers turned off
        false
    } else {
        let byte = bytes[bytes.len() - 1];
        match classify_trailing(byte, counter) {
            Trailing::Sequence => true,
            Trailing::Lookahead => {
                trace!(byte = format!("{byte:02x}"), counter, "keeping trailing byte for next header");
                bytes.truncate(bytes.len() - 1);
                link.set_lookahead(byte);
                false
            }
        }
    };

    trace!(%kind, has_seq, bytes = hex::encode(&bytes[..]), "raw frame");
    Ok(RawFrame { kind, bytes, has_seq })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::next_header;
    use std::io::Cursor;

    fn read(stream: &[u8], counter: u8) -> (RawFrame, Link<Cursor<Vec<u8>>>) {
        let mut link = Link::new(Cursor::new(stream.to_vec()));
        let header = next_header(&mut link).unwrap().unwrap();
        let frame = read_packet(&mut link, header, counter).unwrap();
        (frame, link)
    }

    #[test]
    fn test_trailing_byte_rules() {
        assert_eq!(classify_trailing(0x7F, 0x7E), Trailing::Lookahead);
        assert_eq!(classify_trailing(b'$', 0), Trailing::Lookahead);
        assert_eq!(classify_trailing(b'$', b'$' - 1), Trailing::Sequence);
        assert_eq!(classify_trailing(b'\n', 9), Trailing::Sequence);
        assert_eq!(classify_trailing(b'\n', 3), Trailing::Lookahead);
        assert_eq!(classify_trailing(0x00, 200), Trailing::Sequence);
        assert_eq!(classify_trailing(0xFF, 254), Trailing::Sequence);
    }

    #[test]
    fn test_full_packet_with_sequence() {
        let (frame, link) = read(&[0x7F, 0x7F, 0x7B, 0x10, 0x0E, 0x05], 0);
        assert_eq!(frame.kind, PacketType::RawHeading);
        assert!(frame.has_seq);
        assert_eq!(frame.seq(), Some(5));
        assert_eq!(frame.body(), &[0x10, 0x0E]);
        assert_eq!(link.lookahead(), None);
    }

    #[test]
    fn test_missing_trailing_byte_means_no_sequence() {
        let (frame, _) = read(&[0x7F, 0x7F, 0x7A, 0x01, 0x02], 0);
        assert!(!frame.has_seq);
        assert_eq!(frame.seq(), None);
        assert_eq!(frame.body(), &[0x01, 0x02]);
    }

    #[test]
    fn test_raw_marker_becomes_lookahead() {
        let stream = [0x7F, 0x7F, 0x79, 0x01, 0x02, 0x7F, 0x7F, 0x78, 0x03, 0x04];
        let mut link = Link::new(Cursor::new(stream.to_vec()));

        let header = next_header(&mut link).unwrap().unwrap();
        let first = read_packet(&mut link, header, 0).unwrap();
        assert!(!first.has_seq);
        assert_eq!(link.lookahead(), Some(0x7F));

        let header = next_header(&mut link).unwrap().unwrap();
        assert_eq!(header.kind, PacketType::RawAnalog0);
        let second = read_packet(&mut link, header, 0).unwrap();
        assert_eq!(second.body(), &[0x03, 0x04]);
    }

    #[test]
    fn test_dollar_that_does_not_continue_counter_starts_ascii_packet() {
        let (frame, link) = read(b"\x7F\x7F\x7A\x01\x02$NVU,01\r\n", 0x10);
        assert!(!frame.has_seq);
        assert_eq!(link.lookahead(), Some(b'$'));
    }

    #[test]
    fn test_short_by_two_is_error() {
        let mut link = Link::new(Cursor::new(vec![0x7F, 0x7F, 0x7E, 0x01, 0x02, 0x03, 0x04, 0x05]));
        let header = next_header(&mut link).unwrap().unwrap();
        assert!(matches!(
            read_packet(&mut link, header, 0),
            Err(ShakeError::FramingShortRead { expected: 7, actual: 5 })
        ));
    }
}
