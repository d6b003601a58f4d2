//! Locating the next packet header in the stream.

use bytes::BytesMut;
use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::constants::{
    ASCII_HEADER_LEN, ASCII_LEAD, MAX_PACKET_LEN, RAW_HEADER_LEN, RAW_MARKER, RESYNC_SCAN_LIMIT, STARTUP_LEAD,
};
use crate::error::ShakeError;
use crate::packet::{PacketType, WireFormat, classify_header};
use crate::transport::{ByteSource, Link};

/// A classified header, with its bytes at the start of the packet buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub kind: PacketType,
    pub bytes: BytesMut,
}

impl Header {
    fn new(kind: PacketType, window: &[u8]) -> Self {
        let mut bytes = BytesMut::with_capacity(MAX_PACKET_LEN);
        bytes.extend_from_slice(window);
        Self { kind, bytes }
    }
}

/// Find and classify the next header.
///
/// Returns `Ok(None)` when the transport delivered nothing at all. When the
/// first window does not classify, the bytes after its first position and then
/// fresh reads are examined one by one for `$` or `0x7F`, up to
/// [`RESYNC_SCAN_LIMIT`] bytes. Bytes consumed by a failed scan are gone; the
/// next call continues from wherever the stream now is.
pub fn next_header<S: ByteSource>(link: &mut Link<S>) -> Result<Option<Header>, ShakeError> {
    let mut window = [0u8; ASCII_HEADER_LEN];
    let got = link.read(&mut window[..RAW_HEADER_LEN])?;
    if got == 0 {
        return Ok(None);
    }

    let mut end = got;
    if got == RAW_HEADER_LEN {
        if window[0] == RAW_MARKER && window[1] == RAW_MARKER {
            if let Some(kind) = classify_header(&window[..RAW_HEADER_LEN], WireFormat::Raw) {
                return Ok(Some(Header::new(kind, &window[..RAW_HEADER_LEN])));
            }
        } else if window[0] == ASCII_LEAD || window[0] == STARTUP_LEAD {
            end += link.read(&mut window[RAW_HEADER_LEN..])?;
            if let Some(kind) = classify_header(&window[..end], WireFormat::Ascii) {
                return Ok(Some(Header::new(kind, &window[..end])));
            }
        }
    }

    debug!(window = hex::encode(&window[..end]), "unrecognized header, scanning for next marker");
    scan(link, window[1..end].iter().copied().collect())
}

fn scan<S: ByteSource>(link: &mut Link<S>, mut held: VecDeque<u8>) -> Result<Option<Header>, ShakeError> {
    let mut scanned = 0;
    while scanned < RESYNC_SCAN_LIMIT {
        let byte = match held.pop_front() {
            Some(byte) => Some(byte),
            None => link.read_byte()?,
        };
        scanned += 1;

        let Some(byte) = byte else { continue };
        let (format, len) = match byte {
            ASCII_LEAD => (WireFormat::Ascii, ASCII_HEADER_LEN),
            RAW_MARKER => (WireFormat::Raw, RAW_HEADER_LEN),
            _ => continue,
        };

        let mut bytes = BytesMut::with_capacity(MAX_PACKET_LEN);
        bytes.extend_from_slice(&[byte]);
        while bytes.len() < len {
            match held.pop_front() {
                Some(b) => bytes.extend_from_slice(&[b]),
                None => break,
            }
        }
        let need = len - bytes.len();
        if need > 0 {
            link.read_into(&mut bytes, need)?;
        }

        return match classify_header(&bytes, format) {
            Some(kind) => {
                trace!(%kind, scanned, "resynchronized");
                Ok(Some(Header { kind, bytes }))
            }
            None => Err(ShakeError::UnrecognizedHeader { scanned }),
        };
    }
    Err(ShakeError::UnrecognizedHeader { scanned })
}
