//! Byte-level access to the serial stream.
//!
//! [`ByteSource`] is the only thing the decoder needs from a transport: a
//! blocking "read up to N bytes" with short-read semantics. [`Link`] wraps a
//! source with the per-session link state, most importantly the one-byte
//! lookahead that the raw framer leaves behind.

use bytes::BytesMut;
use std::io::{self, Read};
use tracing::trace;

use crate::error::ShakeError;

/// Blocking read primitive consumed by the decoder.
pub trait ByteSource {
    /// Fill as much of `buf` as the transport delivers before it times out or
    /// reaches end of stream. Returns the number of bytes read, which may be
    /// less than `buf.len()` (including zero).
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: Read> ByteSource for R {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // serial ports report an expired read timeout this way
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Mutable per-session framing state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkState {
    /// Whether ASCII packets currently carry a checksum trailer. Starts off and
    /// is toggled by the ASCII framer when the terminator position changes.
    pub checksum: bool,
    lookahead: Option<u8>,
    consumed: u64,
}

/// A byte source plus its [`LinkState`].
pub struct Link<S> {
    source: S,
    pub state: LinkState,
}

impl<S: ByteSource> Link<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: LinkState::default(),
        }
    }

    /// Read up to `buf.len()` bytes, serving a pending lookahead byte first.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ShakeError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut filled = 0;
        if let Some(byte) = self.state.lookahead.take() {
            buf[0] = byte;
            filled = 1;
        }
        if filled < buf.len() {
            let got = self.source.read_bytes(&mut buf[filled..])?;
            self.state.consumed += got as u64;
            filled += got;
        }
        trace!(bytes = hex::encode(&buf[..filled]), wanted = buf.len(), "read");
        Ok(filled)
    }

    /// Read a single byte; `None` when the transport delivered nothing.
    pub fn read_byte(&mut self) -> Result<Option<u8>, ShakeError> {
        let mut byte = [0u8; 1];
        Ok((self.read(&mut byte)? == 1).then_some(byte[0]))
    }

    /// Append up to `n` bytes to `frame`, returning how many arrived.
    pub fn read_into(&mut self, frame: &mut BytesMut, n: usize) -> Result<usize, ShakeError> {
        let start = frame.len();
        frame.resize(start + n, 0);
        let got = self.read(&mut frame[start..])?;
        frame.truncate(start + got);
        Ok(got)
    }

    /// Keep `byte` as the first byte of the next read.
    pub fn set_lookahead(&mut self, byte: u8) {
        self.state.lookahead = Some(byte);
    }

    pub fn lookahead(&self) -> Option<u8> {
        self.state.lookahead
    }

    /// Total bytes pulled from the underlying source.
    pub fn consumed(&self) -> u64 {
        self.state.consumed
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_lookahead_is_served_first() {
        let mut link = Link::new(Cursor::new(vec![2u8, 3, 4]));
        link.set_lookahead(1);
        let mut buf = [0u8; 3];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(link.lookahead(), None);
        // the lookahead byte was already counted when it was first read
        assert_eq!(link.consumed(), 2);
    }

    #[test]
    fn test_short_read_reports_actual_count() {
        let mut link = Link::new(Cursor::new(vec![9u8, 8]));
        let mut frame = BytesMut::from(&b"ab"[..]);
        assert_eq!(link.read_into(&mut frame, 5).unwrap(), 2);
        assert_eq!(frame.as_ref(), &[b'a', b'b', 9, 8]);
        assert_eq!(link.read_byte().unwrap(), None);
    }
}
