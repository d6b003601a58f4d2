use tracing::debug;

use crate::error::ShakeError;
use crate::packet::{PacketType, WireFormat};
use crate::session::Session;
use crate::sync::Header;
use crate::transport::{ByteSource, Link};
use crate::{ascii, extract, raw};

/// What happened to a classified packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Extracted(PacketType),
    /// Framed, but shutdown was requested before it could be applied.
    Dropped(PacketType),
}

/// Frame the packet behind `header` and hand it to the matching extractor.
pub fn dispatch<S: ByteSource>(
    link: &mut Link<S>,
    session: &mut Session,
    header: Header,
) -> Result<Dispatched, ShakeError> {
    let kind = header.kind;
    match kind.format() {
        WireFormat::Ascii => {
            let packet = ascii::read_packet(link, header)?;
            if session.is_shutdown() {
                debug!(%kind, "shutting down, packet dropped");
                return Ok(Dispatched::Dropped(kind));
            }
            extract::ascii::extract(session, packet)?;
        }
        WireFormat::Raw => {
            let counter = kind.seq_channel().map(|ch| session.sensors().seq(ch)).unwrap_or_default();
            let frame = raw::read_packet(link, header, counter)?;
            if session.is_shutdown() {
                debug!(%kind, "shutting down, packet dropped");
                return Ok(Dispatched::Dropped(kind));
            }
            extract::raw::extract(session, &frame)?;
        }
    }
    Ok(Dispatched::Extracted(kind))
}
