//! The synchronize → classify → frame → dispatch loop.

use tracing::{debug, info, trace, warn};

use crate::config::DEFAULT_MAX_IDLE_READS;
use crate::dispatch::{Dispatched, dispatch};
use crate::error::ShakeError;
use crate::packet::PacketType;
use crate::session::Session;
use crate::sync;
use crate::transport::{ByteSource, Link};

/// Result of one reader cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Decoded(PacketType),
    /// The transport delivered nothing.
    Idle,
    /// Shutdown was requested.
    Stopped,
}

pub struct Reader<S> {
    link: Link<S>,
    session: Session,
    max_idle_reads: u32,
}

impl<S: ByteSource> Reader<S> {
    pub fn new(source: S, session: Session) -> Self {
        Self {
            link: Link::new(source),
            session,
            max_idle_reads: DEFAULT_MAX_IDLE_READS,
        }
    }

    /// Consecutive cycles without a single byte before the transport is
    /// considered gone.
    pub fn with_max_idle_reads(mut self, max_idle_reads: u32) -> Self {
        self.max_idle_reads = max_idle_reads.max(1);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn link(&self) -> &Link<S> {
        &self.link
    }

    /// Locate, frame and extract one packet.
    pub fn step(&mut self) -> Result<Step, ShakeError> {
        if self.session.is_shutdown() {
            return Ok(Step::Stopped);
        }
        let Some(header) = sync::next_header(&mut self.link)? else {
            return Ok(Step::Idle);
        };
        trace!(kind = %header.kind, "header");
        match dispatch(&mut self.link, &mut self.session, header)? {
            Dispatched::Extracted(kind) => Ok(Step::Decoded(kind)),
            Dispatched::Dropped(_) => Ok(Step::Stopped),
        }
    }

    /// Run until shutdown or an unrecoverable error. A pending command is
    /// released either way.
    pub fn run(mut self) -> Result<(), ShakeError> {
        info!("reader started");
        let result = self.run_inner();
        self.session.acks.cancel();
        match &result {
            Ok(()) => info!(consumed = self.link.consumed(), "reader stopped"),
            Err(e) => warn!(consumed = self.link.consumed(), "reader terminated: {}", e),
        }
        result
    }

    fn run_inner(&mut self) -> Result<(), ShakeError> {
        let mut idle_reads = 0u32;
        loop {
            let before = self.link.consumed();
            let result = self.step();
            if self.link.consumed() == before {
                idle_reads += 1;
            } else {
                idle_reads = 0;
            }

            match result {
                Ok(Step::Stopped) => return Ok(()),
                Ok(Step::Decoded(_) | Step::Idle) => {}
                Err(e @ ShakeError::UnrecognizedHeader { .. }) => debug!("resync: {}", e),
                Err(e) if e.is_recoverable() => warn!("packet dropped: {}", e),
                Err(e) => return Err(e),
            }

            if idle_reads >= self.max_idle_reads {
                return Err(ShakeError::TransportClosed { idle_reads });
            }
        }
    }
}
