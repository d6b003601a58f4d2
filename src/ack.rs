//! Correlating ACK/NAK packets with the command that asked for them.
//!
//! The channel holds at most one outstanding request. The command side calls
//! [`AckChannel::begin`] before writing, awaits the returned receiver with a
//! timeout, and the reader loop calls [`AckChannel::complete`] when an ACK or
//! NAK arrives. Each request carries a [`Ticket`]; a command that gives up
//! withdraws only its own ticket, so it can never clear a later request.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::ShakeError;

/// Outcome of a command as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckResult {
    Ack { address: u16, value: u8 },
    Nak,
}

impl AckResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AckResult::Ack { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    Idle,
    AwaitingAck,
}

/// Identifies one request on an [`AckChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
struct Slot {
    issued: u64,
    waiter: Option<(Ticket, oneshot::Sender<AckResult>)>,
}

impl Slot {
    fn is_waiting(&self) -> bool {
        self.waiter.as_ref().is_some_and(|(_, tx)| !tx.is_closed())
    }
}

#[derive(Debug, Default)]
pub struct AckChannel {
    slot: Mutex<Slot>,
}

impl AckChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> AckState {
        if self.slot().is_waiting() {
            AckState::AwaitingAck
        } else {
            AckState::Idle
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == AckState::AwaitingAck
    }

    /// Idle → AwaitingAck. Fails if another command is still waiting.
    pub fn begin(&self) -> Result<(Ticket, oneshot::Receiver<AckResult>), ShakeError> {
        let mut slot = self.slot();
        if slot.is_waiting() {
            return Err(ShakeError::CommandPending);
        }
        slot.issued = slot.issued.wrapping_add(1);
        let ticket = Ticket(slot.issued);
        let (tx, rx) = oneshot::channel();
        slot.waiter = Some((ticket, tx));
        Ok((ticket, rx))
    }

    /// Deliver an ACK/NAK to the waiting command and return to Idle.
    pub fn complete(&self, result: AckResult) -> Result<(), ShakeError> {
        let waiter = self.slot().waiter.take();
        match waiter {
            Some((_, tx)) => {
                if tx.send(result).is_err() {
                    // waiter gave up (timeout) between our check and the send
                    warn!(?result, "acknowledgment arrived after the command stopped waiting");
                    return Err(ShakeError::UnexpectedAcknowledgment);
                }
                debug!(?result, "acknowledgment delivered");
                Ok(())
            }
            None => {
                warn!(?result, "discarding acknowledgment with no command outstanding");
                Err(ShakeError::UnexpectedAcknowledgment)
            }
        }
    }

    /// Withdraw the request behind `ticket`. A newer request is left alone.
    pub fn withdraw(&self, ticket: Ticket) {
        let mut slot = self.slot();
        if slot.waiter.as_ref().is_some_and(|(current, _)| *current == ticket) {
            slot.waiter = None;
            debug!(?ticket, "pending acknowledgment withdrawn");
        }
    }

    /// Release any waiting command with a failure. Used on shutdown.
    pub fn cancel(&self) {
        if self.slot().waiter.take().is_some() {
            debug!("pending acknowledgment cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_releases_waiter_with_values() {
        let channel = AckChannel::new();
        let (_, mut rx) = channel.begin().unwrap();
        assert_eq!(channel.state(), AckState::AwaitingAck);

        let result = AckResult::Ack {
            address: 0x1234,
            value: 0x56,
        };
        channel.complete(result).unwrap();
        assert_eq!(rx.try_recv().unwrap(), result);
        assert_eq!(channel.state(), AckState::Idle);
    }

    #[test]
    fn test_stray_ack_is_rejected() {
        let channel = AckChannel::new();
        assert!(matches!(
            channel.complete(AckResult::Nak),
            Err(ShakeError::UnexpectedAcknowledgment)
        ));
        assert_eq!(channel.state(), AckState::Idle);
    }

    #[test]
    fn test_second_command_while_pending() {
        let channel = AckChannel::new();
        let _pending = channel.begin().unwrap();
        assert!(matches!(channel.begin(), Err(ShakeError::CommandPending)));
    }

    #[test]
    fn test_cancel_and_dropped_waiter_return_to_idle() {
        let channel = AckChannel::new();
        let (_, mut rx) = channel.begin().unwrap();
        channel.cancel();
        assert!(rx.try_recv().is_err());
        assert_eq!(channel.state(), AckState::Idle);

        let (_, rx) = channel.begin().unwrap();
        drop(rx);
        assert_eq!(channel.state(), AckState::Idle);
        assert!(channel.begin().is_ok());
    }

    #[test]
    fn test_stale_ticket_leaves_newer_request_alone() {
        let channel = AckChannel::new();
        // the first command times out and drops its receiver
        let (first, rx) = channel.begin().unwrap();
        drop(rx);

        let (second, mut rx) = channel.begin().unwrap();
        assert_ne!(first, second);
        channel.withdraw(first);
        assert_eq!(channel.state(), AckState::AwaitingAck);

        let result = AckResult::Ack {
            address: 0x0002,
            value: 0x11,
        };
        channel.complete(result).unwrap();
        assert_eq!(rx.try_recv().unwrap(), result);
    }

    #[test]
    fn test_withdraw_own_ticket_returns_to_idle() {
        let channel = AckChannel::new();
        let (ticket, mut rx) = channel.begin().unwrap();
        channel.withdraw(ticket);
        assert_eq!(channel.state(), AckState::Idle);
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            channel.complete(AckResult::Nak),
            Err(ShakeError::UnexpectedAcknowledgment)
        ));
    }
}
