// This file is part of fpqd, a daemon that serializes FrontPanel device access through a prioritized ticket queue.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// fpqd is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// fpqd is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! Completion handles for scheduled device operations.

use crate::axil_bridge::AxiResponse;
use crate::error::FpqdError;
use crate::operations::OperationKind;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Why a ticket completed without a value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    #[error("TicketError::Dropped: Discarded to keep at most {max} frame batches queued")]
    Dropped { max: usize },
    #[error("TicketError::Cancelled: Removed from the queue before it ran")]
    Cancelled,
    #[error("TicketError::Shutdown: The device queue stopped before the ticket ran")]
    Shutdown,
    #[error("TicketError::Bus: AXI transaction at 0x{address:08X} returned {response}")]
    Bus { address: u32, response: AxiResponse },
    #[error("TicketError::FrameBatchFailed: Gateware flagged the frame batch as failed")]
    FrameBatchFailed,
    #[error("TicketError::FrameBatchTimeout: Frame batch not acknowledged within {timeout_ms} ms")]
    FrameBatchTimeout { timeout_ms: u128 },
    #[error("TicketError::Device: {message}")]
    Device { message: String, fatal: bool },
}

impl TicketError {
    /// True when the gateware needs an AXI reset before the bridge is usable again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TicketError::Device { fatal: true, .. })
    }

    /// True when the ticket never reached the device.
    pub fn is_unexecuted(&self) -> bool {
        matches!(
            self,
            TicketError::Dropped { .. } | TicketError::Cancelled | TicketError::Shutdown
        )
    }
}

impl From<FpqdError> for TicketError {
    fn from(err: FpqdError) -> Self {
        match err {
            FpqdError::Ticket(inner) => inner,
            other => TicketError::Device {
                fatal: other.is_fatal(),
                message: other.to_string(),
            },
        }
    }
}

/// Value a ticket resolves to: the read word for reads and FPS queries, `None` otherwise.
pub type TicketOutcome = Result<Option<u32>, TicketError>;

struct TicketState {
    id: u64,
    kind: OperationKind,
    priority: u8,
    created: Instant,
    outcome: Mutex<Option<TicketOutcome>>,
    completed: Condvar,
}

/// Shared handle on one scheduled operation.
///
/// Cloning is cheap; every clone observes the same completion. The outcome is written once by
/// whoever resolves the ticket (the consumer, the backpressure bound, `cancel_all` or shutdown)
/// and can then be read any number of times.
#[derive(Clone)]
pub struct Ticket {
    state: Arc<TicketState>,
}

impl Ticket {
    pub(crate) fn new(id: u64, kind: OperationKind, priority: u8) -> Ticket {
        Ticket {
            state: Arc::new(TicketState {
                id,
                kind,
                priority,
                created: Instant::now(),
                outcome: Mutex::new(None),
                completed: Condvar::new(),
            }),
        }
    }

    /// Insertion sequence number, unique per queue.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn kind(&self) -> OperationKind {
        self.state.kind
    }

    pub fn priority(&self) -> u8 {
        self.state.priority
    }

    /// Time since the ticket was scheduled.
    pub fn age(&self) -> Duration {
        self.state.created.elapsed()
    }

    /// Resolve the ticket. Only the first call has an effect.
    ///
    /// # Returns: `bool`
    /// * `true` - This call set the outcome and woke the waiters
    /// * `false` - The ticket was already complete
    pub(crate) fn complete(&self, outcome: TicketOutcome) -> bool {
        let mut slot = self
            .state
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.state.completed.notify_all();
        true
    }

    /// Block until the ticket is complete and return its outcome.
    pub fn wait(&self) -> TicketOutcome {
        let guard = self
            .state
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let guard = self
            .state
            .completed
            .wait_while(guard, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone().unwrap_or(Err(TicketError::Shutdown))
    }

    /// Like [`Ticket::wait`] but gives up after `timeout`, returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TicketOutcome> {
        let guard = self
            .state
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .state
            .completed
            .wait_timeout_while(guard, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// The outcome if the ticket is already complete.
    pub fn try_outcome(&self) -> Option<TicketOutcome> {
        self.state
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_done(&self) -> bool {
        self.try_outcome().is_some()
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("priority", &self.state.priority)
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use std::thread;

    #[gtest]
    fn test_outcome_is_set_once() {
        let ticket = Ticket::new(0, OperationKind::Read, 2);
        assert_that!(ticket.complete(Ok(Some(7))), eq(true));
        assert_that!(ticket.complete(Err(TicketError::Cancelled)), eq(false));
        assert_eq!(ticket.wait(), Ok(Some(7)));
        assert_eq!(ticket.try_outcome(), Some(Ok(Some(7))));
    }

    #[gtest]
    fn test_wait_blocks_until_completion() {
        let ticket = Ticket::new(0, OperationKind::Write, 2);
        let completer = ticket.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            completer.complete(Ok(None))
        });
        let start = Instant::now();
        assert_eq!(ticket.wait(), Ok(None));
        assert_that!(start.elapsed() >= Duration::from_millis(50), eq(true));
        assert_that!(handle.join().unwrap(), eq(true));
    }

    #[gtest]
    fn test_wait_timeout_on_pending_ticket() {
        let ticket = Ticket::new(3, OperationKind::ResetAxi, 0);
        assert_eq!(ticket.wait_timeout(Duration::from_millis(10)), None);
        assert_that!(ticket.is_done(), eq(false));
    }

    #[gtest]
    fn test_fpqd_error_conversion() {
        let unwrapped: TicketError = FpqdError::Ticket(TicketError::Cancelled).into();
        assert_eq!(unwrapped, TicketError::Cancelled);

        let fatal: TicketError = FpqdError::AxiHardwareTimeout.into();
        assert_that!(fatal.is_fatal(), eq(true));
        let transport: TicketError = FpqdError::Transport {
            endpoint: 0x80,
            message: "pipe stalled".into(),
        }
        .into();
        assert_that!(transport.is_fatal(), eq(false));
        assert_that!(transport.to_string().as_str(), contains_substring("pipe stalled"));
        assert_that!(TicketError::Shutdown.is_unexecuted(), eq(true));
        assert_that!(TicketError::FrameBatchFailed.is_unexecuted(), eq(false));
    }
}
