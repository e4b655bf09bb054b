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

//! Priority queue shared by the producers and the device consumer.

use crate::operations::{Operation, OperationKind};
use crate::scheduler::ticket::{Ticket, TicketError};
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Kind subject to the outstanding-ticket bound.
pub const HIGH_VOLUME_KIND: OperationKind = OperationKind::SendFrameBatch;

struct QueuedTicket {
    ticket: Ticket,
    operation: Operation,
}

impl QueuedTicket {
    fn key(&self) -> (u8, u64) {
        (self.ticket.priority(), self.ticket.id())
    }
}

impl PartialEq for QueuedTicket {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedTicket {}

impl PartialOrd for QueuedTicket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTicket {
    // BinaryHeap is a max-heap; the smallest (priority, sequence) must come out first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedTicket>,
    next_sequence: u64,
    closed: bool,
    dropped: u64,
}

impl QueueState {
    fn count_of(&self, kind: OperationKind) -> usize {
        self.heap
            .iter()
            .filter(|queued| queued.ticket.kind() == kind)
            .count()
    }

    /// Remove and return the lowest-sequence ticket of `kind`.
    fn remove_oldest(&mut self, kind: OperationKind) -> Option<Ticket> {
        let mut items = std::mem::take(&mut self.heap).into_vec();
        let oldest = items
            .iter()
            .enumerate()
            .filter(|(_, queued)| queued.ticket.kind() == kind)
            .min_by_key(|(_, queued)| queued.ticket.id())
            .map(|(index, _)| index);
        let removed = oldest.map(|index| items.swap_remove(index).ticket);
        self.heap = BinaryHeap::from(items);
        removed
    }
}

/// Tickets waiting for the device, ordered by (priority, insertion sequence).
///
/// Lower priority values run first; tickets of equal priority run in the order they were
/// scheduled. At most `max_outstanding_frame_batches` frame-batch tickets are queued at any
/// time: scheduling one more drops the oldest.
pub struct DeviceQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    max_outstanding_frame_batches: usize,
}

impl DeviceQueue {
    pub fn new(max_outstanding_frame_batches: usize) -> DeviceQueue {
        DeviceQueue {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            max_outstanding_frame_batches: max_outstanding_frame_batches.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_outstanding_frame_batches(&self) -> usize {
        self.max_outstanding_frame_batches
    }

    /// Queue `operation` at `priority` and return its ticket without blocking.
    ///
    /// On a closed queue the ticket is returned already completed with
    /// [`TicketError::Shutdown`].
    pub fn schedule(&self, operation: Operation, priority: u8) -> Ticket {
        let kind = operation.kind();
        let mut state = self.lock();
        let ticket = Ticket::new(state.next_sequence, kind, priority);
        state.next_sequence += 1;

        if state.closed {
            debug!("{kind} scheduled on a closed queue");
            ticket.complete(Err(TicketError::Shutdown));
            return ticket;
        }

        if kind == HIGH_VOLUME_KIND {
            while state.count_of(kind) >= self.max_outstanding_frame_batches {
                let Some(oldest) = state.remove_oldest(kind) else {
                    break;
                };
                state.dropped += 1;
                warn!(
                    "Frame batch queue is full ({} outstanding), dropping ticket {} ({:?} old)",
                    self.max_outstanding_frame_batches,
                    oldest.id(),
                    oldest.age()
                );
                oldest.complete(Err(TicketError::Dropped {
                    max: self.max_outstanding_frame_batches,
                }));
            }
        }

        state.heap.push(QueuedTicket {
            ticket: ticket.clone(),
            operation,
        });
        self.available.notify_one();
        ticket
    }

    /// Remove every queued ticket of `kind`, completing each with [`TicketError::Cancelled`].
    ///
    /// # Returns: `usize`
    /// * Number of tickets removed
    pub fn cancel_all(&self, kind: OperationKind) -> usize {
        let mut state = self.lock();
        let (cancelled, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.heap)
            .into_vec()
            .into_iter()
            .partition(|queued| queued.ticket.kind() == kind);
        state.heap = BinaryHeap::from(kept);
        for queued in &cancelled {
            queued.ticket.complete(Err(TicketError::Cancelled));
        }
        if !cancelled.is_empty() {
            debug!("cancelled {} queued {kind} tickets", cancelled.len());
        }
        cancelled.len()
    }

    /// Pop the most urgent ticket, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout or once the queue is closed. A closed queue keeps its
    /// tickets for [`DeviceQueue::drain`].
    pub fn pop_timeout(&self, timeout: Duration) -> Option<(Ticket, Operation)> {
        let state = self.lock();
        let (mut state, _) = self
            .available
            .wait_timeout_while(state, timeout, |state| {
                state.heap.is_empty() && !state.closed
            })
            .unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return None;
        }
        state
            .heap
            .pop()
            .map(|queued| (queued.ticket, queued.operation))
    }

    /// Queued tickets in execution order.
    pub fn pending(&self) -> Vec<Ticket> {
        let state = self.lock();
        let mut tickets: Vec<Ticket> = state.heap.iter().map(|q| q.ticket.clone()).collect();
        tickets.sort_by_key(|ticket| (ticket.priority(), ticket.id()));
        tickets
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_of(&self, kind: OperationKind) -> usize {
        self.lock().count_of(kind)
    }

    /// Frame batches discarded by the outstanding bound since start-up.
    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }

    /// Refuse new tickets and wake the consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Complete every queued ticket with [`TicketError::Shutdown`].
    pub fn drain(&self) -> usize {
        let drained = std::mem::take(&mut self.lock().heap);
        let count = drained.len();
        for queued in drained {
            queued.ticket.complete(Err(TicketError::Shutdown));
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn frame_batch() -> Operation {
        Operation::SendFrameBatch {
            data: vec![0; 16],
            frames: 1,
        }
    }

    fn pop_all(queue: &DeviceQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.pop_timeout(Duration::ZERO))
            .map(|(ticket, _)| ticket.id())
            .collect()
    }

    #[gtest]
    fn test_priority_then_fifo_order() {
        let queue = DeviceQueue::new(5);
        let a = queue.schedule(Operation::Read { address: 0 }, 2);
        let b = queue.schedule(frame_batch(), 1);
        let c = queue.schedule(Operation::RetrieveAndSetFps, 0);
        let d = queue.schedule(Operation::Read { address: 4 }, 2);
        let e = queue.schedule(frame_batch(), 1);

        let pending: Vec<u64> = queue.pending().iter().map(Ticket::id).collect();
        let expected = vec![c.id(), b.id(), e.id(), a.id(), d.id()];
        assert_eq!(pending, expected);
        assert_eq!(pop_all(&queue), expected);
    }

    #[gtest]
    fn test_oldest_frame_batch_is_dropped() {
        let queue = DeviceQueue::new(2);
        let first = queue.schedule(frame_batch(), 1);
        let second = queue.schedule(frame_batch(), 1);
        let read = queue.schedule(Operation::Read { address: 0 }, 2);
        let third = queue.schedule(frame_batch(), 1);

        assert_that!(queue.count_of(OperationKind::SendFrameBatch), eq(2));
        assert_eq!(first.try_outcome(), Some(Err(TicketError::Dropped { max: 2 })));
        assert_that!(second.is_done(), eq(false));
        assert_that!(queue.dropped_count(), eq(1));
        assert_eq!(pop_all(&queue), vec![second.id(), third.id(), read.id()]);
    }

    #[gtest]
    fn test_cancel_all_keeps_others_in_order() {
        let queue = DeviceQueue::new(5);
        let read = queue.schedule(Operation::Read { address: 0 }, 2);
        let batch = queue.schedule(frame_batch(), 1);
        let fps = queue.schedule(Operation::RetrieveAndSetFps, 0);
        let write = queue.schedule(Operation::Write { address: 0, data: 1 }, 2);
        queue.schedule(frame_batch(), 1);

        assert_that!(queue.cancel_all(OperationKind::SendFrameBatch), eq(2));
        assert_that!(queue.count_of(OperationKind::SendFrameBatch), eq(0));
        assert_eq!(batch.try_outcome(), Some(Err(TicketError::Cancelled)));
        assert_eq!(pop_all(&queue), vec![fps.id(), read.id(), write.id()]);
        assert_that!(queue.cancel_all(OperationKind::SendFrameBatch), eq(0));
    }

    #[gtest]
    fn test_pop_waits_for_schedule() {
        let queue = Arc::new(DeviceQueue::new(5));
        let producer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.schedule(Operation::ResetAxi, 0).id()
        });
        let popped = queue.pop_timeout(Duration::from_secs(5)).map(|(t, _)| t.id());
        assert_eq!(popped, Some(handle.join().unwrap()));
    }

    #[gtest]
    fn test_empty_pop_times_out() {
        let queue = DeviceQueue::new(5);
        let start = Instant::now();
        assert_that!(queue.pop_timeout(Duration::from_millis(20)).is_none(), eq(true));
        assert_that!(start.elapsed() >= Duration::from_millis(20), eq(true));
    }

    #[gtest]
    fn test_closed_queue_resolves_tickets() {
        let queue = DeviceQueue::new(5);
        let queued = queue.schedule(Operation::ResetAxi, 0);
        queue.close();
        assert_that!(queue.pop_timeout(Duration::ZERO).is_none(), eq(true));
        assert_that!(queue.len(), eq(1));
        let late = queue.schedule(Operation::ResetAxi, 0);
        assert_eq!(late.try_outcome(), Some(Err(TicketError::Shutdown)));
        assert_that!(queue.drain(), eq(1));
        assert_eq!(queued.wait(), Err(TicketError::Shutdown));
        assert_that!(queue.is_empty(), eq(true));
    }
}
