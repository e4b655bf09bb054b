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

#[allow(dead_code)]
mod common {
    pub mod test_functions;
}

use common::test_functions::{RecordingDevice, simulated, test_config, wait_for};
use fpqd::axil_bridge::{AxiLiteBridge, AxiResponse};
use fpqd::config::{self, DaemonConfig};
use fpqd::devices::device::FrontPanel;
use fpqd::devices::simulated::SCRATCH_BASE_ADDR;
use fpqd::operations::{DeviceContext, Operation, OperationKind};
use fpqd::scheduler::{DeviceQueue, DeviceWorker, Ticket, TicketError};
use fpqd::stats::TicketStats;
use fpqd::system_vars::SystemVariables;
use googletest::prelude::*;
use rstest::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn spawn_worker(
    config: &DaemonConfig,
    device: Box<dyn FrontPanel>,
    queue: &Arc<DeviceQueue>,
) -> (DeviceWorker, Arc<TicketStats>) {
    let bridge = AxiLiteBridge::new(device, config.bridge.clone()).expect("bridge init failed");
    let stats = Arc::new(TicketStats::new());
    let context = DeviceContext::new(
        bridge,
        Arc::new(SystemVariables::new(&config.stream)),
        stats.clone(),
        config.scheduler.frame_batch_timeout,
    );
    let worker = DeviceWorker::spawn(queue.clone(), context, config.scheduler.poll_interval)
        .expect("failed to spawn worker");
    (worker, stats)
}

/// Config whose bridge gives up on a stuck busy bit after about one second.
#[fixture]
fn stuck_config() -> DaemonConfig {
    let mut config = test_config();
    config.bridge.hardware_timeout_ms = 1;
    config
}

fn frame_batch() -> Operation {
    Operation::SendFrameBatch {
        data: vec![0; 48],
        frames: 1,
    }
}

#[gtest]
fn tickets_execute_by_priority_then_insertion() {
    let config = test_config();
    let device = RecordingDevice::new(&config.bridge);
    let log = device.log.clone();
    let queue = Arc::new(DeviceQueue::new(5));

    let schedule = [(0x00, 2), (0x04, 1), (0x08, 0), (0x0c, 2), (0x10, 1), (0x14, 0)];
    let tickets: Vec<Ticket> = schedule
        .iter()
        .map(|(offset, priority)| {
            queue.schedule(
                Operation::Read {
                    address: SCRATCH_BASE_ADDR + offset,
                },
                *priority,
            )
        })
        .collect();

    let (mut worker, stats) = spawn_worker(&config, Box::new(device), &queue);
    for ticket in &tickets {
        assert_eq!(ticket.wait(), Ok(Some(0)));
    }
    worker.stop();

    let expected: Vec<u32> = [0x08, 0x14, 0x04, 0x10, 0x00, 0x0c]
        .iter()
        .map(|offset| SCRATCH_BASE_ADDR + offset)
        .collect();
    assert_eq!(*log.lock().unwrap(), expected);
    assert_that!(stats.totals()[&OperationKind::Read].count, eq(6));
}

#[gtest]
fn bus_errors_are_returned_and_consumer_keeps_going() {
    let config = test_config();
    let queue = Arc::new(DeviceQueue::new(5));
    let (mut worker, _) = spawn_worker(&config, Box::new(simulated(&config)), &queue);

    let unmapped = queue.schedule(Operation::Read { address: 0x1000_0000 }, 2);
    let read_only_address = config::DP_RX_BASE_ADDR + config::DP_RX_MSA_VTOTAL_REG;
    let read_only = queue.schedule(
        Operation::Write {
            address: read_only_address,
            data: 0,
        },
        2,
    );
    let write = queue.schedule(
        Operation::Write {
            address: SCRATCH_BASE_ADDR,
            data: 0x1234,
        },
        2,
    );
    let read = queue.schedule(Operation::Read { address: SCRATCH_BASE_ADDR }, 2);

    assert_eq!(
        unmapped.wait(),
        Err(TicketError::Bus {
            address: 0x1000_0000,
            response: AxiResponse::DecodeError
        })
    );
    assert_eq!(
        read_only.wait(),
        Err(TicketError::Bus {
            address: read_only_address,
            response: AxiResponse::SlaveError
        })
    );
    assert_eq!(write.wait(), Ok(None));
    assert_eq!(read.wait(), Ok(Some(0x1234)));
    assert_that!(worker.is_running(), eq(true));
    worker.stop();
}

#[gtest]
fn unresponsive_slave_is_a_fatal_ticket_error() {
    let config = test_config();
    let address = SCRATCH_BASE_ADDR + 0x40;
    let queue = Arc::new(DeviceQueue::new(5));
    let device = simulated(&config).with_unresponsive(address);
    let (mut worker, _) = spawn_worker(&config, Box::new(device), &queue);

    let outcome = queue.schedule(Operation::Read { address }, 2).wait();
    let error = outcome.expect_err("read of an unresponsive slave should fail");
    assert_that!(error.is_fatal(), eq(true));
    assert_that!(error.to_string().as_str(), contains_substring("AxiHardwareTimeout"));

    // The bridge itself is still usable for other slaves.
    let other = queue.schedule(Operation::Read { address: SCRATCH_BASE_ADDR }, 2);
    assert_eq!(other.wait(), Ok(Some(0)));
    worker.stop();
}

#[gtest]
#[rstest]
fn stop_resolves_queued_tickets_with_shutdown(stuck_config: DaemonConfig) {
    let config = stuck_config;
    let queue = Arc::new(DeviceQueue::new(5));
    let device = simulated(&config).with_stuck_bus();
    let stuck = queue.schedule(Operation::Read { address: SCRATCH_BASE_ADDR }, 0);
    let waiting: Vec<Ticket> = (0..3)
        .map(|i| queue.schedule(Operation::Read { address: SCRATCH_BASE_ADDR + 4 * i }, 2))
        .collect();

    let (mut worker, _) = spawn_worker(&config, Box::new(device), &queue);
    assert_that!(wait_for(Duration::from_secs(5), || queue.len() == 3), eq(true));
    worker.stop();

    let error = stuck.wait().expect_err("stuck read should time out");
    assert_that!(error.to_string().as_str(), contains_substring("AxiHandshakeTimeout"));
    for ticket in &waiting {
        assert_eq!(ticket.wait(), Err(TicketError::Shutdown));
    }
    let late = queue.schedule(Operation::ResetAxi, 0);
    assert_eq!(late.wait(), Err(TicketError::Shutdown));
}

#[gtest]
#[rstest]
fn frame_batches_back_up_behind_a_busy_device(stuck_config: DaemonConfig) {
    let mut config = stuck_config;
    // Keep the consumer blocked for the whole test.
    config.bridge.hardware_timeout_ms = 2000;
    let queue = Arc::new(DeviceQueue::new(5));
    let device = simulated(&config).with_stuck_bus();
    queue.schedule(Operation::Read { address: SCRATCH_BASE_ADDR }, 0);
    let (mut worker, _) = spawn_worker(&config, Box::new(device), &queue);
    assert_that!(wait_for(Duration::from_secs(5), || queue.is_empty()), eq(true));

    let batches: Vec<Ticket> = (0..8).map(|_| queue.schedule(frame_batch(), 1)).collect();
    let read = queue.schedule(Operation::Read { address: SCRATCH_BASE_ADDR }, 2);
    assert_that!(queue.count_of(OperationKind::SendFrameBatch), eq(5));
    for dropped in &batches[..3] {
        assert_eq!(dropped.try_outcome(), Some(Err(TicketError::Dropped { max: 5 })));
    }
    for queued in &batches[3..] {
        assert_that!(queued.is_done(), eq(false));
    }

    assert_that!(queue.cancel_all(OperationKind::SendFrameBatch), eq(5));
    for cancelled in &batches[3..] {
        assert_eq!(cancelled.try_outcome(), Some(Err(TicketError::Cancelled)));
    }
    assert_that!(queue.len(), eq(1));
    assert_that!(read.is_done(), eq(false));
    worker.stop();
    assert_eq!(read.wait(), Err(TicketError::Shutdown));
}

#[gtest]
fn unknown_response_is_a_fatal_ticket_error() {
    let config = test_config();
    let queue = Arc::new(DeviceQueue::new(5));
    let device = simulated(&config).with_forced_response(0b001);
    let (mut worker, _) = spawn_worker(&config, Box::new(device), &queue);

    let error = queue
        .schedule(Operation::Read { address: SCRATCH_BASE_ADDR }, 2)
        .wait()
        .expect_err("an unknown response code should fail the read");
    assert_that!(error.is_fatal(), eq(true));
    assert_that!(error.to_string().as_str(), contains_substring("AxiUnknownResponse"));
    assert_that!(worker.is_running(), eq(true));
    worker.stop();
}

#[gtest]
fn panicking_operation_resolves_its_ticket_and_consumer_survives() {
    let config = test_config();
    let faulty = SCRATCH_BASE_ADDR + 0x80;
    let queue = Arc::new(DeviceQueue::new(5));
    let device = RecordingDevice::new(&config.bridge).with_panic_on(faulty);
    let (mut worker, stats) = spawn_worker(&config, Box::new(device), &queue);

    let panicked = queue.schedule(Operation::Read { address: faulty }, 2);
    let next = queue.schedule(Operation::Read { address: SCRATCH_BASE_ADDR }, 2);

    let error = panicked.wait().expect_err("the panicking read should fail");
    assert_that!(error.is_fatal(), eq(true));
    assert_that!(error.to_string().as_str(), contains_substring("driver fault"));
    assert_eq!(next.wait(), Ok(Some(0)));
    assert_that!(worker.is_running(), eq(true));
    assert_that!(stats.totals()[&OperationKind::Read].count, eq(2));
    worker.stop();
}

fn producer_address(producer: u32, index: u32) -> u32 {
    SCRATCH_BASE_ADDR + producer * 0x100 + index * 4
}

#[gtest]
fn concurrent_producers_are_serialized_through_one_consumer() {
    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 10;
    const MAX_BATCHES: usize = 3;

    let config = test_config();
    let device = RecordingDevice::new(&config.bridge);
    let log = device.log.clone();
    let queue = Arc::new(DeviceQueue::new(MAX_BATCHES));
    let (mut worker, stats) = spawn_worker(&config, Box::new(device), &queue);

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut reads = Vec::new();
                let mut batches = Vec::new();
                let mut most_batches_seen = 0;
                for index in 0..PER_PRODUCER {
                    batches.push(queue.schedule(frame_batch(), 1));
                    let address = producer_address(producer, index);
                    reads.push(queue.schedule(Operation::Read { address }, 2));
                    most_batches_seen =
                        most_batches_seen.max(queue.count_of(OperationKind::SendFrameBatch));
                    if producer == 0 && index == PER_PRODUCER / 2 {
                        queue.cancel_all(OperationKind::SendFrameBatch);
                    }
                }
                (reads, batches, most_batches_seen)
            })
        })
        .collect();

    let (mut executed, mut dropped, mut cancelled, mut reads_done) = (0u64, 0u64, 0u64, 0u64);
    let mut most_batches_seen = 0;
    for producer in producers {
        let (reads, batches, seen) = producer.join().expect("producer thread panicked");
        most_batches_seen = most_batches_seen.max(seen);
        for read in &reads {
            assert_eq!(read.wait(), Ok(Some(0)));
            reads_done += 1;
        }
        for batch in &batches {
            match batch.wait() {
                Ok(None) => executed += 1,
                Err(TicketError::Dropped { max }) => {
                    assert_that!(max, eq(MAX_BATCHES));
                    dropped += 1;
                }
                Err(TicketError::Cancelled) => cancelled += 1,
                other => panic!("unexpected frame batch outcome: {other:?}"),
            }
        }
    }
    worker.stop();

    assert_that!(most_batches_seen <= MAX_BATCHES, eq(true));
    assert_that!(
        executed + dropped + cancelled,
        eq(u64::from(PRODUCERS * PER_PRODUCER))
    );
    assert_that!(dropped, eq(queue.dropped_count()));
    let totals = stats.totals();
    let executed_batches = totals
        .get(&OperationKind::SendFrameBatch)
        .map_or(0, |kind| kind.count);
    assert_that!(executed_batches, eq(executed));
    assert_that!(totals[&OperationKind::Read].count, eq(reads_done));

    let log = log.lock().unwrap();
    assert_that!(log.len() as u64, eq(reads_done));
    for producer in 0..PRODUCERS {
        let issued: Vec<u32> = log
            .iter()
            .copied()
            .filter(|address| (address - SCRATCH_BASE_ADDR) / 0x100 == producer)
            .collect();
        let expected: Vec<u32> = (0..PER_PRODUCER)
            .map(|index| producer_address(producer, index))
            .collect();
        assert_eq!(issued, expected);
    }
}
