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

//! The single consumer thread that owns the device.

use crate::error::FpqdError;
use crate::operations::DeviceContext;
use crate::scheduler::queue::DeviceQueue;
use crate::scheduler::ticket::TicketError;
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handle on the consumer thread. Stopping it (explicitly or on drop) closes the queue and
/// resolves whatever is still queued with a shutdown error.
pub struct DeviceWorker {
    queue: Arc<DeviceQueue>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceWorker {
    /// Move `context` onto a new thread that executes tickets from `queue` until stopped.
    ///
    /// `poll_interval` bounds how long the thread blocks on an empty queue before checking
    /// for a stop request.
    pub fn spawn(
        queue: Arc<DeviceQueue>,
        mut context: DeviceContext,
        poll_interval: Duration,
    ) -> Result<DeviceWorker, FpqdError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_queue = queue.clone();
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("fpqd-device".into())
            .spawn(move || {
                info!("Device thread started");
                while !thread_stop.load(Ordering::Acquire) {
                    let Some((ticket, operation)) = thread_queue.pop_timeout(poll_interval)
                    else {
                        continue;
                    };
                    let kind = operation.kind();
                    let start = Instant::now();
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        context.execute(operation)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(TicketError::Device {
                            message: format!("{kind} panicked: {}", panic_message(&*payload)),
                            fatal: true,
                        })
                    });
                    context.stats().record(kind, start.elapsed());
                    match &outcome {
                        Err(e) if e.is_fatal() => error!("ticket {} ({kind}) failed: {e}", ticket.id()),
                        Err(e) => warn!("ticket {} ({kind}) failed: {e}", ticket.id()),
                        Ok(_) => {}
                    }
                    ticket.complete(outcome);
                }
                info!("Device thread stopped");
            })
            .map_err(|e| FpqdError::Internal(format!("failed to spawn device thread: {e}")))?;
        Ok(DeviceWorker {
            queue,
            stop,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> &Arc<DeviceQueue> {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Finish the ticket in progress, then stop. Tickets left in the queue complete with a
    /// shutdown error; none of them is started once the queue is closed.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        self.queue.close();
        if handle.join().is_err() {
            error!("device thread panicked");
        }
        let drained = self.queue.drain();
        if drained > 0 {
            debug!("{drained} queued tickets resolved with a shutdown error");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl Drop for DeviceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
