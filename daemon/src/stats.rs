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

//! Per-operation execution statistics and the thread that reports them.

use crate::error::FpqdError;
use crate::operations::OperationKind;
use log::{debug, error, info, trace};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Executions of one operation kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindStats {
    pub count: u64,
    pub duration: Duration,
}

impl KindStats {
    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.duration += elapsed;
    }

    pub fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.duration / count,
            Err(_) => Duration::from_secs_f64(self.duration.as_secs_f64() / self.count as f64),
        }
    }
}

#[derive(Default)]
struct Counters {
    interval: BTreeMap<OperationKind, KindStats>,
    totals: BTreeMap<OperationKind, KindStats>,
}

/// Counters written by the device consumer and read by the reporter and status queries.
#[derive(Default)]
pub struct TicketStats {
    counters: Mutex<Counters>,
    frames_sent: AtomicU64,
}

impl TicketStats {
    pub fn new() -> TicketStats {
        TicketStats::default()
    }

    /// Account one executed ticket.
    pub fn record(&self, kind: OperationKind, elapsed: Duration) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.interval.entry(kind).or_default().add(elapsed);
        counters.totals.entry(kind).or_default().add(elapsed);
    }

    pub fn add_frames(&self, frames: u64) {
        self.frames_sent.fetch_add(frames, Ordering::Relaxed);
    }

    /// Frames handed to the device since start-up.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Return the counters collected since the previous call and start a new interval.
    pub fn take_interval(&self) -> BTreeMap<OperationKind, KindStats> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut counters.interval)
    }

    /// Counters since start-up.
    pub fn totals(&self) -> BTreeMap<OperationKind, KindStats> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .totals
            .clone()
    }
}

/// Background thread logging [`TicketStats`] at a fixed interval.
pub struct StatsReporter {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    /// Start reporting. Per-kind counters are logged and reset every `interval`; the rate at
    /// which the device drains frames is logged every `status_interval`.
    pub fn spawn(
        stats: Arc<TicketStats>,
        interval: Duration,
        status_interval: Duration,
    ) -> Result<StatsReporter, FpqdError> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("fpqd-stats".into())
            .spawn(move || {
                let mut last_status = Instant::now();
                let mut last_frames = stats.frames_sent();
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    for (kind, kind_stats) in stats.take_interval() {
                        debug!(
                            "{kind}: {} tickets, {:?} total, {:?} average",
                            kind_stats.count,
                            kind_stats.duration,
                            kind_stats.average()
                        );
                    }
                    let elapsed = last_status.elapsed();
                    if elapsed >= status_interval {
                        let frames = stats.frames_sent();
                        let rate = (frames - last_frames) as f64 / elapsed.as_secs_f64();
                        info!("Device pulling frames out of queue at {rate:.1} FPS");
                        last_frames = frames;
                        last_status = Instant::now();
                    }
                }
                trace!("stats reporter exiting");
            })
            .map_err(|e| FpqdError::Internal(format!("failed to spawn stats thread: {e}")))?;
        Ok(StatsReporter {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("stats reporter thread panicked");
            }
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
