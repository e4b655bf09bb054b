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

pub mod control_interface;
pub mod status_interface;

use crate::commands::DeviceCommands;
use crate::error::FpqdError;
use crate::operations::OperationKind;
use crate::scheduler::DeviceQueue;
use crate::stats::KindStats;
use crate::system_vars::SystemSnapshot;
use std::collections::BTreeMap;
use std::fmt::Write;
use zbus::fdo;

pub static SERVICE_NAME: &str = "org.fpqd";
pub static STATUS_OBJECT_PATH: &str = "/org/fpqd/status";
pub static CONTROL_OBJECT_PATH: &str = "/org/fpqd/control";

/// Run a blocking command handler off the async executor.
pub(crate) async fn run_blocking<T, F>(commands: &DeviceCommands, f: F) -> Result<T, fdo::Error>
where
    F: FnOnce(DeviceCommands) -> Result<T, FpqdError> + Send + 'static,
    T: Send + 'static,
{
    let commands = commands.clone();
    let result = tokio::task::spawn_blocking(move || f(commands))
        .await
        .map_err(|e| FpqdError::Internal(format!("command task failed: {e}")))?;
    Ok(result?)
}

/// One line per operation kind that has run at least once.
pub fn format_ticket_stats(totals: &BTreeMap<OperationKind, KindStats>, frames_sent: u64) -> String {
    let mut out = String::new();
    for (kind, stats) in totals {
        let _ = writeln!(
            out,
            "{kind}: count={} total_ms={:.3} avg_ms={:.3}",
            stats.count,
            stats.duration.as_secs_f64() * 1000.0,
            stats.average().as_secs_f64() * 1000.0
        );
    }
    let _ = writeln!(out, "frames_sent: {frames_sent}");
    out
}

pub fn format_queue_depth(queue: &DeviceQueue) -> String {
    let mut out = format!("queued: {}\n", queue.len());
    for kind in OperationKind::ALL {
        let count = queue.count_of(kind);
        if count > 0 {
            let _ = writeln!(out, "{kind}: {count}");
        }
    }
    let _ = writeln!(
        out,
        "dropped_frame_batches: {} (max outstanding {})",
        queue.dropped_count(),
        queue.max_outstanding_frame_batches()
    );
    out
}

pub fn format_system_variables(vars: &SystemSnapshot, streaming: bool) -> String {
    format!(
        "batch_size: {}\nfps: {}\nmatrix_size: {}\nscreen: {}x{}\nstreaming: {}\n",
        vars.batch_size,
        vars.fps,
        vars.matrix_size,
        vars.screen_width,
        vars.screen_height,
        if streaming { "on" } else { "off" }
    )
}

#[cfg(test)]
mod test_formatting {
    use super::*;
    use crate::operations::Operation;
    use googletest::prelude::*;
    use std::time::Duration;

    #[gtest]
    fn test_ticket_stats_lines() {
        let mut totals = BTreeMap::new();
        totals.insert(
            OperationKind::Read,
            KindStats {
                count: 4,
                duration: Duration::from_millis(8),
            },
        );
        let text = format_ticket_stats(&totals, 10);
        expect_that!(text.as_str(), contains_substring("read: count=4 total_ms=8.000 avg_ms=2.000"));
        expect_that!(text.as_str(), contains_substring("frames_sent: 10"));
    }

    #[gtest]
    fn test_queue_depth_lists_queued_kinds() {
        let queue = DeviceQueue::new(3);
        queue.schedule(Operation::ResetAxi, 0);
        queue.schedule(Operation::Read { address: 0 }, 2);
        queue.schedule(Operation::Read { address: 4 }, 2);
        let text = format_queue_depth(&queue);
        expect_that!(text.as_str(), contains_substring("queued: 3"));
        expect_that!(text.as_str(), contains_substring("read: 2"));
        expect_that!(text.as_str(), contains_substring("reset_axi: 1"));
        expect_that!(text.as_str(), not(contains_substring("write")));
        expect_that!(text.as_str(), contains_substring("max outstanding 3"));
    }

    #[gtest]
    fn test_system_variables() {
        let snapshot = SystemSnapshot {
            batch_size: 5,
            fps: 60,
            matrix_size: 512,
            screen_width: 1920,
            screen_height: 1080,
        };
        let text = format_system_variables(&snapshot, false);
        expect_that!(text.as_str(), contains_substring("screen: 1920x1080"));
        expect_that!(text.as_str(), contains_substring("streaming: off"));
    }
}
