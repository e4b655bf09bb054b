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

//! Blocking command handlers.
//!
//! Each handler schedules one or more tickets and waits for them, so it must not run on the
//! device thread itself.

use crate::config::{
    self, AXI_READ_PRIORITY, AXI_WRITE_PRIORITY, RESET_AXI_PRIORITY,
    RETRIEVE_AND_SET_FPS_PRIORITY, SET_POSITION_PRIORITY, SETUP_RESOLUTION_PRIORITY,
    UPDATE_BATCH_SIZE_PRIORITY,
};
use crate::error::FpqdError;
use crate::operations::{Operation, OperationKind};
use crate::scheduler::DeviceQueue;
use crate::streamer::StreamSwitch;
use crate::system_vars::SystemVariables;
use log::{info, warn};
use std::sync::Arc;

/// Clamp a requested layer offset so a `matrix`-sized window stays within `screen`.
pub fn clamp_offset(offset: i64, screen: u32, matrix: u32) -> u32 {
    let max = i64::from(screen.saturating_sub(matrix));
    offset.clamp(0, max) as u32
}

/// Front door for interactive requests.
#[derive(Clone)]
pub struct DeviceCommands {
    queue: Arc<DeviceQueue>,
    vars: Arc<SystemVariables>,
    stream: StreamSwitch,
}

impl DeviceCommands {
    pub fn new(
        queue: Arc<DeviceQueue>,
        vars: Arc<SystemVariables>,
        stream: StreamSwitch,
    ) -> DeviceCommands {
        DeviceCommands {
            queue,
            vars,
            stream,
        }
    }

    fn run(&self, operation: Operation, priority: u8) -> Result<Option<u32>, FpqdError> {
        Ok(self.queue.schedule(operation, priority).wait()?)
    }

    fn run_read(&self, address: u32, priority: u8) -> Result<u32, FpqdError> {
        self.run(Operation::Read { address }, priority)?
            .ok_or_else(|| FpqdError::Internal(format!("read of 0x{address:08X} returned no data")))
    }

    /// Move the captured window horizontally. Returns the offset actually applied.
    pub fn set_x_position(&self, x: i64) -> Result<u32, FpqdError> {
        let (width, _) = self.vars.screen_size();
        let x = clamp_offset(x, width, self.vars.matrix_size());
        self.run(
            Operation::Write {
                address: config::V_MIX_BASE_ADDR + config::V_MIX_LAYER_START_X_REG,
                data: x,
            },
            SET_POSITION_PRIORITY,
        )?;
        info!("x offset set to {x}");
        Ok(x)
    }

    /// Move the captured window vertically. Returns the offset actually applied.
    pub fn set_y_position(&self, y: i64) -> Result<u32, FpqdError> {
        let (_, height) = self.vars.screen_size();
        let y = clamp_offset(y, height, self.vars.matrix_size());
        self.run(
            Operation::Write {
                address: config::V_MIX_BASE_ADDR + config::V_MIX_LAYER_START_Y_REG,
                data: y,
            },
            SET_POSITION_PRIORITY,
        )?;
        info!("y offset set to {y}");
        Ok(y)
    }

    pub fn axi_read(&self, address: u32) -> Result<u32, FpqdError> {
        self.run_read(address, AXI_READ_PRIORITY)
    }

    pub fn axi_write(&self, address: u32, data: u32) -> Result<(), FpqdError> {
        self.run(Operation::Write { address, data }, AXI_WRITE_PRIORITY)?;
        Ok(())
    }

    /// Measure the input frame rate now, updating the shared value.
    pub fn retrieve_fps(&self) -> Result<u32, FpqdError> {
        self.run(Operation::RetrieveAndSetFps, RETRIEVE_AND_SET_FPS_PRIORITY)?
            .ok_or_else(|| FpqdError::Internal("frame rate query returned no data".into()))
    }

    /// Change the number of frames per batch.
    ///
    /// Streaming is paused and queued frame batches are cancelled first so no batch of the old
    /// size reaches the gateware after the change. Streaming resumes only if the update
    /// succeeds.
    pub fn update_batch_size(&self, size: u32) -> Result<(), FpqdError> {
        if size == 0 {
            return Err(FpqdError::Argument(
                "batch size must be at least 1".into(),
            ));
        }
        self.stream.disable();
        let cancelled = self.queue.cancel_all(OperationKind::SendFrameBatch);
        info!("updating batch size to {size}, {cancelled} queued frame batches cancelled");
        if let Err(e) = self.run(Operation::UpdateBatchSize { size }, UPDATE_BATCH_SIZE_PRIORITY) {
            warn!("batch size update failed, streaming stays disabled: {e}");
            return Err(e);
        }
        self.vars.set_batch_size(size);
        self.stream.enable();
        info!("Set batch size to {size}");
        Ok(())
    }

    pub fn reset_axi(&self) -> Result<(), FpqdError> {
        self.run(Operation::ResetAxi, RESET_AXI_PRIORITY)?;
        Ok(())
    }

    /// Read the video mixer resolution and store it as the screen size.
    pub fn setup_resolution(&self) -> Result<(u32, u32), FpqdError> {
        let width = self.run_read(
            config::V_MIX_BASE_ADDR + config::V_MIX_WIDTH_REG,
            SETUP_RESOLUTION_PRIORITY,
        )?;
        let height = self.run_read(
            config::V_MIX_BASE_ADDR + config::V_MIX_HEIGHT_REG,
            SETUP_RESOLUTION_PRIORITY,
        )?;
        self.vars.set_screen_size(width, height);
        info!("Screen resolution is {width}x{height}");
        Ok((width, height))
    }

    pub fn enable_streaming(&self) {
        self.stream.enable();
    }

    pub fn disable_streaming(&self) {
        self.stream.disable();
    }

    pub fn streaming_enabled(&self) -> bool {
        self.stream.is_enabled()
    }

    pub fn vars(&self) -> &Arc<SystemVariables> {
        &self.vars
    }

    pub fn queue(&self) -> &Arc<DeviceQueue> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    #[rstest]
    #[case::negative(-10, 1920, 512, 0)]
    #[case::inside(100, 1920, 512, 100)]
    #[case::right_edge(1408, 1920, 512, 1408)]
    #[case::past_edge(5000, 1920, 512, 1408)]
    #[case::matrix_larger_than_screen(10, 256, 512, 0)]
    fn test_clamp_offset(
        #[case] offset: i64,
        #[case] screen: u32,
        #[case] matrix: u32,
        #[case] expected: u32,
    ) {
        assert_that!(clamp_offset(offset, screen, matrix), eq(expected));
    }
}
