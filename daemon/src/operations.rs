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

//! Device operations carried by tickets and their execution on the consumer thread.

use crate::axil_bridge::AxiLiteBridge;
use crate::config;
use crate::devices::device::FrontPanel;
use crate::error::FpqdError;
use crate::fps::StreamTiming;
use crate::scheduler::ticket::{TicketError, TicketOutcome};
use crate::stats::TicketStats;
use crate::system_vars::SystemVariables;
use log::{info, trace};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

const FRAME_STATUS_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Discriminant of an [`Operation`], used for accounting and bulk cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    SendFrameBatch,
    Read,
    Write,
    RetrieveAndSetFps,
    UpdateBatchSize,
    ResetAxi,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::SendFrameBatch,
        OperationKind::Read,
        OperationKind::Write,
        OperationKind::RetrieveAndSetFps,
        OperationKind::UpdateBatchSize,
        OperationKind::ResetAxi,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::SendFrameBatch => "send_frame_batch",
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::RetrieveAndSetFps => "retrieve_and_set_fps",
            OperationKind::UpdateBatchSize => "update_batch_size",
            OperationKind::ResetAxi => "reset_axi",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = FpqdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| FpqdError::Argument(format!("unknown operation kind {s:?}")))
    }
}

/// A unit of device work.
#[derive(Clone, PartialEq, Eq)]
pub enum Operation {
    /// Stream `frames` frames of packed pixel data to the gateware.
    SendFrameBatch { data: Vec<u8>, frames: u32 },
    Read { address: u32 },
    Write { address: u32, data: u32 },
    /// Measure the incoming DisplayPort frame rate and store it.
    RetrieveAndSetFps,
    UpdateBatchSize { size: u32 },
    /// Pulse the AXI system reset of the gateware.
    ResetAxi,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::SendFrameBatch { .. } => OperationKind::SendFrameBatch,
            Operation::Read { .. } => OperationKind::Read,
            Operation::Write { .. } => OperationKind::Write,
            Operation::RetrieveAndSetFps => OperationKind::RetrieveAndSetFps,
            Operation::UpdateBatchSize { .. } => OperationKind::UpdateBatchSize,
            Operation::ResetAxi => OperationKind::ResetAxi,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SendFrameBatch { data, frames } => f
                .debug_struct("SendFrameBatch")
                .field("bytes", &data.len())
                .field("frames", frames)
                .finish(),
            Operation::Read { address } => write!(f, "Read {{ address: 0x{address:08X} }}"),
            Operation::Write { address, data } => {
                write!(f, "Write {{ address: 0x{address:08X}, data: 0x{data:08X} }}")
            }
            Operation::RetrieveAndSetFps => write!(f, "RetrieveAndSetFps"),
            Operation::UpdateBatchSize { size } => write!(f, "UpdateBatchSize {{ size: {size} }}"),
            Operation::ResetAxi => write!(f, "ResetAxi"),
        }
    }
}

/// Everything the consumer thread needs to run operations. Owned by that thread alone.
pub struct DeviceContext {
    bridge: AxiLiteBridge<Box<dyn FrontPanel>>,
    vars: Arc<SystemVariables>,
    stats: Arc<TicketStats>,
    frame_batch_timeout: Duration,
}

impl DeviceContext {
    pub fn new(
        bridge: AxiLiteBridge<Box<dyn FrontPanel>>,
        vars: Arc<SystemVariables>,
        stats: Arc<TicketStats>,
        frame_batch_timeout: Duration,
    ) -> DeviceContext {
        DeviceContext {
            bridge,
            vars,
            stats,
            frame_batch_timeout,
        }
    }

    pub fn stats(&self) -> &Arc<TicketStats> {
        &self.stats
    }

    /// Run `operation` against the device.
    pub fn execute(&mut self, operation: Operation) -> TicketOutcome {
        trace!("executing {operation:?}");
        match operation {
            Operation::SendFrameBatch { data, frames } => {
                self.send_frame_batch(&data, frames)?;
                Ok(None)
            }
            Operation::Read { address } => self.read_register(address).map(Some),
            Operation::Write { address, data } => {
                let response = self.bridge.write(address, data)?;
                if !response.is_okay() {
                    return Err(TicketError::Bus { address, response });
                }
                Ok(None)
            }
            Operation::RetrieveAndSetFps => self.retrieve_and_set_fps().map(Some),
            Operation::UpdateBatchSize { size } => {
                let device = self.bridge.device_mut();
                device.set_wire_in_value(config::BATCH_SIZE_WIRE_IN, size)?;
                device.update_wire_ins()?;
                device.activate_trigger_in(config::BATCH_SIZE_TRIGGER_IN, 0)?;
                Ok(None)
            }
            Operation::ResetAxi => {
                let device = self.bridge.device_mut();
                device.set_wire_in_value(config::AXI_RESET_WIRE_IN, 1)?;
                device.update_wire_ins()?;
                device.set_wire_in_value(config::AXI_RESET_WIRE_IN, 0)?;
                device.update_wire_ins()?;
                info!("AXI system reset");
                Ok(None)
            }
        }
    }

    fn read_register(&mut self, address: u32) -> Result<u32, TicketError> {
        let read = self.bridge.read(address)?;
        read.data.ok_or(TicketError::Bus {
            address,
            response: read.response,
        })
    }

    fn send_frame_batch(&mut self, data: &[u8], frames: u32) -> Result<(), TicketError> {
        self.stats.add_frames(u64::from(frames));
        let device = self.bridge.device_mut();
        device.activate_trigger_in(config::FRAME_BATCH_TRIGGER_IN, 0)?;
        device.write_to_block_pipe_in(config::FRAME_BLOCK_PIPE_IN, config::FRAME_BLOCK_SIZE, data)?;

        let start = Instant::now();
        loop {
            device.update_wire_outs()?;
            let status = device.get_wire_out_value(config::FRAME_STATUS_WIRE_OUT)?;
            if status & 0b01 != 0 {
                if status & 0b10 != 0 {
                    return Err(TicketError::FrameBatchFailed);
                }
                return Ok(());
            }
            if start.elapsed() > self.frame_batch_timeout {
                return Err(TicketError::FrameBatchTimeout {
                    timeout_ms: self.frame_batch_timeout.as_millis(),
                });
            }
            sleep(FRAME_STATUS_CHECK_INTERVAL);
        }
    }

    fn retrieve_and_set_fps(&mut self) -> Result<u32, TicketError> {
        let base = config::DP_RX_BASE_ADDR;
        let timing = StreamTiming::from_registers(
            self.read_register(base + config::DP_RX_LINK_BW_SET_REG)?,
            self.read_register(base + config::DP_RX_MSA_MVID_REG)?,
            self.read_register(base + config::DP_RX_MSA_NVID_REG)?,
            self.read_register(base + config::DP_RX_MSA_HTOTAL_REG)?,
            self.read_register(base + config::DP_RX_MSA_VTOTAL_REG)?,
        );
        let fps = timing.frame_rate()?;
        if self.vars.fps() != fps {
            let previous = self.vars.set_fps(fps);
            info!("Hardware has undergone a change in FPS ({previous} -> {fps}). Setting FPS to: {fps}");
        }
        Ok(fps)
    }
}
