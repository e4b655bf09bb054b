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

//! Simulated gateware backend.
//!
//! [`SimulatedDevice`] models the FrontPanel endpoints of the DisplayPort design closely
//! enough to exercise every code path of the daemon without hardware:
//!
//! - an AXI-Lite bridge controller behind the configured wire-in/wire-out/trigger-in
//!   endpoints, answering from an in-memory register file with decode windows for the video
//!   mixer and the DisplayPort receiver
//! - the frame batch path (trigger `0x40`, block pipe `0x80`, status wire-out `0x30`) which
//!   checks the received byte count against the frame geometry programmed into wire-ins
//!   `0x11` and `0x12`
//! - the AXI system reset on wire-in `0x00`
//!
//! Fault injection helpers let tests make the bridge stall, time out or return an unknown
//! response code.

use crate::axil_bridge::{BridgeConfig, MAX_TRIGGER_BIT};
use crate::config;
use crate::devices::device::{
    DeviceInfo, FrontPanel, PIPE_IN_RANGE, TRIGGER_IN_RANGE, WIRE_IN_RANGE, WIRE_OUT_RANGE,
    check_endpoint,
};
use crate::error::FpqdError;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

const RESPONSE_OKAY: u32 = 0b000;
const RESPONSE_SLVERR: u32 = 0b010;
const RESPONSE_DECERR: u32 = 0b011;
const RESPONSE_HARDWARE_TIMEOUT: u32 = 0b100;

const WINDOW_SIZE: u32 = 0x1_0000;
/// Scratch GPIO block, freely writable.
pub const SCRATCH_BASE_ADDR: u32 = 0x4000_0000;

/// Register contents of a 1080p60 DisplayPort feed.
const DEFAULT_REGISTERS: [(u32, u32); 7] = [
    (config::V_MIX_BASE_ADDR + config::V_MIX_WIDTH_REG, 1920),
    (config::V_MIX_BASE_ADDR + config::V_MIX_HEIGHT_REG, 1080),
    (config::DP_RX_BASE_ADDR + config::DP_RX_LINK_BW_SET_REG, 0x14),
    (config::DP_RX_BASE_ADDR + config::DP_RX_MSA_MVID_REG, 11_000),
    (config::DP_RX_BASE_ADDR + config::DP_RX_MSA_NVID_REG, 40_000),
    (config::DP_RX_BASE_ADDR + config::DP_RX_MSA_HTOTAL_REG, 2200),
    (config::DP_RX_BASE_ADDR + config::DP_RX_MSA_VTOTAL_REG, 1125),
];

#[derive(Debug)]
struct PendingTransaction {
    response: u32,
    data: u32,
    polls_left: u32,
}

#[derive(Debug, Default)]
struct FrameEngine {
    armed: bool,
    received: Option<usize>,
    batches_accepted: u64,
}

/// In-memory model of the DisplayPort gateware.
#[derive(Debug)]
pub struct SimulatedDevice {
    bridge: BridgeConfig,
    staged_wire_ins: [u32; 32],
    wire_ins: [u32; 32],
    wire_outs: [u32; 32],
    registers: HashMap<u32, u32>,
    windows: Vec<u32>,
    read_only: HashSet<u32>,
    unresponsive: HashSet<u32>,
    pending: Option<PendingTransaction>,
    last_response: u32,
    last_data: u32,
    busy_polls: u32,
    stuck: bool,
    forced_response: Option<u32>,
    frames: FrameEngine,
    front_panel_enabled: bool,
}

impl SimulatedDevice {
    pub const BACKEND_NAME: &'static str = "simulated";

    /// Create a device whose bridge controller listens on the endpoints in `bridge`.
    pub fn new(bridge: &BridgeConfig) -> SimulatedDevice {
        let read_only = [
            config::DP_RX_LINK_BW_SET_REG,
            config::DP_RX_MSA_MVID_REG,
            config::DP_RX_MSA_NVID_REG,
            config::DP_RX_MSA_HTOTAL_REG,
            config::DP_RX_MSA_VTOTAL_REG,
        ]
        .iter()
        .map(|reg| config::DP_RX_BASE_ADDR + reg)
        .collect();
        SimulatedDevice {
            bridge: bridge.clone(),
            staged_wire_ins: [0; 32],
            wire_ins: [0; 32],
            wire_outs: [0; 32],
            registers: DEFAULT_REGISTERS.into_iter().collect(),
            windows: vec![config::V_MIX_BASE_ADDR, config::DP_RX_BASE_ADDR, SCRATCH_BASE_ADDR],
            read_only,
            unresponsive: HashSet::new(),
            pending: None,
            last_response: RESPONSE_OKAY,
            last_data: 0,
            busy_polls: 1,
            stuck: false,
            forced_response: None,
            frames: FrameEngine::default(),
            front_panel_enabled: true,
        }
    }

    /// Preload an AXI register. The address must sit inside a decode window to be reachable.
    pub fn with_register(mut self, address: u32, value: u32) -> SimulatedDevice {
        self.registers.insert(address, value);
        self
    }

    /// Number of status polls the bridge stays busy for after each trigger.
    pub fn with_busy_polls(mut self, polls: u32) -> SimulatedDevice {
        self.busy_polls = polls;
        self
    }

    /// Leave the busy bit set until the AXI system is reset.
    pub fn with_stuck_bus(mut self) -> SimulatedDevice {
        self.stuck = true;
        self
    }

    /// Answer every bridge transaction with the raw 3-bit `response` code.
    pub fn with_forced_response(mut self, response: u32) -> SimulatedDevice {
        self.forced_response = Some(response & 0b111);
        self
    }

    /// Make the slave at `address` never answer, so the gateware reports a hardware timeout.
    pub fn with_unresponsive(mut self, address: u32) -> SimulatedDevice {
        self.unresponsive.insert(address);
        self
    }

    /// Report the FrontPanel interface as unavailable.
    pub fn without_front_panel(mut self) -> SimulatedDevice {
        self.front_panel_enabled = false;
        self
    }

    /// Frame batches accepted by the frame path so far.
    pub fn batches_accepted(&self) -> u64 {
        self.frames.batches_accepted
    }

    /// Current content of an AXI register, if it has ever been written or preloaded.
    pub fn register(&self, address: u32) -> Option<u32> {
        self.registers.get(&address).copied()
    }

    fn decoded(&self, address: u32) -> bool {
        self.windows
            .iter()
            .any(|base| address >= *base && address - base < WINDOW_SIZE)
    }

    /// Committed value of a wire-in; endpoints outside the wire-in range read as 0.
    fn wire_in(&self, endpoint: u8) -> u32 {
        self.wire_ins.get(usize::from(endpoint)).copied().unwrap_or(0)
    }

    fn start_transaction(&mut self, write: bool) {
        let address = self.wire_in(self.bridge.wire_in_addresses.address);
        let data = self.wire_in(self.bridge.wire_in_addresses.data);
        let (response, data) = if let Some(forced) = self.forced_response {
            (forced, 0)
        } else if self.unresponsive.contains(&address) {
            (RESPONSE_HARDWARE_TIMEOUT, 0)
        } else if !self.decoded(address) {
            (RESPONSE_DECERR, 0)
        } else if write {
            if self.read_only.contains(&address) {
                (RESPONSE_SLVERR, 0)
            } else {
                self.registers.insert(address, data);
                (RESPONSE_OKAY, 0)
            }
        } else {
            (
                RESPONSE_OKAY,
                self.registers.get(&address).copied().unwrap_or(0),
            )
        };
        debug!(
            "simulated AXI {} at 0x{address:08X} -> response 0b{response:03b}",
            if write { "write" } else { "read" }
        );
        self.pending = Some(PendingTransaction {
            response,
            data,
            polls_left: self.busy_polls,
        });
    }

    fn bridge_status(&mut self) -> u32 {
        if self.stuck {
            return 1;
        }
        match self.pending.as_mut() {
            Some(pending) if pending.polls_left > 0 => {
                pending.polls_left -= 1;
                1
            }
            Some(_) => {
                if let Some(done) = self.pending.take() {
                    self.last_response = done.response;
                    self.last_data = done.data;
                }
                self.last_response << 1
            }
            None => self.last_response << 1,
        }
    }

    fn expected_batch_bytes(&self) -> usize {
        let transfers_in_frame = self.wire_ins[config::TRANSFERS_IN_FRAME_WIRE_IN as usize] as usize;
        let batch_size = self.wire_ins[config::BATCH_SIZE_WIRE_IN as usize] as usize;
        transfers_in_frame * 6 * batch_size
    }

    fn frame_status(&self) -> u32 {
        match self.frames.received {
            None => 0,
            Some(len) => {
                let expected = self.expected_batch_bytes();
                let failed = len == 0 || (expected != 0 && len != expected);
                1 | (u32::from(failed) << 1)
            }
        }
    }
}

/// Position of a wire-out endpoint in the latched wire-out block.
fn wire_out_index(endpoint: u8) -> Result<usize, FpqdError> {
    check_endpoint(endpoint, &WIRE_OUT_RANGE, "wire-out")?;
    Ok(usize::from(endpoint - WIRE_OUT_RANGE.start()))
}

impl FrontPanel for SimulatedDevice {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            product_name: "XEM8320-AU25P (simulated)".to_string(),
            serial_number: "SIM0000001".to_string(),
            device_id: "fpqd-sim".to_string(),
            firmware_major: 1,
            firmware_minor: 0,
        }
    }

    fn is_front_panel_enabled(&self) -> bool {
        self.front_panel_enabled
    }

    fn set_wire_in_value(&mut self, endpoint: u8, value: u32) -> Result<(), FpqdError> {
        check_endpoint(endpoint, &WIRE_IN_RANGE, "wire-in")?;
        trace!("wire-in 0x{endpoint:02X} <- 0x{value:08X}");
        self.staged_wire_ins[endpoint as usize] = value;
        Ok(())
    }

    fn update_wire_ins(&mut self) -> Result<(), FpqdError> {
        let reset_was_asserted = self.wire_ins[config::AXI_RESET_WIRE_IN as usize] & 1 == 1;
        self.wire_ins = self.staged_wire_ins;
        let reset_asserted = self.wire_ins[config::AXI_RESET_WIRE_IN as usize] & 1 == 1;
        if reset_was_asserted && !reset_asserted {
            debug!("simulated AXI system reset released");
            self.stuck = false;
            self.pending = None;
            self.last_response = RESPONSE_OKAY;
        }
        Ok(())
    }

    fn update_wire_outs(&mut self) -> Result<(), FpqdError> {
        let status_index = wire_out_index(self.bridge.wire_out_addresses.status)?;
        let data_index = wire_out_index(self.bridge.wire_out_addresses.data)?;
        let frame_index = wire_out_index(config::FRAME_STATUS_WIRE_OUT)?;
        let status = self.bridge_status();
        self.wire_outs[status_index] = status;
        self.wire_outs[data_index] = self.last_data;
        self.wire_outs[frame_index] = self.frame_status();
        Ok(())
    }

    fn get_wire_out_value(&self, endpoint: u8) -> Result<u32, FpqdError> {
        Ok(self.wire_outs[wire_out_index(endpoint)?])
    }

    fn activate_trigger_in(&mut self, endpoint: u8, bit: u8) -> Result<(), FpqdError> {
        check_endpoint(endpoint, &TRIGGER_IN_RANGE, "trigger-in")?;
        if bit > MAX_TRIGGER_BIT {
            return Err(FpqdError::Transport {
                endpoint,
                message: format!("trigger bit {bit} out of range"),
            });
        }
        trace!("trigger-in 0x{endpoint:02X} bit {bit}");
        let trigger = &self.bridge.trigger_in_address_and_offsets;
        if endpoint == trigger.address && bit == trigger.read_bit_offset {
            self.start_transaction(false);
        } else if endpoint == trigger.address && bit == trigger.write_bit_offset {
            self.start_transaction(true);
        } else if endpoint == config::FRAME_BATCH_TRIGGER_IN && bit == 0 {
            self.frames.armed = true;
            self.frames.received = None;
        } else if endpoint == config::BATCH_SIZE_TRIGGER_IN && bit == 0 {
            debug!(
                "simulated batch size latched: {}",
                self.wire_ins[config::BATCH_SIZE_WIRE_IN as usize]
            );
            self.frames = FrameEngine {
                batches_accepted: self.frames.batches_accepted,
                ..FrameEngine::default()
            };
        }
        Ok(())
    }

    fn write_to_pipe_in(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, FpqdError> {
        check_endpoint(endpoint, &PIPE_IN_RANGE, "pipe-in")?;
        trace!("pipe-in 0x{endpoint:02X} <- {} bytes", data.len());
        Ok(data.len())
    }

    fn write_to_block_pipe_in(
        &mut self,
        endpoint: u8,
        block_size: usize,
        data: &[u8],
    ) -> Result<usize, FpqdError> {
        check_endpoint(endpoint, &PIPE_IN_RANGE, "pipe-in")?;
        if block_size == 0 || block_size % 16 != 0 {
            return Err(FpqdError::Transport {
                endpoint,
                message: format!("block size {block_size} is not a non-zero multiple of 16"),
            });
        }
        trace!(
            "block pipe-in 0x{endpoint:02X} <- {} bytes in blocks of {block_size}",
            data.len()
        );
        if endpoint == config::FRAME_BLOCK_PIPE_IN && self.frames.armed {
            self.frames.armed = false;
            self.frames.received = Some(data.len());
            if self.frame_status() & 0b10 == 0 {
                self.frames.batches_accepted += 1;
            }
        }
        Ok(data.len())
    }
}
