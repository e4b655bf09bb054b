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

//! AXI-Lite master access over FrontPanel endpoints.
//!
//! The gateware exposes an AXI-Lite bridge controller through three wire-ins (address, data
//! and timeout), two wire-outs (read data and status) and one trigger-in carrying a read and a
//! write bit. A transaction loads the wire-ins, pulses the trigger, then polls the status
//! wire-out until its busy bit (bit 0) clears. Bits 3:1 of the status then carry the AXI
//! response code:
//!
//! | bits  | meaning                                       |
//! |-------|-----------------------------------------------|
//! | `000` | OKAY                                          |
//! | `010` | SLVERR, returned to the caller                 |
//! | `011` | DECERR, returned to the caller                 |
//! | `100` | gateware hardware timeout, needs an AXI reset  |
//! | other | unknown, treated like a hardware fault         |

use crate::config::DEFAULT_HARDWARE_TIMEOUT_MS;
use crate::devices::device::{
    FrontPanel, TRIGGER_IN_RANGE, WIRE_IN_RANGE, WIRE_OUT_RANGE, check_endpoint,
};
use crate::error::FpqdError;
use log::{debug, trace, warn};
use std::fmt;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Period of the FrontPanel interface clock in picoseconds (9.920 ns).
const FRONT_PANEL_CLOCK_PERIOD_PS: u64 = 9_920;
/// Extra time the gateware needs to hand a timed-out transaction back.
pub const HANDSHAKE_DELAY_MS: u64 = 1000;
/// Delay between two reads of the status wire-out.
pub const STATUS_CHECK_INTERVAL: Duration = Duration::from_millis(10);
/// Highest bit of a trigger-in endpoint.
pub const MAX_TRIGGER_BIT: u8 = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireInAddresses {
    pub address: u8,
    pub data: u8,
    pub timeout: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireOutAddresses {
    pub data: u8,
    pub status: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerInAddressAndOffsets {
    pub address: u8,
    pub write_bit_offset: u8,
    pub read_bit_offset: u8,
}

/// Endpoint map and timeout of the bridge controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    pub wire_in_addresses: WireInAddresses,
    pub wire_out_addresses: WireOutAddresses,
    pub trigger_in_address_and_offsets: TriggerInAddressAndOffsets,
    /// Gateware-side slave timeout. `0` disables both the gateware and the host timeout.
    pub hardware_timeout_ms: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            wire_in_addresses: WireInAddresses {
                address: 0x1d,
                data: 0x1e,
                timeout: 0x1f,
            },
            wire_out_addresses: WireOutAddresses {
                data: 0x3e,
                status: 0x3f,
            },
            trigger_in_address_and_offsets: TriggerInAddressAndOffsets {
                address: 0x5f,
                write_bit_offset: 0,
                read_bit_offset: 1,
            },
            hardware_timeout_ms: DEFAULT_HARDWARE_TIMEOUT_MS,
        }
    }
}

impl BridgeConfig {
    /// Check that every endpoint lies in the range of its kind and that the read and write
    /// triggers are distinct bits of a 32-bit trigger endpoint.
    pub fn validate(&self) -> Result<(), FpqdError> {
        let wire_ins = self.wire_in_addresses;
        let wire_outs = self.wire_out_addresses;
        let trigger = self.trigger_in_address_and_offsets;
        let endpoints = [
            (wire_ins.address, &WIRE_IN_RANGE, "wire-in"),
            (wire_ins.data, &WIRE_IN_RANGE, "wire-in"),
            (wire_ins.timeout, &WIRE_IN_RANGE, "wire-in"),
            (wire_outs.data, &WIRE_OUT_RANGE, "wire-out"),
            (wire_outs.status, &WIRE_OUT_RANGE, "wire-out"),
            (trigger.address, &TRIGGER_IN_RANGE, "trigger-in"),
        ];
        for (endpoint, range, kind) in endpoints {
            check_endpoint(endpoint, range, kind)
                .map_err(|e| FpqdError::Argument(format!("bridge endpoint: {e}")))?;
        }
        for bit in [trigger.write_bit_offset, trigger.read_bit_offset] {
            if bit > MAX_TRIGGER_BIT {
                return Err(FpqdError::Argument(format!(
                    "bridge trigger bit offset {bit} is above {MAX_TRIGGER_BIT}"
                )));
            }
        }
        if trigger.write_bit_offset == trigger.read_bit_offset {
            return Err(FpqdError::Argument(format!(
                "bridge read and write triggers share bit {}",
                trigger.read_bit_offset
            )));
        }
        Ok(())
    }
}

/// Non-fatal AXI responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxiResponse {
    Okay,
    SlaveError,
    DecodeError,
}

impl AxiResponse {
    pub fn is_okay(&self) -> bool {
        *self == AxiResponse::Okay
    }
}

impl fmt::Display for AxiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxiResponse::Okay => write!(f, "OKAY"),
            AxiResponse::SlaveError => write!(f, "SLVERR"),
            AxiResponse::DecodeError => write!(f, "DECERR"),
        }
    }
}

/// Outcome of a read transaction. `data` is only present on [`AxiResponse::Okay`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxiRead {
    pub response: AxiResponse,
    pub data: Option<u32>,
}

/// Decode the response bits of a bridge status word.
///
/// # Returns: `Result<AxiResponse, FpqdError>`
/// * `Ok(AxiResponse)` - OKAY, SLVERR or DECERR
/// * `Err(FpqdError::AxiHardwareTimeout)` - The slave never answered
/// * `Err(FpqdError::AxiUnknownResponse)` - Any other code
pub fn decode_status(status: u32) -> Result<AxiResponse, FpqdError> {
    match (status >> 1) & 0b111 {
        0b000 => Ok(AxiResponse::Okay),
        0b010 => Ok(AxiResponse::SlaveError),
        0b011 => Ok(AxiResponse::DecodeError),
        0b100 => Err(FpqdError::AxiHardwareTimeout),
        other => Err(FpqdError::AxiUnknownResponse(other)),
    }
}

/// Number of FrontPanel clock periods in `timeout_ms`, saturating at the width of a wire-in.
pub fn timeout_in_clock_periods(timeout_ms: u32) -> u32 {
    let periods = u64::from(timeout_ms) * 1_000_000_000 / FRONT_PANEL_CLOCK_PERIOD_PS;
    u32::try_from(periods).unwrap_or(u32::MAX)
}

/// AXI-Lite master driving the bridge controller of a FrontPanel device.
///
/// The bridge owns the device handle; whoever owns the bridge is the only code allowed to
/// talk to the hardware.
pub struct AxiLiteBridge<D: FrontPanel> {
    device: D,
    config: BridgeConfig,
}

impl<D: FrontPanel> AxiLiteBridge<D> {
    /// Wrap `device` and program the gateware slave timeout.
    pub fn new(mut device: D, config: BridgeConfig) -> Result<AxiLiteBridge<D>, FpqdError> {
        config.validate()?;
        let periods = timeout_in_clock_periods(config.hardware_timeout_ms);
        debug!(
            "AXI-Lite bridge timeout set to {} ms ({periods} clock periods)",
            config.hardware_timeout_ms
        );
        device.set_wire_in_value(config.wire_in_addresses.timeout, periods)?;
        device.update_wire_ins()?;
        Ok(AxiLiteBridge { device, config })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Direct access to the device for the non-bridge endpoints.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Read a 32-bit word from `address`.
    ///
    /// # Returns: `Result<AxiRead, FpqdError>`
    /// * `Ok(AxiRead)` - The transaction completed; `data` is set on OKAY only
    /// * `Err(FpqdError)` - Transport failure or a fatal gateware condition, see
    ///   [`FpqdError::is_fatal`]
    pub fn read(&mut self, address: u32) -> Result<AxiRead, FpqdError> {
        trace!("AXI read 0x{address:08X}");
        self.device
            .set_wire_in_value(self.config.wire_in_addresses.address, address)?;
        self.device.update_wire_ins()?;
        let trigger = self.config.trigger_in_address_and_offsets;
        self.device
            .activate_trigger_in(trigger.address, trigger.read_bit_offset)?;
        let response = self.wait_for_response()?;
        let data = if response.is_okay() {
            Some(
                self.device
                    .get_wire_out_value(self.config.wire_out_addresses.data)?,
            )
        } else {
            None
        };
        trace!("AXI read 0x{address:08X} -> {response} {data:?}");
        Ok(AxiRead { response, data })
    }

    /// Write the 32-bit word `data` to `address`.
    pub fn write(&mut self, address: u32, data: u32) -> Result<AxiResponse, FpqdError> {
        trace!("AXI write 0x{address:08X} <- 0x{data:08X}");
        self.device
            .set_wire_in_value(self.config.wire_in_addresses.address, address)?;
        self.device
            .set_wire_in_value(self.config.wire_in_addresses.data, data)?;
        self.device.update_wire_ins()?;
        let trigger = self.config.trigger_in_address_and_offsets;
        self.device
            .activate_trigger_in(trigger.address, trigger.write_bit_offset)?;
        let response = self.wait_for_response()?;
        trace!("AXI write 0x{address:08X} -> {response}");
        Ok(response)
    }

    fn wait_for_response(&mut self) -> Result<AxiResponse, FpqdError> {
        let limit = match self.config.hardware_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(u64::from(ms) + HANDSHAKE_DELAY_MS)),
        };
        let start = Instant::now();
        loop {
            self.device.update_wire_outs()?;
            let status = self
                .device
                .get_wire_out_value(self.config.wire_out_addresses.status)?;
            if status & 1 == 0 {
                return decode_status(status);
            }
            let elapsed = start.elapsed();
            if limit.is_some_and(|limit| elapsed > limit) {
                warn!("AXI bridge busy bit still set after {elapsed:?}");
                return Err(FpqdError::AxiHandshakeTimeout {
                    elapsed_ms: elapsed.as_millis(),
                });
            }
            sleep(STATUS_CHECK_INTERVAL);
        }
    }
}
