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

//! FrontPanel transport abstraction.
//!
//! The daemon never talks to a USB device directly. Everything goes through the
//! [`FrontPanel`] trait, which mirrors the handle-based endpoint model of the vendor SDK:
//!
//! - **wire-ins** (`0x00..=0x1F`) are staged with [`FrontPanel::set_wire_in_value`] and
//!   committed together by [`FrontPanel::update_wire_ins`]
//! - **wire-outs** (`0x20..=0x3F`) are latched by [`FrontPanel::update_wire_outs`] and then
//!   read with [`FrontPanel::get_wire_out_value`]
//! - **trigger-ins** (`0x40..=0x5F`) pulse one bit for a single clock cycle
//! - **pipe-ins** (`0x80..=0x9F`) move bulk data, optionally in fixed size blocks
//!
//! Backends are looked up by name in a [`BackendRegistry`]. The registry is an ordinary value
//! owned by whoever opens the device, so there is no process wide device state.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fpqd::config::DaemonConfig;
//! # use fpqd::devices::device::BackendRegistry;
//! # fn example() -> Result<(), fpqd::error::FpqdError> {
//! let registry = BackendRegistry::with_builtin();
//! let mut device = registry.open("simulated", &DaemonConfig::default())?;
//! device.set_wire_in_value(0x12, 5)?;
//! device.update_wire_ins()?;
//! # Ok(())
//! # }
//! ```

use crate::config::DaemonConfig;
use crate::devices::simulated::SimulatedDevice;
use crate::error::FpqdError;
use log::trace;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

pub const WIRE_IN_RANGE: RangeInclusive<u8> = 0x00..=0x1F;
pub const WIRE_OUT_RANGE: RangeInclusive<u8> = 0x20..=0x3F;
pub const TRIGGER_IN_RANGE: RangeInclusive<u8> = 0x40..=0x5F;
pub const PIPE_IN_RANGE: RangeInclusive<u8> = 0x80..=0x9F;

/// Identification data reported by an opened device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub product_name: String,
    pub serial_number: String,
    pub device_id: String,
    pub firmware_major: u32,
    pub firmware_minor: u32,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Product: {}\nFirmware version: {}.{}\nSerial Number: {}\nDevice ID: {}",
            self.product_name,
            self.firmware_major,
            self.firmware_minor,
            self.serial_number,
            self.device_id
        )
    }
}

/// Handle-based register model of a FrontPanel enabled device.
///
/// Implementations are moved into the device worker thread, which is the only code that ever
/// calls these methods once the daemon is running.
pub trait FrontPanel: Send {
    /// Get identification data for the opened device.
    fn device_info(&self) -> DeviceInfo;

    /// Whether the loaded gateware exposes the FrontPanel host interface.
    fn is_front_panel_enabled(&self) -> bool;

    /// Stage a value for a wire-in endpoint. Nothing reaches the device until
    /// [`FrontPanel::update_wire_ins`] is called.
    ///
    /// # Returns: `Result<(), FpqdError>`
    /// * `Ok(())` - Value staged
    /// * `Err(FpqdError::Transport)` - Endpoint outside the wire-in range
    fn set_wire_in_value(&mut self, endpoint: u8, value: u32) -> Result<(), FpqdError>;

    /// Commit all staged wire-in values to the device.
    fn update_wire_ins(&mut self) -> Result<(), FpqdError>;

    /// Latch the current wire-out values from the device.
    fn update_wire_outs(&mut self) -> Result<(), FpqdError>;

    /// Read a wire-out value as of the last [`FrontPanel::update_wire_outs`].
    ///
    /// # Returns: `Result<u32, FpqdError>`
    /// * `Ok(u32)` - Latched value
    /// * `Err(FpqdError::Transport)` - Endpoint outside the wire-out range
    fn get_wire_out_value(&self, endpoint: u8) -> Result<u32, FpqdError>;

    /// Pulse `bit` of a trigger-in endpoint for one clock cycle.
    fn activate_trigger_in(&mut self, endpoint: u8, bit: u8) -> Result<(), FpqdError>;

    /// Bulk transfer to a pipe-in endpoint. Returns the number of bytes written.
    fn write_to_pipe_in(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, FpqdError>;

    /// Block transfer to a pipe-in endpoint. `data` is sent in `block_size` byte blocks.
    /// Returns the number of bytes written.
    fn write_to_block_pipe_in(
        &mut self,
        endpoint: u8,
        block_size: usize,
        data: &[u8],
    ) -> Result<usize, FpqdError>;
}

impl<T: FrontPanel + ?Sized> FrontPanel for Box<T> {
    fn device_info(&self) -> DeviceInfo {
        (**self).device_info()
    }

    fn is_front_panel_enabled(&self) -> bool {
        (**self).is_front_panel_enabled()
    }

    fn set_wire_in_value(&mut self, endpoint: u8, value: u32) -> Result<(), FpqdError> {
        (**self).set_wire_in_value(endpoint, value)
    }

    fn update_wire_ins(&mut self) -> Result<(), FpqdError> {
        (**self).update_wire_ins()
    }

    fn update_wire_outs(&mut self) -> Result<(), FpqdError> {
        (**self).update_wire_outs()
    }

    fn get_wire_out_value(&self, endpoint: u8) -> Result<u32, FpqdError> {
        (**self).get_wire_out_value(endpoint)
    }

    fn activate_trigger_in(&mut self, endpoint: u8, bit: u8) -> Result<(), FpqdError> {
        (**self).activate_trigger_in(endpoint, bit)
    }

    fn write_to_pipe_in(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, FpqdError> {
        (**self).write_to_pipe_in(endpoint, data)
    }

    fn write_to_block_pipe_in(
        &mut self,
        endpoint: u8,
        block_size: usize,
        data: &[u8],
    ) -> Result<usize, FpqdError> {
        (**self).write_to_block_pipe_in(endpoint, block_size, data)
    }
}

/// Check that `endpoint` falls inside `range`, naming `kind` in the error.
pub fn check_endpoint(
    endpoint: u8,
    range: &RangeInclusive<u8>,
    kind: &str,
) -> Result<(), FpqdError> {
    if range.contains(&endpoint) {
        Ok(())
    } else {
        Err(FpqdError::Transport {
            endpoint,
            message: format!(
                "not a {kind} endpoint (expected 0x{:02X}..=0x{:02X})",
                range.start(),
                range.end()
            ),
        })
    }
}

/// Type alias for backend constructor functions.
pub type BackendConstructor = fn(&DaemonConfig) -> Result<Box<dyn FrontPanel>, FpqdError>;

/// Name to constructor map of the available device backends.
pub struct BackendRegistry {
    backends: BTreeMap<&'static str, BackendConstructor>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> BackendRegistry {
        BackendRegistry {
            backends: BTreeMap::new(),
        }
    }

    /// A registry holding every backend compiled into the daemon.
    pub fn with_builtin() -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        registry.register(SimulatedDevice::BACKEND_NAME, |config| {
            Ok(Box::new(SimulatedDevice::new(&config.bridge)))
        });
        registry
    }

    /// Register a backend under `name`, replacing any previous registration.
    pub fn register(&mut self, name: &'static str, constructor: BackendConstructor) {
        trace!("Registering backend '{name}'");
        self.backends.insert(name, constructor);
    }

    /// Names of all registered backends, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.backends.keys().copied().collect()
    }

    /// Open a device through the backend registered as `name`.
    ///
    /// # Returns: `Result<Box<dyn FrontPanel>, FpqdError>`
    /// * `Ok(Box<dyn FrontPanel>)` - Opened device
    /// * `Err(FpqdError::Argument)` - No backend registered under `name`
    /// * `Err(FpqdError::Backend)` - The backend failed to open a device
    pub fn open(&self, name: &str, config: &DaemonConfig) -> Result<Box<dyn FrontPanel>, FpqdError> {
        let constructor = self.backends.get(name).ok_or_else(|| {
            FpqdError::Argument(format!(
                "No device backend named {name:?}. Known backends: {:?}",
                self.names()
            ))
        })?;
        constructor(config)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        BackendRegistry::with_builtin()
    }
}
