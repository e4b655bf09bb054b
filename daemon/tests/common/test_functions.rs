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

use fpqd::axil_bridge::BridgeConfig;
use fpqd::config::DaemonConfig;
use fpqd::devices::device::{DeviceInfo, FrontPanel};
use fpqd::devices::simulated::SimulatedDevice;
use fpqd::error::FpqdError;
use fpqd::service::DeviceService;
use fpqd::streamer::TestPatternSource;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Small, fast settings with streaming off.
pub fn test_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.scheduler.poll_interval = Duration::from_millis(20);
    config.scheduler.frame_batch_timeout = Duration::from_millis(200);
    config.stream.enabled = false;
    config.stream.matrix_size = 16;
    config.stream.batch_size = 2;
    config.stream.fps = 200;
    config.stream.status_interval = Duration::from_millis(100);
    config.stats_interval = Duration::from_millis(50);
    config
}

pub fn simulated(config: &DaemonConfig) -> SimulatedDevice {
    SimulatedDevice::new(&config.bridge)
}

pub fn start_service(config: &DaemonConfig, device: SimulatedDevice) -> DeviceService {
    DeviceService::start_with_device(config, Box::new(device), Box::new(TestPatternSource::new()))
        .expect("failed to start device service")
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Simulated device that records every address loaded into the bridge address wire-in, in
/// the order the consumer issued them.
pub struct RecordingDevice {
    inner: SimulatedDevice,
    address_wire_in: u8,
    panic_address: Option<u32>,
    pub log: Arc<Mutex<Vec<u32>>>,
}

impl RecordingDevice {
    pub fn new(bridge: &BridgeConfig) -> RecordingDevice {
        RecordingDevice {
            inner: SimulatedDevice::new(bridge),
            address_wire_in: bridge.wire_in_addresses.address,
            panic_address: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Panic inside the driver whenever `address` is loaded into the bridge.
    pub fn with_panic_on(mut self, address: u32) -> RecordingDevice {
        self.panic_address = Some(address);
        self
    }
}

impl FrontPanel for RecordingDevice {
    fn device_info(&self) -> DeviceInfo {
        self.inner.device_info()
    }

    fn is_front_panel_enabled(&self) -> bool {
        self.inner.is_front_panel_enabled()
    }

    fn set_wire_in_value(&mut self, endpoint: u8, value: u32) -> Result<(), FpqdError> {
        if endpoint == self.address_wire_in {
            if self.panic_address == Some(value) {
                panic!("driver fault at 0x{value:08X}");
            }
            self.log.lock().unwrap().push(value);
        }
        self.inner.set_wire_in_value(endpoint, value)
    }

    fn update_wire_ins(&mut self) -> Result<(), FpqdError> {
        self.inner.update_wire_ins()
    }

    fn update_wire_outs(&mut self) -> Result<(), FpqdError> {
        self.inner.update_wire_outs()
    }

    fn get_wire_out_value(&self, endpoint: u8) -> Result<u32, FpqdError> {
        self.inner.get_wire_out_value(endpoint)
    }

    fn activate_trigger_in(&mut self, endpoint: u8, bit: u8) -> Result<(), FpqdError> {
        self.inner.activate_trigger_in(endpoint, bit)
    }

    fn write_to_pipe_in(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, FpqdError> {
        self.inner.write_to_pipe_in(endpoint, data)
    }

    fn write_to_block_pipe_in(
        &mut self,
        endpoint: u8,
        block_size: usize,
        data: &[u8],
    ) -> Result<usize, FpqdError> {
        self.inner.write_to_block_pipe_in(endpoint, block_size, data)
    }
}
