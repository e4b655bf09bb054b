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

//! Daemon configuration.
//!
//! Hard-coded defaults live here as constants. They can be overridden by TOML files, see
//! [`config_files`] for the file format and layering rules. The merged result is a
//! [`DaemonConfig`] which is handed explicitly to every component that needs it; nothing in
//! the daemon reads configuration from global state.

pub mod config_files;

use crate::axil_bridge::{BridgeConfig, TriggerInAddressAndOffsets, WireInAddresses, WireOutAddresses};
use crate::error::FpqdError;
use config_files::TomlConfig;
use log::{trace, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Vendor configuration, overridden by [`USER_CONFIG_PATH`].
pub static VENDOR_CONFIG_PATH: &str = "/usr/lib/fpqd/config.toml";
/// User configuration. Overrides the vendor configuration.
pub static USER_CONFIG_PATH: &str = "/etc/fpqd/config.toml";
/// Environment variable naming an extra config file which overrides all others.
pub static CONFIG_ENV_VAR: &str = "FPQD_CONFIG";

pub static DEFAULT_BACKEND: &str = "simulated";

// Queue priorities. Lower is more urgent.
pub const RETRIEVE_AND_SET_FPS_PRIORITY: u8 = 0;
pub const UPDATE_BATCH_SIZE_PRIORITY: u8 = 0;
pub const RESET_AXI_PRIORITY: u8 = 0;
pub const SEND_FRAME_BATCH_PRIORITY: u8 = 1;
pub const SETUP_RESOLUTION_PRIORITY: u8 = 1;
pub const SET_POSITION_PRIORITY: u8 = 2;
pub const AXI_READ_PRIORITY: u8 = 2;
pub const AXI_WRITE_PRIORITY: u8 = 2;

pub const DEFAULT_MAX_OUTSTANDING_FRAME_BATCHES: usize = 5;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_FRAME_BATCH_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_HARDWARE_TIMEOUT_MS: u32 = 3000;
pub const DEFAULT_BATCH_SIZE: u32 = 5;
pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_MATRIX_SIZE: u32 = 512;
pub const DEFAULT_SCREEN_WIDTH: u32 = 1920;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1080;
pub const DEFAULT_STATUS_INTERVAL_S: u64 = 3;
pub const DEFAULT_STATS_INTERVAL_MS: u64 = 1000;

// Gateware endpoints used by the frame path.
pub const TRANSFERS_IN_LINE_WIRE_IN: u8 = 0x10;
pub const TRANSFERS_IN_FRAME_WIRE_IN: u8 = 0x11;
pub const BATCH_SIZE_WIRE_IN: u8 = 0x12;
pub const AXI_RESET_WIRE_IN: u8 = 0x00;
pub const FRAME_STATUS_WIRE_OUT: u8 = 0x30;
pub const FRAME_BATCH_TRIGGER_IN: u8 = 0x40;
pub const BATCH_SIZE_TRIGGER_IN: u8 = 0x41;
pub const FRAME_BLOCK_PIPE_IN: u8 = 0x80;
pub const FRAME_BLOCK_SIZE: usize = 16384;

// AXI-Lite peripherals behind the bridge.
pub const V_MIX_BASE_ADDR: u32 = 0x44A5_0000;
pub const V_MIX_WIDTH_REG: u32 = 0x0010;
pub const V_MIX_HEIGHT_REG: u32 = 0x0018;
pub const V_MIX_LAYER_START_X_REG: u32 = 0x0208;
pub const V_MIX_LAYER_START_Y_REG: u32 = 0x0210;

pub const DP_RX_BASE_ADDR: u32 = 0x44B8_0000;
pub const DP_RX_LINK_BW_SET_REG: u32 = 0x09C;
pub const DP_RX_MSA_MVID_REG: u32 = 0x530;
pub const DP_RX_MSA_NVID_REG: u32 = 0x534;
pub const DP_RX_MSA_HTOTAL_REG: u32 = 0x510;
pub const DP_RX_MSA_VTOTAL_REG: u32 = 0x524;

/// Which DBus bus the daemon registers its service on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    System,
    Session,
}

impl std::str::FromStr for BusKind {
    type Err = FpqdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(BusKind::System),
            "session" => Ok(BusKind::Session),
            other => Err(FpqdError::Argument(format!(
                "unknown dbus bus {other:?}, expected \"system\" or \"session\""
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_outstanding_frame_batches: usize,
    pub poll_interval: Duration,
    pub frame_batch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub enabled: bool,
    pub batch_size: u32,
    pub fps: u32,
    pub matrix_size: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub status_interval: Duration,
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub backend: String,
    pub bridge: BridgeConfig,
    pub scheduler: SchedulerConfig,
    pub stream: StreamConfig,
    pub stats_interval: Duration,
    pub bus: BusKind,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            backend: DEFAULT_BACKEND.to_string(),
            bridge: BridgeConfig::default(),
            scheduler: SchedulerConfig {
                max_outstanding_frame_batches: DEFAULT_MAX_OUTSTANDING_FRAME_BATCHES,
                poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
                frame_batch_timeout: Duration::from_millis(DEFAULT_FRAME_BATCH_TIMEOUT_MS),
            },
            stream: StreamConfig {
                enabled: true,
                batch_size: DEFAULT_BATCH_SIZE,
                fps: DEFAULT_FPS,
                matrix_size: DEFAULT_MATRIX_SIZE,
                screen_width: DEFAULT_SCREEN_WIDTH,
                screen_height: DEFAULT_SCREEN_HEIGHT,
                status_interval: Duration::from_secs(DEFAULT_STATUS_INTERVAL_S),
            },
            stats_interval: Duration::from_millis(DEFAULT_STATS_INTERVAL_MS),
            bus: BusKind::System,
        }
    }
}

impl TryFrom<TomlConfig> for DaemonConfig {
    type Error = FpqdError;

    fn try_from(value: TomlConfig) -> Result<Self, Self::Error> {
        trace!("Resolving config from {value:?}");
        let defaults = DaemonConfig::default();
        let device = value.device.unwrap_or_default();
        let bridge = value.bridge.unwrap_or_default();
        let scheduler = value.scheduler.unwrap_or_default();
        let stream = value.stream.unwrap_or_default();
        let stats = value.stats.unwrap_or_default();
        let dbus = value.dbus.unwrap_or_default();

        let default_bridge = defaults.bridge;
        let config = DaemonConfig {
            backend: device.backend.unwrap_or(defaults.backend),
            bridge: BridgeConfig {
                wire_in_addresses: WireInAddresses {
                    address: bridge
                        .address_wire_in
                        .unwrap_or(default_bridge.wire_in_addresses.address),
                    data: bridge
                        .data_wire_in
                        .unwrap_or(default_bridge.wire_in_addresses.data),
                    timeout: bridge
                        .timeout_wire_in
                        .unwrap_or(default_bridge.wire_in_addresses.timeout),
                },
                wire_out_addresses: WireOutAddresses {
                    data: bridge
                        .data_wire_out
                        .unwrap_or(default_bridge.wire_out_addresses.data),
                    status: bridge
                        .status_wire_out
                        .unwrap_or(default_bridge.wire_out_addresses.status),
                },
                trigger_in_address_and_offsets: TriggerInAddressAndOffsets {
                    address: bridge
                        .trigger_in
                        .unwrap_or(default_bridge.trigger_in_address_and_offsets.address),
                    write_bit_offset: bridge.write_bit_offset.unwrap_or(
                        default_bridge
                            .trigger_in_address_and_offsets
                            .write_bit_offset,
                    ),
                    read_bit_offset: bridge.read_bit_offset.unwrap_or(
                        default_bridge.trigger_in_address_and_offsets.read_bit_offset,
                    ),
                },
                hardware_timeout_ms: bridge
                    .hardware_timeout_ms
                    .unwrap_or(default_bridge.hardware_timeout_ms),
            },
            scheduler: SchedulerConfig {
                max_outstanding_frame_batches: scheduler
                    .max_outstanding_frame_batches
                    .unwrap_or(defaults.scheduler.max_outstanding_frame_batches),
                poll_interval: scheduler
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.scheduler.poll_interval),
                frame_batch_timeout: scheduler
                    .frame_batch_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.scheduler.frame_batch_timeout),
            },
            stream: StreamConfig {
                enabled: stream.enabled.unwrap_or(defaults.stream.enabled),
                batch_size: stream.batch_size.unwrap_or(defaults.stream.batch_size),
                fps: stream.fps.unwrap_or(defaults.stream.fps),
                matrix_size: stream.matrix_size.unwrap_or(defaults.stream.matrix_size),
                screen_width: stream.screen_width.unwrap_or(defaults.stream.screen_width),
                screen_height: stream
                    .screen_height
                    .unwrap_or(defaults.stream.screen_height),
                status_interval: stream
                    .status_interval_s
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.stream.status_interval),
            },
            stats_interval: stats
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.stats_interval),
            bus: match dbus.bus {
                Some(bus) => bus.parse()?,
                None => defaults.bus,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl DaemonConfig {
    fn validate(&self) -> Result<(), FpqdError> {
        self.bridge.validate()?;
        if self.scheduler.max_outstanding_frame_batches == 0 {
            return Err(FpqdError::Argument(
                "scheduler.max_outstanding_frame_batches must be at least 1".into(),
            ));
        }
        if self.scheduler.poll_interval.is_zero() {
            return Err(FpqdError::Argument(
                "scheduler.poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.stream.batch_size == 0 {
            return Err(FpqdError::Argument(
                "stream.batch_size must be at least 1".into(),
            ));
        }
        if self.stream.fps == 0 {
            return Err(FpqdError::Argument("stream.fps must be at least 1".into()));
        }
        if self.stream.matrix_size == 0
            || self.stream.matrix_size > self.stream.screen_width
            || self.stream.matrix_size > self.stream.screen_height
        {
            return Err(FpqdError::Argument(format!(
                "stream.matrix_size {} must be non-zero and fit in a {}x{} screen",
                self.stream.matrix_size, self.stream.screen_width, self.stream.screen_height
            )));
        }
        Ok(())
    }
}

/// Merge the given config files, earlier paths taking precedence over later ones.
///
/// Files which are missing or cannot be parsed are skipped with a warning so that the
/// daemon can still come up on its hard-coded defaults.
pub fn config_from_paths(paths: &[PathBuf]) -> Result<DaemonConfig, FpqdError> {
    let mut merged = TomlConfig::default();
    for path in paths.iter().rev() {
        match config_files::config_from_file(path) {
            Ok(layer) => {
                trace!("Layering config from {path:?}");
                merged = layer.merge(merged);
            }
            Err(e) => warn!("Skipping config {path:?}: {e}"),
        }
    }
    merged.try_into()
}

/// Load the daemon configuration.
///
/// The `FPQD_CONFIG` file (if set) overrides the user config, which overrides the vendor
/// config, which overrides the hard-coded defaults.
pub fn load_config() -> Result<DaemonConfig, FpqdError> {
    let mut paths = Vec::new();
    if let Ok(extra) = std::env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(extra));
    }
    paths.push(Path::new(USER_CONFIG_PATH).to_path_buf());
    paths.push(Path::new(VENDOR_CONFIG_PATH).to_path_buf());
    config_from_paths(&paths)
}
