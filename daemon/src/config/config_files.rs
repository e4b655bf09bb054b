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

//! TOML config file format.
//!
//! Every key is optional. A missing key falls through to the next layer and finally to the
//! constants in [`crate::config`]. Integers may be written in hex, which is convenient for
//! endpoint addresses:
//!
//! ```toml
//! [device]
//! backend = "simulated"
//!
//! [bridge]
//! address_wire_in = 0x1d
//! hardware_timeout_ms = 3000
//!
//! [scheduler]
//! max_outstanding_frame_batches = 5
//!
//! [stream]
//! batch_size = 5
//! fps = 60
//!
//! [dbus]
//! bus = "session"
//! ```

use crate::error::FpqdError;
use crate::system_io::fs_read;
use serde::Deserialize;
use std::path::Path;

/// This is the top level struct which holds all sections
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub(crate) device: Option<DeviceToml>,
    pub(crate) bridge: Option<BridgeToml>,
    pub(crate) scheduler: Option<SchedulerToml>,
    pub(crate) stream: Option<StreamToml>,
    pub(crate) stats: Option<StatsToml>,
    pub(crate) dbus: Option<DbusToml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DeviceToml {
    pub(crate) backend: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BridgeToml {
    pub(crate) address_wire_in: Option<u8>,
    pub(crate) data_wire_in: Option<u8>,
    pub(crate) timeout_wire_in: Option<u8>,
    pub(crate) data_wire_out: Option<u8>,
    pub(crate) status_wire_out: Option<u8>,
    pub(crate) trigger_in: Option<u8>,
    pub(crate) write_bit_offset: Option<u8>,
    pub(crate) read_bit_offset: Option<u8>,
    pub(crate) hardware_timeout_ms: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SchedulerToml {
    pub(crate) max_outstanding_frame_batches: Option<usize>,
    pub(crate) poll_interval_ms: Option<u64>,
    pub(crate) frame_batch_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StreamToml {
    pub(crate) enabled: Option<bool>,
    pub(crate) batch_size: Option<u32>,
    pub(crate) fps: Option<u32>,
    pub(crate) matrix_size: Option<u32>,
    pub(crate) screen_width: Option<u32>,
    pub(crate) screen_height: Option<u32>,
    pub(crate) status_interval_s: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StatsToml {
    pub(crate) interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DbusToml {
    pub(crate) bus: Option<String>,
}

/// Merge two optional sections, keys in `primary` winning over keys in `fallback`.
fn merge_section<T>(primary: Option<T>, fallback: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (primary, fallback) {
        (Some(p), Some(f)) => Some(merge(p, f)),
        (p, f) => p.or(f),
    }
}

impl TomlConfig {
    pub(crate) fn merge(self, fallback: TomlConfig) -> TomlConfig {
        TomlConfig {
            device: merge_section(self.device, fallback.device, DeviceToml::merge),
            bridge: merge_section(self.bridge, fallback.bridge, BridgeToml::merge),
            scheduler: merge_section(self.scheduler, fallback.scheduler, SchedulerToml::merge),
            stream: merge_section(self.stream, fallback.stream, StreamToml::merge),
            stats: merge_section(self.stats, fallback.stats, StatsToml::merge),
            dbus: merge_section(self.dbus, fallback.dbus, DbusToml::merge),
        }
    }
}

impl DeviceToml {
    fn merge(self, fallback: DeviceToml) -> DeviceToml {
        DeviceToml {
            backend: self.backend.or(fallback.backend),
        }
    }
}

impl BridgeToml {
    fn merge(self, fallback: BridgeToml) -> BridgeToml {
        BridgeToml {
            address_wire_in: self.address_wire_in.or(fallback.address_wire_in),
            data_wire_in: self.data_wire_in.or(fallback.data_wire_in),
            timeout_wire_in: self.timeout_wire_in.or(fallback.timeout_wire_in),
            data_wire_out: self.data_wire_out.or(fallback.data_wire_out),
            status_wire_out: self.status_wire_out.or(fallback.status_wire_out),
            trigger_in: self.trigger_in.or(fallback.trigger_in),
            write_bit_offset: self.write_bit_offset.or(fallback.write_bit_offset),
            read_bit_offset: self.read_bit_offset.or(fallback.read_bit_offset),
            hardware_timeout_ms: self.hardware_timeout_ms.or(fallback.hardware_timeout_ms),
        }
    }
}

impl SchedulerToml {
    fn merge(self, fallback: SchedulerToml) -> SchedulerToml {
        SchedulerToml {
            max_outstanding_frame_batches: self
                .max_outstanding_frame_batches
                .or(fallback.max_outstanding_frame_batches),
            poll_interval_ms: self.poll_interval_ms.or(fallback.poll_interval_ms),
            frame_batch_timeout_ms: self
                .frame_batch_timeout_ms
                .or(fallback.frame_batch_timeout_ms),
        }
    }
}

impl StreamToml {
    fn merge(self, fallback: StreamToml) -> StreamToml {
        StreamToml {
            enabled: self.enabled.or(fallback.enabled),
            batch_size: self.batch_size.or(fallback.batch_size),
            fps: self.fps.or(fallback.fps),
            matrix_size: self.matrix_size.or(fallback.matrix_size),
            screen_width: self.screen_width.or(fallback.screen_width),
            screen_height: self.screen_height.or(fallback.screen_height),
            status_interval_s: self.status_interval_s.or(fallback.status_interval_s),
        }
    }
}

impl StatsToml {
    fn merge(self, fallback: StatsToml) -> StatsToml {
        StatsToml {
            interval_ms: self.interval_ms.or(fallback.interval_ms),
        }
    }
}

impl DbusToml {
    fn merge(self, fallback: DbusToml) -> DbusToml {
        DbusToml {
            bus: self.bus.or(fallback.bus),
        }
    }
}

pub(crate) fn toml_str_to_config(toml_string: &str) -> Result<TomlConfig, FpqdError> {
    toml::from_str(toml_string).map_err(|e| FpqdError::TomlDe {
        toml_string: toml_string.into(),
        e,
    })
}

pub(crate) fn config_from_file(file_path: &Path) -> Result<TomlConfig, FpqdError> {
    if !file_path.is_file() {
        return Err(FpqdError::Internal(format!(
            "Config file not found in {file_path:?}"
        )));
    }
    toml_str_to_config(&fs_read(file_path)?)
}
