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

//! Assembly of the device thread, the producers and the stats reporter.

use crate::axil_bridge::AxiLiteBridge;
use crate::commands::DeviceCommands;
use crate::config::{self, DaemonConfig};
use crate::devices::device::{BackendRegistry, DeviceInfo, FrontPanel};
use crate::error::FpqdError;
use crate::operations::DeviceContext;
use crate::scheduler::{DeviceQueue, DeviceWorker};
use crate::stats::{StatsReporter, TicketStats};
use crate::streamer::{FrameSource, FrameStreamer, TestPatternSource};
use crate::system_vars::SystemVariables;
use log::{info, trace};
use std::sync::Arc;

/// Program the frame geometry and batch size, returning the bridge that now owns the device.
fn initialize_device(
    mut device: Box<dyn FrontPanel>,
    config: &DaemonConfig,
    vars: &SystemVariables,
) -> Result<(AxiLiteBridge<Box<dyn FrontPanel>>, DeviceInfo), FpqdError> {
    let info = device.device_info();
    info!("Product: {}", info.product_name);
    info!(
        "Firmware version: {}.{}",
        info.firmware_major, info.firmware_minor
    );
    info!("Serial Number: {}", info.serial_number);
    info!("Device ID: {}", info.device_id);

    if !device.is_front_panel_enabled() {
        return Err(FpqdError::Backend(
            "FrontPanel support is not available.".into(),
        ));
    }
    trace!("FrontPanel support is available.");

    let mut bridge = AxiLiteBridge::new(device, config.bridge.clone())?;
    let matrix = vars.matrix_size();
    let transfers_in_line = matrix * 3 / 6;
    let transfers_in_frame = matrix * matrix * 3 / 6;
    let device = bridge.device_mut();
    device.set_wire_in_value(config::TRANSFERS_IN_LINE_WIRE_IN, transfers_in_line)?;
    device.set_wire_in_value(config::TRANSFERS_IN_FRAME_WIRE_IN, transfers_in_frame)?;
    device.set_wire_in_value(config::BATCH_SIZE_WIRE_IN, vars.batch_size())?;
    device.update_wire_ins()?;
    Ok((bridge, info))
}

/// A running device: its consumer thread, the frame streamer and the stats reporter.
///
/// Everything shuts down on [`DeviceService::shutdown`] or drop, producers first so nothing
/// schedules onto a queue whose consumer is gone.
pub struct DeviceService {
    queue: Arc<DeviceQueue>,
    vars: Arc<SystemVariables>,
    stats: Arc<TicketStats>,
    device_info: DeviceInfo,
    commands: DeviceCommands,
    streamer: FrameStreamer,
    reporter: StatsReporter,
    worker: DeviceWorker,
}

impl DeviceService {
    /// Open the configured backend and start streaming a test pattern.
    pub fn start(
        config: &DaemonConfig,
        registry: &BackendRegistry,
    ) -> Result<DeviceService, FpqdError> {
        let device = registry.open(&config.backend, config)?;
        DeviceService::start_with_device(config, device, Box::new(TestPatternSource::new()))
    }

    pub fn start_with_device(
        config: &DaemonConfig,
        device: Box<dyn FrontPanel>,
        source: Box<dyn FrameSource>,
    ) -> Result<DeviceService, FpqdError> {
        let vars = Arc::new(SystemVariables::new(&config.stream));
        let stats = Arc::new(TicketStats::new());
        let (bridge, device_info) = initialize_device(device, config, &vars)?;

        let queue = Arc::new(DeviceQueue::new(
            config.scheduler.max_outstanding_frame_batches,
        ));
        let context = DeviceContext::new(
            bridge,
            vars.clone(),
            stats.clone(),
            config.scheduler.frame_batch_timeout,
        );
        let worker = DeviceWorker::spawn(queue.clone(), context, config.scheduler.poll_interval)?;
        let reporter = StatsReporter::spawn(
            stats.clone(),
            config.stats_interval,
            config.stream.status_interval,
        )?;
        let streamer = FrameStreamer::spawn(queue.clone(), vars.clone(), source, &config.stream)?;
        let commands = DeviceCommands::new(queue.clone(), vars.clone(), streamer.switch());
        info!(
            "Device service started on backend '{}' (streaming {})",
            config.backend,
            if config.stream.enabled { "on" } else { "off" }
        );
        Ok(DeviceService {
            queue,
            vars,
            stats,
            device_info,
            commands,
            streamer,
            reporter,
            worker,
        })
    }

    pub fn commands(&self) -> DeviceCommands {
        self.commands.clone()
    }

    pub fn queue(&self) -> &Arc<DeviceQueue> {
        &self.queue
    }

    pub fn vars(&self) -> &Arc<SystemVariables> {
        &self.vars
    }

    pub fn stats(&self) -> &Arc<TicketStats> {
        &self.stats
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn shutdown(&mut self) {
        self.streamer.stop();
        self.reporter.stop();
        self.worker.stop();
    }
}

impl Drop for DeviceService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
