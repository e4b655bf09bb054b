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

//! FrontPanel queue daemon (fpqd).
//!
//! Opens the configured FrontPanel backend, starts the device thread, the frame streamer and
//! the stats reporter, then serves two DBus interfaces:
//!
//! - **Service Name**: `org.fpqd`
//! - **Status Interface**: `/org/fpqd/status` - Read-only queries
//! - **Control Interface**: `/org/fpqd/control` - Operations that schedule device tickets
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (`trace`, `debug`, `info`, `warn`, `error`
//!   or `off`). Defaults to `info`
//! - `FPQD_CONFIG` - Extra config file layered above `/etc/fpqd/config.toml`
//!
//! # Examples
//!
//! ```bash
//! # Run against the simulated backend on the session bus
//! FPQD_CONFIG=./fpqd.toml RUST_LOG=debug fpqd
//! ```

use fpqd::comm::dbus::{
    CONTROL_OBJECT_PATH, SERVICE_NAME, STATUS_OBJECT_PATH, control_interface::ControlInterface,
    status_interface::StatusInterface,
};
use fpqd::config::{BusKind, load_config};
use fpqd::devices::device::BackendRegistry;
use fpqd::service::DeviceService;
use log::{info, warn};
use std::error::Error;
use zbus::connection;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let registry = BackendRegistry::with_builtin();
    let (mut service, bus) = tokio::task::spawn_blocking(move || {
        let service = DeviceService::start(&config, &registry)?;
        let commands = service.commands();
        if let Err(e) = commands.setup_resolution() {
            warn!("Could not read the screen resolution, keeping the configured one: {e}");
        }
        if let Err(e) = commands.retrieve_fps() {
            warn!("Could not measure the input frame rate: {e}");
        }
        Ok::<_, fpqd::error::FpqdError>((service, config.bus))
    })
    .await??;

    let status_interface = StatusInterface::new(
        service.commands(),
        service.stats().clone(),
        service.device_info().clone(),
    );
    let control_interface = ControlInterface::new(service.commands());

    let builder = match bus {
        BusKind::System => connection::Builder::system()?,
        BusKind::Session => connection::Builder::session()?,
    };
    let conn = builder
        .name(SERVICE_NAME)?
        .serve_at(STATUS_OBJECT_PATH, status_interface)?
        .serve_at(CONTROL_OBJECT_PATH, control_interface)?
        .build()
        .await?;

    info!("Started {SERVICE_NAME} dbus service on the {bus:?} bus");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    drop(conn);
    tokio::task::block_in_place(|| service.shutdown());

    Ok(())
}
