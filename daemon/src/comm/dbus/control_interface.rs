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

use crate::commands::DeviceCommands;
use crate::comm::dbus::run_blocking;
use log::{info, trace};
use tokio::sync::Mutex;
use zbus::{fdo, interface};

pub struct ControlInterface {
    commands: DeviceCommands,
    // Serializes calls that pause and resume streaming.
    stream_lock: Mutex<()>,
}

impl ControlInterface {
    pub fn new(commands: DeviceCommands) -> ControlInterface {
        ControlInterface {
            commands,
            stream_lock: Mutex::new(()),
        }
    }
}

#[interface(name = "org.fpqd.control")]
impl ControlInterface {
    async fn axi_read(&self, address: u32) -> Result<u32, fdo::Error> {
        info!("axi_read called with address: 0x{address:08X}");
        run_blocking(&self.commands, move |commands| commands.axi_read(address)).await
    }

    async fn axi_write(&self, address: u32, data: u32) -> Result<String, fdo::Error> {
        info!("axi_write called with address: 0x{address:08X} and data: 0x{data:08X}");
        run_blocking(&self.commands, move |commands| commands.axi_write(address, data)).await?;
        Ok(format!("Wrote 0x{data:08X} to 0x{address:08X}"))
    }

    async fn set_x_position(&self, x: i32) -> Result<u32, fdo::Error> {
        info!("set_x_position called with x: {x}");
        run_blocking(&self.commands, move |commands| {
            commands.set_x_position(i64::from(x))
        })
        .await
    }

    async fn set_y_position(&self, y: i32) -> Result<u32, fdo::Error> {
        info!("set_y_position called with y: {y}");
        run_blocking(&self.commands, move |commands| {
            commands.set_y_position(i64::from(y))
        })
        .await
    }

    async fn update_batch_size(&self, size: u32) -> Result<String, fdo::Error> {
        info!("update_batch_size called with size: {size}");
        let _guard = self.stream_lock.lock().await;
        trace!("Got stream lock.");
        run_blocking(&self.commands, move |commands| commands.update_batch_size(size)).await?;
        Ok(format!("Set batch size to {size}"))
    }

    async fn retrieve_fps(&self) -> Result<u32, fdo::Error> {
        info!("retrieve_fps called");
        run_blocking(&self.commands, |commands| commands.retrieve_fps()).await
    }

    async fn reset_axi(&self) -> Result<String, fdo::Error> {
        info!("reset_axi called");
        run_blocking(&self.commands, |commands| commands.reset_axi()).await?;
        Ok("AXI system reset".into())
    }

    async fn enable_streaming(&self) -> Result<String, fdo::Error> {
        info!("enable_streaming called");
        let _guard = self.stream_lock.lock().await;
        self.commands.enable_streaming();
        Ok("Frame streaming enabled".into())
    }

    async fn disable_streaming(&self) -> Result<String, fdo::Error> {
        info!("disable_streaming called");
        let _guard = self.stream_lock.lock().await;
        self.commands.disable_streaming();
        Ok("Frame streaming disabled".into())
    }
}
