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
use crate::comm::dbus::{format_queue_depth, format_system_variables, format_ticket_stats};
use crate::devices::device::DeviceInfo;
use crate::stats::TicketStats;
use log::info;
use std::sync::Arc;
use zbus::{fdo, interface};

pub struct StatusInterface {
    commands: DeviceCommands,
    stats: Arc<TicketStats>,
    device_info: DeviceInfo,
}

impl StatusInterface {
    pub fn new(
        commands: DeviceCommands,
        stats: Arc<TicketStats>,
        device_info: DeviceInfo,
    ) -> StatusInterface {
        StatusInterface {
            commands,
            stats,
            device_info,
        }
    }
}

#[interface(name = "org.fpqd.status")]
impl StatusInterface {
    async fn get_ticket_stats(&self) -> Result<String, fdo::Error> {
        info!("get_ticket_stats called");
        Ok(format_ticket_stats(
            &self.stats.totals(),
            self.stats.frames_sent(),
        ))
    }

    async fn get_queue_depth(&self) -> Result<String, fdo::Error> {
        info!("get_queue_depth called");
        Ok(format_queue_depth(self.commands.queue()))
    }

    async fn get_system_variables(&self) -> Result<String, fdo::Error> {
        info!("get_system_variables called");
        Ok(format_system_variables(
            &self.commands.vars().snapshot(),
            self.commands.streaming_enabled(),
        ))
    }

    async fn get_device_info(&self) -> Result<String, fdo::Error> {
        info!("get_device_info called");
        Ok(self.device_info.to_string())
    }
}
