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

use zbus::{Result, proxy};
#[proxy(
    default_service = "org.fpqd",
    interface = "org.fpqd.status",
    default_path = "/org/fpqd/status"
)]
pub trait Status {
    async fn get_ticket_stats(&self) -> Result<String>;
    async fn get_queue_depth(&self) -> Result<String>;
    async fn get_system_variables(&self) -> Result<String>;
    async fn get_device_info(&self) -> Result<String>;
}
