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
    interface = "org.fpqd.control",
    default_path = "/org/fpqd/control"
)]
pub trait Control {
    async fn axi_read(&self, address: u32) -> Result<u32>;
    async fn axi_write(&self, address: u32, data: u32) -> Result<String>;
    async fn set_x_position(&self, x: i32) -> Result<u32>;
    async fn set_y_position(&self, y: i32) -> Result<u32>;
    async fn update_batch_size(&self, size: u32) -> Result<String>;
    async fn retrieve_fps(&self) -> Result<u32>;
    async fn reset_axi(&self) -> Result<String>;
    async fn enable_streaming(&self) -> Result<String>;
    async fn disable_streaming(&self) -> Result<String>;
}
