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

use crate::proxies::control_proxy;
use zbus::Connection;

/// Sends the dbus command to read a 32-bit AXI register
pub async fn call_axi_read(connection: &Connection, address: u32) -> Result<u32, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    proxy.axi_read(address).await
}

/// Sends the dbus command to write a 32-bit AXI register
pub async fn call_axi_write(
    connection: &Connection,
    address: u32,
    data: u32,
) -> Result<String, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    proxy.axi_write(address, data).await
}

/// Sends the dbus command to move the captured window horizontally, returns the applied offset
pub async fn call_set_x_position(connection: &Connection, x: i32) -> Result<u32, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    proxy.set_x_position(x).await
}

/// Sends the dbus command to move the captured window vertically, returns the applied offset
pub async fn call_set_y_position(connection: &Connection, y: i32) -> Result<u32, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    proxy.set_y_position(y).await
}

pub async fn call_update_batch_size(
    connection: &Connection,
    size: u32,
) -> Result<String, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    proxy.update_batch_size(size).await
}

/// Sends the dbus command to re-measure the input frame rate
pub async fn call_retrieve_fps(connection: &Connection) -> Result<u32, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    proxy.retrieve_fps().await
}

pub async fn call_reset_axi(connection: &Connection) -> Result<String, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    proxy.reset_axi().await
}

/// Sends the dbus command to turn frame streaming on or off
pub async fn call_set_streaming(
    connection: &Connection,
    enabled: bool,
) -> Result<String, zbus::Error> {
    let proxy = control_proxy::ControlProxy::new(connection).await?;
    if enabled {
        proxy.enable_streaming().await
    } else {
        proxy.disable_streaming().await
    }
}
