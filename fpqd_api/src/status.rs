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

use crate::proxies::status_proxy;
use std::collections::BTreeMap;
use zbus::Connection;

/// Parse the `key: value` lines returned by the status interface
pub fn parse_key_values(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Sends the dbus command to get per operation kind ticket counters
pub async fn call_get_ticket_stats(connection: &Connection) -> Result<String, zbus::Error> {
    let proxy = status_proxy::StatusProxy::new(connection).await?;
    proxy.get_ticket_stats().await
}

/// Sends the dbus command to get the queue depth and parses it
pub async fn call_get_queue_depth(
    connection: &Connection,
) -> Result<BTreeMap<String, String>, zbus::Error> {
    let proxy = status_proxy::StatusProxy::new(connection).await?;
    Ok(parse_key_values(&proxy.get_queue_depth().await?))
}

/// Sends the dbus command to get the system variables and parses them
pub async fn call_get_system_variables(
    connection: &Connection,
) -> Result<BTreeMap<String, String>, zbus::Error> {
    let proxy = status_proxy::StatusProxy::new(connection).await?;
    Ok(parse_key_values(&proxy.get_system_variables().await?))
}

pub async fn call_get_device_info(connection: &Connection) -> Result<String, zbus::Error> {
    let proxy = status_proxy::StatusProxy::new(connection).await?;
    proxy.get_device_info().await
}
