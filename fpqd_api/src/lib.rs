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

//! Client bindings for the fpqd DBus service.
//!
//! Every `call_*` function takes an open [`zbus::Connection`]; use [`connect`] to get one on
//! the bus the daemon was configured for.

pub mod control;
pub mod proxies;
pub mod status;

use log::trace;
use zbus::Connection;

/// Connect to the session bus when `session` is set, otherwise to the system bus.
pub async fn connect(session: bool) -> Result<Connection, zbus::Error> {
    trace!("connecting to the {} bus", if session { "session" } else { "system" });
    if session {
        Connection::session().await
    } else {
        Connection::system().await
    }
}
