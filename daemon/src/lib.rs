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

//! fpqd - serialized FrontPanel device access.
//!
//! Every hardware access of the DisplayPort capture design goes through one
//! [`scheduler::DeviceQueue`] and is executed by one [`scheduler::DeviceWorker`] thread that
//! owns the device. Producers (the [`streamer::FrameStreamer`] and the
//! [`commands::DeviceCommands`] handlers behind DBus) only ever hold
//! [`scheduler::Ticket`]s.
//!
//! Device backends implement [`devices::device::FrontPanel`] and are looked up by name in a
//! [`devices::device::BackendRegistry`]; the built-in `simulated` backend models the gateware
//! so the daemon runs without hardware.

pub mod axil_bridge;
pub mod comm;
pub mod commands;
pub mod config;
pub mod devices;
pub mod error;
pub mod fps;
pub mod operations;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod streamer;
pub mod system_io;
pub mod system_vars;
