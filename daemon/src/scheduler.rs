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

//! Prioritized ticket scheduling for exclusive device access.
//!
//! Producers hand [`Operation`](crate::operations::Operation)s to a [`DeviceQueue`] and get a
//! [`Ticket`] back. A single [`DeviceWorker`] thread pops tickets in (priority, sequence)
//! order, runs them against the device and completes the ticket with the result.

pub mod queue;
pub mod ticket;
pub mod worker;

pub use queue::DeviceQueue;
pub use ticket::{Ticket, TicketError, TicketOutcome};
pub use worker::DeviceWorker;
