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

use log::error;
use std::path::PathBuf;
use zbus::fdo;

#[derive(Debug, thiserror::Error)]
pub enum FpqdError {
    #[error("FpqdError::Argument: {0}")]
    Argument(String),
    #[error("FpqdError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("FpqdError::TomlDe: Failed to parse config {toml_string:?}: {e}")]
    TomlDe {
        toml_string: String,
        e: toml::de::Error,
    },
    #[error("FpqdError::Backend: {0}")]
    Backend(String),
    #[error("FpqdError::Transport: FrontPanel endpoint 0x{endpoint:02X} failed: {message}")]
    Transport { endpoint: u8, message: String },
    #[error(
        "FpqdError::AxiHardwareTimeout: Hardware timeout in gateware due to non-responsive slave. \
         Reset AXI system to resolve."
    )]
    AxiHardwareTimeout,
    #[error(
        "FpqdError::AxiHandshakeTimeout: Gateware busy bit still set after {elapsed_ms} ms. \
         Review system endpoint addresses."
    )]
    AxiHandshakeTimeout { elapsed_ms: u128 },
    #[error(
        "FpqdError::AxiUnknownResponse: Gateware responded with unknown code 0b{0:03b}. \
         Review system endpoint addresses."
    )]
    AxiUnknownResponse(u32),
    #[error("FpqdError::Ticket: {0}")]
    Ticket(#[from] crate::scheduler::ticket::TicketError),
    #[error("FpqdError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}

impl FpqdError {
    /// Signaling-protocol failures that cannot be recovered without resetting the AXI system.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FpqdError::AxiHardwareTimeout
                | FpqdError::AxiHandshakeTimeout { .. }
                | FpqdError::AxiUnknownResponse(_)
        )
    }
}

impl From<FpqdError> for fdo::Error {
    fn from(err: FpqdError) -> Self {
        error!("{err}");
        match err {
            FpqdError::Argument(..) => fdo::Error::InvalidArgs(err.to_string()),
            FpqdError::IORead { .. } => fdo::Error::IOError(err.to_string()),
            FpqdError::Transport { .. } => fdo::Error::IOError(err.to_string()),
            _ => fdo::Error::Failed(err.to_string()),
        }
    }
}
