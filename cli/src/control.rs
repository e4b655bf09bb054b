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

use crate::{Commands, Toggle};
use fpqd_api::control::{
    call_axi_read, call_axi_write, call_reset_axi, call_retrieve_fps, call_set_streaming,
    call_set_x_position, call_set_y_position, call_update_batch_size,
};
use zbus::Connection;

/// Argument parser for every command that schedules device work
pub async fn control_handler(
    connection: &Connection,
    command: &Commands,
) -> Result<String, zbus::Error> {
    match command {
        Commands::Read { address } => {
            let value = call_axi_read(connection, *address).await?;
            Ok(format!("0x{address:08X}: 0x{value:08X} ({value})"))
        }
        Commands::Write { address, data } => call_axi_write(connection, *address, *data).await,
        Commands::X { offset } => {
            let applied = call_set_x_position(connection, *offset).await?;
            Ok(format!("x offset set to {applied}"))
        }
        Commands::Y { offset } => {
            let applied = call_set_y_position(connection, *offset).await?;
            Ok(format!("y offset set to {applied}"))
        }
        Commands::Batch { size } => call_update_batch_size(connection, *size).await,
        Commands::Fps => {
            let fps = call_retrieve_fps(connection).await?;
            Ok(format!("Input frame rate: {fps} FPS"))
        }
        Commands::Reset => call_reset_axi(connection).await,
        Commands::Stream { state } => {
            call_set_streaming(connection, *state == Toggle::On).await
        }
        Commands::Status => Err(zbus::Error::Failure(
            "status is not a control command".to_string(),
        )),
    }
}
