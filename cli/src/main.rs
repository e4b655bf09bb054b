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

mod control;
mod parse;
mod status;

use crate::control::control_handler;
use crate::parse::{parse_address, parse_data};
use crate::status::status_handler;
use clap::{Parser, Subcommand, ValueEnum, arg, command};
use log::{debug, error};

#[derive(Parser, Debug)]
#[command(name = "fpq")]
#[command(bin_name = "fpq")]
struct Cli {
    #[arg(
        long = "session",
        help = "talk to an fpqd instance on the session bus instead of the system bus"
    )]
    session: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a 32-bit AXI register
    Read {
        #[arg(value_parser = parse_address, help = "register address, e.g. 0x44A50010")]
        address: u32,
    },
    /// Write a 32-bit AXI register
    Write {
        #[arg(value_parser = parse_address, help = "register address, e.g. 0x44A50208")]
        address: u32,
        #[arg(value_parser = parse_data, help = "value, decimal or 0x hex")]
        data: u32,
    },
    /// Move the captured window horizontally
    X {
        #[arg(allow_negative_numbers = true)]
        offset: i32,
    },
    /// Move the captured window vertically
    Y {
        #[arg(allow_negative_numbers = true)]
        offset: i32,
    },
    /// Change the number of frames per batch
    Batch { size: u32 },
    /// Re-measure the input frame rate
    Fps,
    /// Pulse the AXI system reset
    Reset,
    /// Turn frame streaming on or off
    Stream {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Show queue, stats, system variables and device info
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");
    let connection = fpqd_api::connect(cli.session).await?;
    let result = match &cli.command {
        Commands::Status => status_handler(&connection).await,
        command => control_handler(&connection, command).await,
    };
    match result {
        Ok(msg) => {
            println!("{msg}");
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use googletest::prelude::*;

    #[gtest]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[gtest]
    fn test_negative_offset_and_session_flag() {
        let cli = Cli::try_parse_from(["fpq", "--session", "x", "-5"]).unwrap();
        assert_that!(cli.session, eq(true));
        assert!(matches!(cli.command, Commands::X { offset: -5 }));
    }

    #[gtest]
    fn test_write_parses_hex_address_and_decimal_data() {
        let cli = Cli::try_parse_from(["fpq", "write", "0x44A50208", "1408"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Write {
                address: 0x44A5_0208,
                data: 1408
            }
        ));
    }

    #[gtest]
    fn test_decimal_address_is_rejected() {
        assert_that!(Cli::try_parse_from(["fpq", "read", "1234"]).is_err(), eq(true));
    }

    #[gtest]
    fn test_stream_toggle() {
        let cli = Cli::try_parse_from(["fpq", "stream", "off"]).unwrap();
        assert!(matches!(cli.command, Commands::Stream { state: Toggle::Off }));
    }
}
