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

#[allow(dead_code)]
mod common {
    pub mod test_functions;
}

use common::test_functions::{simulated, start_service, test_config, wait_for};
use fpqd::config::{self, DaemonConfig};
use fpqd::devices::device::BackendRegistry;
use fpqd::devices::simulated::SCRATCH_BASE_ADDR;
use fpqd::operations::OperationKind;
use fpqd::service::DeviceService;
use fpqd::streamer::TestPatternSource;
use googletest::prelude::*;
use rstest::*;
use std::time::Duration;

#[gtest]
fn resolution_and_frame_rate_are_read_from_the_device() {
    let mut config = test_config();
    config.stream.fps = 30;
    let mut service = start_service(&config, simulated(&config));
    let commands = service.commands();

    assert_that!(commands.setup_resolution().unwrap(), eq((1920, 1080)));
    assert_that!(service.vars().screen_size(), eq((1920, 1080)));
    assert_that!(commands.retrieve_fps().unwrap(), eq(60));
    assert_that!(service.vars().fps(), eq(60));
    service.shutdown();
}

#[gtest]
#[rstest]
#[case::inside(100, 100)]
#[case::negative(-20, 0)]
#[case::past_edge(4000, 1920 - 16)]
fn x_position_is_clamped_and_written(#[case] requested: i64, #[case] applied: u32) {
    let config = test_config();
    let mut service = start_service(&config, simulated(&config));
    let commands = service.commands();

    assert_that!(commands.set_x_position(requested).unwrap(), eq(applied));
    let register = config::V_MIX_BASE_ADDR + config::V_MIX_LAYER_START_X_REG;
    assert_that!(commands.axi_read(register).unwrap(), eq(applied));
    service.shutdown();
}

#[gtest]
fn y_position_uses_screen_height() {
    let config = test_config();
    let mut service = start_service(&config, simulated(&config));
    let commands = service.commands();

    assert_that!(commands.set_y_position(2000).unwrap(), eq(1080 - 16));
    let register = config::V_MIX_BASE_ADDR + config::V_MIX_LAYER_START_Y_REG;
    assert_that!(commands.axi_read(register).unwrap(), eq(1080 - 16));
    service.shutdown();
}

#[gtest]
fn axi_round_trip_and_decode_error() {
    let config = test_config();
    let mut service = start_service(&config, simulated(&config));
    let commands = service.commands();

    commands.axi_write(SCRATCH_BASE_ADDR + 8, 0xCAFE_F00D).unwrap();
    assert_that!(commands.axi_read(SCRATCH_BASE_ADDR + 8).unwrap(), eq(0xCAFE_F00D));

    let result = commands.axi_read(0x2000_0000);
    assert_that!(&result, err(displays_as(contains_substring("DECERR"))));
    service.shutdown();
}

#[gtest]
fn reset_recovers_a_stuck_bridge() {
    let mut config = test_config();
    config.bridge.hardware_timeout_ms = 1;
    let mut service = start_service(&config, simulated(&config).with_stuck_bus());
    let commands = service.commands();

    let result = commands.axi_read(SCRATCH_BASE_ADDR);
    assert_that!(&result, err(displays_as(contains_substring("AxiHandshakeTimeout"))));

    commands.reset_axi().unwrap();
    assert_that!(commands.axi_read(SCRATCH_BASE_ADDR).unwrap(), eq(0));
    service.shutdown();
}

#[gtest]
fn streaming_delivers_frame_batches() {
    let mut config = test_config();
    config.stream.enabled = true;
    let mut service = start_service(&config, simulated(&config));

    let stats = service.stats().clone();
    assert_that!(
        wait_for(Duration::from_secs(5), || stats.frames_sent() >= 4),
        eq(true)
    );
    service.commands().disable_streaming();
    service.shutdown();

    let totals = stats.totals();
    assert_that!(totals[&OperationKind::SendFrameBatch].count >= 2, eq(true));
    assert_that!(
        stats.frames_sent(),
        eq(totals[&OperationKind::SendFrameBatch].count * 2)
    );
}

#[gtest]
fn batch_size_update_pauses_and_resumes_streaming() {
    let mut config = test_config();
    config.stream.enabled = true;
    let mut service = start_service(&config, simulated(&config));
    let commands = service.commands();

    commands.update_batch_size(3).unwrap();
    assert_that!(service.vars().batch_size(), eq(3));
    assert_that!(commands.streaming_enabled(), eq(true));

    let result = commands.update_batch_size(0);
    assert_that!(&result, err(displays_as(contains_substring("at least 1"))));
    assert_that!(service.vars().batch_size(), eq(3));
    service.shutdown();
}

#[gtest]
fn commands_after_shutdown_fail() {
    let config = test_config();
    let mut service = start_service(&config, simulated(&config));
    let commands = service.commands();
    assert_that!(service.is_running(), eq(true));
    service.shutdown();
    assert_that!(service.is_running(), eq(false));

    let result = commands.axi_read(SCRATCH_BASE_ADDR);
    assert_that!(&result, err(displays_as(contains_substring("TicketError::Shutdown"))));
}

#[gtest]
fn device_without_front_panel_is_rejected() {
    let config = test_config();
    let result = DeviceService::start_with_device(
        &config,
        Box::new(simulated(&config).without_front_panel()),
        Box::new(TestPatternSource::new()),
    )
    .map(|_| ());
    assert_that!(
        &result,
        err(displays_as(contains_substring("FrontPanel support is not available")))
    );
}

#[gtest]
fn misplaced_bridge_endpoints_fail_start_up() {
    let mut config = test_config();
    config.bridge.wire_out_addresses.status = 0x10;
    let result = DeviceService::start_with_device(
        &config,
        Box::new(simulated(&config)),
        Box::new(TestPatternSource::new()),
    )
    .map(|_| ());
    assert_that!(
        &result,
        err(displays_as(contains_substring("not a wire-out endpoint")))
    );
}

#[gtest]
fn service_starts_from_registry() {
    let config = test_config();
    let registry = BackendRegistry::with_builtin();
    let mut service = DeviceService::start(&config, &registry).expect("simulated should start");
    assert_that!(
        service.device_info().product_name.as_str(),
        contains_substring("simulated")
    );
    service.shutdown();

    let unknown = DaemonConfig {
        backend: "usb".into(),
        ..test_config()
    };
    let result = DeviceService::start(&unknown, &registry).map(|_| ());
    assert_that!(&result, err(displays_as(contains_substring("No device backend"))));
}
