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

use fpqd_api::status::{
    call_get_device_info, call_get_queue_depth, call_get_system_variables, call_get_ticket_stats,
};
use std::collections::BTreeMap;
use zbus::Connection;

fn table(title: &str, rows: &BTreeMap<String, String>) -> String {
    let mut ret_string = format!("---- {title} ----\n");
    for (key, value) in rows {
        ret_string += format!("| {key} | {value} |\n").as_str();
    }
    ret_string
}

/// Gather everything the status interface offers into ascii tables
pub async fn status_handler(connection: &Connection) -> Result<String, zbus::Error> {
    let mut ret_string = String::from("---- DEVICE ----\n");
    ret_string += call_get_device_info(connection).await?.as_str();
    ret_string += "\n\n";
    ret_string += table("SYSTEM", &call_get_system_variables(connection).await?).as_str();
    ret_string += "\n";
    ret_string += table("QUEUE", &call_get_queue_depth(connection).await?).as_str();
    ret_string += "\n---- TICKETS ----\n";
    ret_string += call_get_ticket_stats(connection).await?.as_str();
    Ok(ret_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_table_rows_are_sorted() {
        let rows = BTreeMap::from([
            ("queued".to_string(), "2".to_string()),
            ("dropped_frame_batches".to_string(), "0".to_string()),
        ]);
        let text = table("QUEUE", &rows);
        expect_that!(
            text.as_str(),
            eq("---- QUEUE ----\n| dropped_frame_batches | 0 |\n| queued | 2 |\n")
        );
    }
}
