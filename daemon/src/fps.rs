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

use crate::scheduler::ticket::TicketError;

const MSA_VID_MASK: u32 = 0x00FF_FFFF;

/// Main stream attributes latched by the DisplayPort receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamTiming {
    /// Raw `LINK_BW_SET` value: the lane rate in units of 270 Mb/s.
    pub link_rate: u32,
    pub mvid: u32,
    pub nvid: u32,
    pub htotal: u32,
    pub vtotal: u32,
}

impl StreamTiming {
    /// Build from raw register reads; MVID and NVID only carry 24 significant bits.
    pub fn from_registers(link_rate: u32, mvid: u32, nvid: u32, htotal: u32, vtotal: u32) -> Self {
        StreamTiming {
            link_rate,
            mvid: mvid & MSA_VID_MASK,
            nvid: nvid & MSA_VID_MASK,
            htotal,
            vtotal,
        }
    }

    /// Recovered pixel clock in MHz.
    pub fn pixel_clock_mhz(&self) -> Option<f64> {
        if self.nvid == 0 {
            return None;
        }
        Some(f64::from(self.link_rate) * 27.0 * f64::from(self.mvid) / f64::from(self.nvid))
    }

    /// Frame rate of the incoming stream, rounded up and snapped to the nearest standard rate.
    ///
    /// # Returns: `Result<u32, TicketError>`
    /// * `Ok(u32)` - Frames per second
    /// * `Err(TicketError::Device)` - The receiver reported a zero NVID or blanking total,
    ///   usually because no source is connected
    pub fn frame_rate(&self) -> Result<u32, TicketError> {
        let pixels = u64::from(self.htotal) * u64::from(self.vtotal);
        let clock = self.pixel_clock_mhz().filter(|_| pixels != 0).ok_or_else(|| {
            TicketError::Device {
                message: format!("no valid DisplayPort stream timing: {self:?}"),
                fatal: false,
            }
        })?;
        let raw = (clock * 1_000_000.0 / pixels as f64).ceil();
        Ok(snap_frame_rate(raw as u32))
    }
}

/// Snap a frame rate that is one off a standard rate onto it.
pub fn snap_frame_rate(fps: u32) -> u32 {
    match fps {
        29 | 31 => 30,
        59 | 61 => 60,
        74 | 76 => 75,
        99 | 101 => 100,
        119 | 121 => 120,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    #[rstest]
    #[case(29, 30)]
    #[case(31, 30)]
    #[case(59, 60)]
    #[case(61, 60)]
    #[case(74, 75)]
    #[case(76, 75)]
    #[case(99, 100)]
    #[case(101, 100)]
    #[case(119, 120)]
    #[case(121, 120)]
    #[case(58, 58)]
    #[case(144, 144)]
    fn test_snap_frame_rate(#[case] raw: u32, #[case] expected: u32) {
        assert_that!(snap_frame_rate(raw), eq(expected));
    }

    #[gtest]
    fn test_1080p60_timing() {
        let timing = StreamTiming::from_registers(0x14, 11_000, 40_000, 2200, 1125);
        assert_that!(timing.pixel_clock_mhz(), some(eq(148.5)));
        assert_that!(timing.frame_rate().unwrap(), eq(60));
    }

    #[gtest]
    fn test_vid_values_are_masked() {
        let timing = StreamTiming::from_registers(0x14, 0xFF00_2AF8, 0x0100_9C40, 2200, 1125);
        assert_that!(timing.mvid, eq(11_000));
        assert_that!(timing.nvid, eq(40_000));
    }

    #[gtest]
    fn test_slightly_fast_clock_snaps_down() {
        // 60.5 Hz rounds up to 61.
        let timing = StreamTiming::from_registers(0x14, 11_092, 40_000, 2200, 1125);
        assert_that!(timing.frame_rate().unwrap(), eq(60));
    }

    #[gtest]
    fn test_missing_stream_is_an_error() {
        let timing = StreamTiming::from_registers(0x14, 0, 0, 0, 0);
        assert_that!(
            &timing.frame_rate(),
            err(displays_as(contains_substring("no valid DisplayPort stream")))
        );
    }
}
