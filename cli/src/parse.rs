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

//! Argument value parsers.

/// Parse an AXI address. Addresses are always written in hex with a `0x` prefix.
pub fn parse_address(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| format!("address {s:?} must start with 0x"))?;
    if digits.is_empty() {
        return Err(format!("address {s:?} has no digits"));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address {s:?} may only contain hex digits after 0x"));
    }
    u32::from_str_radix(digits, 16)
        .map_err(|e| format!("address {s:?} is not a 32-bit hex value: {e}"))
}

/// Parse a data word, decimal or `0x` hex.
pub fn parse_data(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) if digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            u32::from_str_radix(digits, 16)
                .map_err(|e| format!("data {s:?} is not a 32-bit hex value: {e}"))
        }
        None if s.chars().all(|c| c.is_ascii_digit()) => s
            .parse::<u32>()
            .map_err(|e| format!("data {s:?} is not a 32-bit value: {e}")),
        _ => Err(format!("data {s:?} may only contain digits")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    #[rstest]
    #[case::vmix("0x44A50208", 0x44A5_0208)]
    #[case::upper_prefix("0XFF", 0xFF)]
    #[case::max("0xFFFFFFFF", u32::MAX)]
    fn test_parse_address_ok(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(parse_address(input), Ok(expected));
    }

    #[gtest]
    #[rstest]
    #[case::no_prefix("44A50208", "must start with 0x")]
    #[case::empty("0x", "no digits")]
    #[case::too_wide("0x100000000", "not a 32-bit hex value")]
    #[case::not_hex("0xZZ", "only contain hex digits")]
    #[case::plus_sign("0x+10", "only contain hex digits")]
    #[case::minus_sign("0x-10", "only contain hex digits")]
    fn test_parse_address_err(#[case] input: &str, #[case] expected: &str) {
        assert_that!(&parse_address(input), err(displays_as(contains_substring(expected))));
    }

    #[gtest]
    #[rstest]
    #[case::decimal("1408", 1408)]
    #[case::hex("0x580", 0x580)]
    #[case::zero("0", 0)]
    fn test_parse_data_ok(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(parse_data(input), Ok(expected));
    }

    #[gtest]
    #[rstest]
    #[case::negative("-1")]
    #[case::too_large("4294967296")]
    #[case::bad_hex("0xG")]
    #[case::plus_decimal("+5")]
    #[case::plus_hex("0x+5")]
    fn test_parse_data_err(#[case] input: &str) {
        assert_that!(parse_data(input).is_err(), eq(true));
    }
}
