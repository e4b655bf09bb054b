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

//! Values shared between the producers and the device consumer.

use crate::config::StreamConfig;
use std::sync::atomic::{AtomicU32, Ordering};

/// Live stream parameters.
///
/// Every field is read and written independently; callers that need a consistent view of
/// several fields take a [`SystemVariables::snapshot`].
#[derive(Debug)]
pub struct SystemVariables {
    batch_size: AtomicU32,
    fps: AtomicU32,
    matrix_size: AtomicU32,
    screen_width: AtomicU32,
    screen_height: AtomicU32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub batch_size: u32,
    pub fps: u32,
    pub matrix_size: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl SystemVariables {
    pub fn new(stream: &StreamConfig) -> SystemVariables {
        SystemVariables {
            batch_size: AtomicU32::new(stream.batch_size),
            fps: AtomicU32::new(stream.fps),
            matrix_size: AtomicU32::new(stream.matrix_size),
            screen_width: AtomicU32::new(stream.screen_width),
            screen_height: AtomicU32::new(stream.screen_height),
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size.load(Ordering::Acquire)
    }

    pub fn set_batch_size(&self, batch_size: u32) {
        self.batch_size.store(batch_size, Ordering::Release);
    }

    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Acquire)
    }

    /// Store a new frame rate, returning the previous one.
    pub fn set_fps(&self, fps: u32) -> u32 {
        self.fps.swap(fps, Ordering::AcqRel)
    }

    pub fn matrix_size(&self) -> u32 {
        self.matrix_size.load(Ordering::Acquire)
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (
            self.screen_width.load(Ordering::Acquire),
            self.screen_height.load(Ordering::Acquire),
        )
    }

    pub fn set_screen_size(&self, width: u32, height: u32) {
        self.screen_width.store(width, Ordering::Release);
        self.screen_height.store(height, Ordering::Release);
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        let (screen_width, screen_height) = self.screen_size();
        SystemSnapshot {
            batch_size: self.batch_size(),
            fps: self.fps(),
            matrix_size: self.matrix_size(),
            screen_width,
            screen_height,
        }
    }
}
