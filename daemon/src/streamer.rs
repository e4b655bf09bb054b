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

//! Frame producer feeding frame batches into the device queue.

use crate::config::{RETRIEVE_AND_SET_FPS_PRIORITY, SEND_FRAME_BATCH_PRIORITY, StreamConfig};
use crate::error::FpqdError;
use crate::operations::Operation;
use crate::scheduler::DeviceQueue;
use crate::system_vars::SystemVariables;
use log::{debug, error, info};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the streamer asks the device to re-measure the input frame rate.
pub const FPS_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Bytes per pixel of the packed frame format.
pub const BYTES_PER_PIXEL: usize = 3;

/// Something that produces square frames of packed 24-bit pixels.
pub trait FrameSource: Send {
    /// Produce the next `matrix_size` x `matrix_size` frame, or `None` if no new frame is
    /// available, in which case the previous frame is repeated.
    fn next_frame(&mut self, matrix_size: u32) -> Option<Vec<u8>>;
}

/// Moving diagonal gradient.
#[derive(Debug, Default)]
pub struct TestPatternSource {
    phase: u8,
}

impl TestPatternSource {
    pub fn new() -> TestPatternSource {
        TestPatternSource::default()
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self, matrix_size: u32) -> Option<Vec<u8>> {
        let side = matrix_size as usize;
        let mut frame = Vec::with_capacity(side * side * BYTES_PER_PIXEL);
        for y in 0..side {
            for x in 0..side {
                let value = (x + y) as u8;
                frame.extend_from_slice(&[value.wrapping_add(self.phase), value, self.phase]);
            }
        }
        self.phase = self.phase.wrapping_add(1);
        Some(frame)
    }
}

#[derive(Default)]
struct StreamState {
    enabled: bool,
    stopping: bool,
    buffer: Vec<u8>,
    frames_in_batch: u32,
    last_frame: Option<Vec<u8>>,
}

/// Cloneable on/off control of a running [`FrameStreamer`].
#[derive(Clone)]
pub struct StreamSwitch {
    shared: Arc<(Mutex<StreamState>, Condvar)>,
}

impl StreamSwitch {
    fn new(enabled: bool) -> StreamSwitch {
        StreamSwitch {
            shared: Arc::new((
                Mutex::new(StreamState {
                    enabled,
                    ..StreamState::default()
                }),
                Condvar::new(),
            )),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enable(&self) {
        self.lock().enabled = true;
        self.shared.1.notify_all();
        debug!("frame streaming enabled");
    }

    /// Stop scheduling frame batches and discard the partial batch. Once this returns no
    /// further frame batch is scheduled until [`StreamSwitch::enable`] is called.
    pub fn disable(&self) {
        let mut state = self.lock();
        state.enabled = false;
        state.buffer.clear();
        state.frames_in_batch = 0;
        debug!("frame streaming disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    fn request_stop(&self) {
        self.lock().stopping = true;
        self.shared.1.notify_all();
    }
}

/// Thread turning frames from a [`FrameSource`] into `send_frame_batch` tickets.
///
/// Frames are accumulated until the current batch size is reached, then scheduled without
/// waiting for the result. The loop is paced to the current frame rate and schedules a frame
/// rate measurement every [`FPS_CHECK_INTERVAL`].
pub struct FrameStreamer {
    switch: StreamSwitch,
    handle: Option<JoinHandle<()>>,
}

impl FrameStreamer {
    pub fn spawn(
        queue: Arc<DeviceQueue>,
        vars: Arc<SystemVariables>,
        mut source: Box<dyn FrameSource>,
        config: &StreamConfig,
    ) -> Result<FrameStreamer, FpqdError> {
        let switch = StreamSwitch::new(config.enabled);
        let thread_switch = switch.clone();
        let status_interval = config.status_interval;
        let handle = thread::Builder::new()
            .name("fpqd-stream".into())
            .spawn(move || {
                let switch = thread_switch;
                let mut last_status = Instant::now();
                let mut last_fps_check = Instant::now();
                let mut enqueued_frames: u64 = 0;
                loop {
                    let frame_start = Instant::now();
                    {
                        let state = switch.lock();
                        let mut state = switch
                            .shared
                            .1
                            .wait_while(state, |state| !state.enabled && !state.stopping)
                            .unwrap_or_else(PoisonError::into_inner);
                        if state.stopping {
                            break;
                        }
                        let frame = source
                            .next_frame(vars.matrix_size())
                            .or_else(|| state.last_frame.take());
                        if let Some(frame) = frame {
                            state.buffer.extend_from_slice(&frame);
                            state.last_frame = Some(frame);
                            state.frames_in_batch += 1;
                            enqueued_frames += 1;
                        }
                        if state.frames_in_batch >= vars.batch_size() {
                            let data = std::mem::take(&mut state.buffer);
                            let frames = std::mem::take(&mut state.frames_in_batch);
                            queue.schedule(
                                Operation::SendFrameBatch { data, frames },
                                SEND_FRAME_BATCH_PRIORITY,
                            );
                        }
                    }

                    let target = Duration::from_secs(1) / vars.fps().max(1);
                    let frame_time = frame_start.elapsed();
                    if frame_time < target {
                        thread::sleep(target - frame_time);
                    }

                    let since_status = last_status.elapsed();
                    if since_status > status_interval {
                        info!(
                            "Placing frames into the device queue at {:.1} FPS",
                            enqueued_frames as f64 / since_status.as_secs_f64()
                        );
                        enqueued_frames = 0;
                        last_status = Instant::now();
                    }
                    if last_fps_check.elapsed() > FPS_CHECK_INTERVAL {
                        queue.schedule(Operation::RetrieveAndSetFps, RETRIEVE_AND_SET_FPS_PRIORITY);
                        last_fps_check = Instant::now();
                    }
                }
                debug!("frame streamer exiting");
            })
            .map_err(|e| FpqdError::Internal(format!("failed to spawn stream thread: {e}")))?;
        Ok(FrameStreamer {
            switch,
            handle: Some(handle),
        })
    }

    pub fn switch(&self) -> StreamSwitch {
        self.switch.clone()
    }

    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.switch.request_stop();
        if handle.join().is_err() {
            error!("frame streamer thread panicked");
        }
    }
}

impl Drop for FrameStreamer {
    fn drop(&mut self) {
        self.stop();
    }
}
