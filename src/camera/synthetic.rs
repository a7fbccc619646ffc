//! Generated camera stream for `stub://` devices.

use anyhow::{anyhow, Result};

use super::VideoSource;
use crate::frame::VideoFrame;

/// Generated camera for `stub://` devices.
///
/// Draws a gradient background with a bright square sweeping across it.
pub struct SyntheticCamera {
    device: String,
    width: u32,
    height: u32,
    playing: bool,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new(device: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            device: device.into(),
            width,
            height,
            playing: false,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let (w, h) = (self.width as u64, self.height as u64);
        let side = (w.min(h) / 4).max(1);
        let left = (self.frame_count * 4) % w.max(1);
        let top = h.saturating_sub(side) / 2;

        let mut pixels = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let inside = x >= left && x < left + side && y >= top && y < top + side;
                if inside {
                    pixels.extend_from_slice(&[240, 240, 240]);
                } else {
                    pixels.extend_from_slice(&[
                        ((x * 255) / w.max(1)) as u8,
                        ((y * 255) / h.max(1)) as u8,
                        (self.frame_count % 256) as u8,
                    ]);
                }
            }
        }
        pixels
    }
}

impl VideoSource for SyntheticCamera {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.device)
    }

    fn play(&mut self) -> Result<()> {
        self.playing = true;
        log::info!(
            "camera: {} playing {}x{} (synthetic)",
            self.device,
            self.width,
            self.height
        );
        Ok(())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.playing.then_some((self.width, self.height))
    }

    fn is_active(&self) -> bool {
        self.playing
    }

    fn current_frame(&mut self) -> Result<VideoFrame> {
        if !self.playing {
            return Err(anyhow!("{} is not playing", self.device));
        }
        self.frame_count += 1;
        VideoFrame::from_rgb(
            self.generate_pixels(),
            self.width,
            self.height,
            self.frame_count,
        )
    }

    fn stop(&mut self) {
        self.playing = false;
    }
}
