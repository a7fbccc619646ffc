//! Decoded video frames.
//!
//! Camera sources hand out `VideoFrame`s in packed RGB24 at the device's
//! native resolution. Frames live for one loop iteration: they are detected
//! on, drawn onto the capture surface when recording, and then dropped.

use anyhow::{anyhow, Result};
use image::{RgbImage, RgbaImage};

/// Packed RGB24 frame at native resolution.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic sequence number assigned by the source.
    pub sequence: u64,
}

impl VideoFrame {
    /// Wrap RGB24 pixels, validating the buffer length.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Solid-color frame, mostly useful for synthetic sources and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], sequence: u64) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))
    }

    /// Opaque RGBA copy of the frame.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let idx = (y as usize * self.width as usize + x as usize) * 3;
            image::Rgba([self.data[idx], self.data[idx + 1], self.data[idx + 2], 255])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffers() {
        let err = VideoFrame::from_rgb(vec![0u8; 5], 2, 1, 0).unwrap_err();
        assert!(err.to_string().contains("expected 6 RGB bytes"));
    }

    #[test]
    fn rgba_copy_is_opaque() {
        let frame = VideoFrame::filled(2, 2, [10, 20, 30], 7);
        let rgba = frame.to_rgba_image();
        assert_eq!(rgba.get_pixel(1, 1), &image::Rgba([10, 20, 30, 255]));
        assert_eq!(frame.sequence, 7);
    }
}
