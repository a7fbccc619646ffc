//! Motion-JPEG encoder: one baseline JPEG per frame, concatenated.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbaImage};
use std::time::Duration;

use super::encoder::{EncoderSettings, MediaEncoder, RecorderEvent};

const JPEG_QUALITY: u8 = 80;

pub struct MjpegEncoder {
    settings: EncoderSettings,
    pending: Vec<u8>,
    slice_started: Duration,
    events: Vec<RecorderEvent>,
    stopped: bool,
    frames: u64,
}

impl MjpegEncoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self {
            settings,
            pending: Vec::new(),
            slice_started: Duration::ZERO,
            events: Vec::new(),
            stopped: false,
            frames: 0,
        }
    }

    fn flush_slice(&mut self) {
        self.events
            .push(RecorderEvent::DataAvailable(std::mem::take(&mut self.pending)));
    }
}

fn strip_alpha(frame: &RgbaImage) -> Vec<u8> {
    frame
        .pixels()
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect()
}

impl MediaEncoder for MjpegEncoder {
    fn write_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        // Emit the slices that elapsed before this frame, as a timer would.
        while timestamp.saturating_sub(self.slice_started) >= self.settings.timeslice {
            self.flush_slice();
            self.slice_started += self.settings.timeslice;
        }

        let rgb = strip_alpha(frame);
        let mut encoder = JpegEncoder::new_with_quality(&mut self.pending, JPEG_QUALITY);
        encoder
            .encode(&rgb, frame.width(), frame.height(), ExtendedColorType::Rgb8)
            .context("encode MJPEG frame")?;
        self.frames += 1;
        Ok(())
    }

    fn request_stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.flush_slice();
        self.events.push(RecorderEvent::Stopped);
        log::debug!(
            "recording: MJPEG encoder finished after {} frames ({}x{})",
            self.frames,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<RecorderEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EncoderSettings {
        EncoderSettings {
            width: 8,
            height: 8,
            fps: 30,
            timeslice: Duration::from_millis(100),
        }
    }

    fn data_sizes(events: &[RecorderEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                RecorderEvent::DataAvailable(bytes) => Some(bytes.len()),
                RecorderEvent::Stopped => None,
            })
            .collect()
    }

    #[test]
    fn chunks_every_timeslice() -> Result<()> {
        let mut encoder = MjpegEncoder::new(settings());
        let frame = RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]));

        encoder.write_frame(&frame, Duration::ZERO)?;
        encoder.write_frame(&frame, Duration::from_millis(33))?;
        assert!(encoder.poll_events().is_empty());

        encoder.write_frame(&frame, Duration::from_millis(120))?;
        let events = encoder.poll_events();
        assert_eq!(events.len(), 1);
        let sizes = data_sizes(&events);
        assert!(sizes[0] > 0);

        encoder.request_stop()?;
        let events = encoder.poll_events();
        assert_eq!(events.last(), Some(&RecorderEvent::Stopped));
        assert_eq!(data_sizes(&events).len(), 1);
        Ok(())
    }

    #[test]
    fn frames_are_jpegs() -> Result<()> {
        let mut encoder = MjpegEncoder::new(settings());
        let frame = RgbaImage::from_pixel(8, 8, image::Rgba([200, 0, 0, 255]));
        encoder.write_frame(&frame, Duration::ZERO)?;
        encoder.request_stop()?;

        let bytes = match encoder.poll_events().into_iter().next() {
            Some(RecorderEvent::DataAvailable(bytes)) => bytes,
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg)?;
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
        Ok(())
    }

    #[test]
    fn stop_is_idempotent() -> Result<()> {
        let mut encoder = MjpegEncoder::new(settings());
        encoder.request_stop()?;
        encoder.request_stop()?;
        let events = encoder.poll_events();
        assert_eq!(
            events,
            vec![RecorderEvent::DataAvailable(Vec::new()), RecorderEvent::Stopped]
        );
        Ok(())
    }
}
