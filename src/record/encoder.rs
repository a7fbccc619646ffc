//! Encoder traits and the built-in encoder host.

use anyhow::Result;
use image::RgbaImage;
use std::time::Duration;

use super::format::{Container, OutputFormat};
use super::mjpeg::MjpegEncoder;

/// Notifications from a running encoder, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecorderEvent {
    /// One timeslice worth of encoded bytes. May be empty.
    DataAvailable(Vec<u8>),
    /// The encoder finished; no further events follow.
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Interval between `DataAvailable` events.
    pub timeslice: Duration,
}

/// A running encoder fed with capture-surface frames.
pub trait MediaEncoder {
    /// Encode `frame`; `timestamp` is relative to the start of recording.
    fn write_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<()>;

    /// Finish encoding. Remaining data and `Stopped` become available from
    /// `poll_events`. Calling this again is a no-op.
    fn request_stop(&mut self) -> Result<()>;

    /// Take pending events.
    fn poll_events(&mut self) -> Vec<RecorderEvent>;
}

/// Creates encoders for the formats it supports.
pub trait EncoderHost {
    fn is_format_supported(&self, mime_type: &str) -> bool;

    fn create(
        &mut self,
        format: &OutputFormat,
        settings: EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>>;
}

/// Encoders compiled into this build.
///
/// Motion-JPEG is always available; MP4 and WebM need `encode-ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostEncoders;

impl EncoderHost for HostEncoders {
    fn is_format_supported(&self, mime_type: &str) -> bool {
        let Ok(format) = OutputFormat::parse(mime_type) else {
            return false;
        };
        match format.container() {
            Container::Mjpeg => true,
            Container::Mp4 | Container::WebM => ffmpeg_supports(&format),
        }
    }

    fn create(
        &mut self,
        format: &OutputFormat,
        settings: EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>> {
        match format.container() {
            Container::Mjpeg => Ok(Box::new(MjpegEncoder::new(settings))),
            Container::Mp4 | Container::WebM => create_ffmpeg(format, settings),
        }
    }
}

#[cfg(feature = "encode-ffmpeg")]
fn ffmpeg_supports(format: &OutputFormat) -> bool {
    super::ffmpeg::is_supported(format)
}

#[cfg(not(feature = "encode-ffmpeg"))]
fn ffmpeg_supports(_format: &OutputFormat) -> bool {
    false
}

#[cfg(feature = "encode-ffmpeg")]
fn create_ffmpeg(format: &OutputFormat, settings: EncoderSettings) -> Result<Box<dyn MediaEncoder>> {
    Ok(Box::new(super::ffmpeg::FfmpegEncoder::new(format, settings)?))
}

#[cfg(not(feature = "encode-ffmpeg"))]
fn create_ffmpeg(format: &OutputFormat, _settings: EncoderSettings) -> Result<Box<dyn MediaEncoder>> {
    anyhow::bail!("recording as {} needs the encode-ffmpeg feature", format)
}
