//! V4L2 camera source.
//!
//! Opening the node is the access request; streaming starts on `play`.
//! Buffers are converted to RGB24 with the pixel format the driver settled on.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::VideoSource;
use crate::frame::VideoFrame;

const STREAM_BUFFERS: u32 = 4;

/// Parameters for opening a V4L2 device.
#[derive(Clone, Debug)]
pub struct V4l2Request {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Fail instead of accepting a different resolution from the driver.
    pub exact: bool,
}

pub struct V4l2Camera {
    request: V4l2Request,
    device: Option<v4l::Device>,
    state: Option<V4l2Stream>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
}

#[self_referencing]
struct V4l2Stream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    /// Open `request.device` and negotiate a capture format.
    pub fn open(request: V4l2Request) -> Result<Self> {
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&request.device)
            .with_context(|| format!("open v4l2 device {}", request.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = request.width;
        format.height = request.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "camera: failed to set format on {}: {}",
                    request.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if request.exact && (format.width, format.height) != (request.width, request.height) {
            return Err(anyhow!(
                "{} cannot capture {}x{} (driver offers {}x{})",
                request.device,
                request.width,
                request.height,
                format.width,
                format.height
            ));
        }

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "{} delivers unsupported pixel format {}",
                request.device,
                format.fourcc
            )
        })?;

        if request.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(request.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("camera: failed to set fps on {}: {}", request.device, err);
            }
        }

        Ok(Self {
            active_width: format.width,
            active_height: format.height,
            format: pixel_format,
            device: Some(device),
            state: None,
            frame_count: 0,
            request,
        })
    }
}

impl VideoSource for V4l2Camera {
    fn describe(&self) -> String {
        format!("{} ({:?})", self.request.device, self.format)
    }

    fn play(&mut self) -> Result<()> {
        use v4l::buffer::Type;

        if self.state.is_some() {
            return Ok(());
        }
        let device = self
            .device
            .take()
            .ok_or_else(|| anyhow!("{} was stopped", self.request.device))?;

        let state = V4l2StreamTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "camera: {} streaming {}x{}",
            self.request.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.state
            .as_ref()
            .map(|_| (self.active_width, self.active_height))
    }

    fn is_active(&self) -> bool {
        self.state.is_some()
    }

    fn current_frame(&mut self) -> Result<VideoFrame> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.format);
        let state = self.state.as_mut().context("v4l2 device not streaming")?;
        let rgb = state.with_mut(|fields| -> Result<Vec<u8>> {
            let (buf, meta) = fields.stream.next().context("capture v4l2 frame")?;
            let used = (meta.bytesused as usize).min(buf.len());
            let used = if used == 0 { buf.len() } else { used };
            normalize_to_rgb(&buf[..used], width, height, format)
        })?;

        self.frame_count += 1;
        VideoFrame::from_rgb(rgb, width, height, self.frame_count)
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!("camera: {} stopped", self.request.device);
        }
        self.device = None;
    }
}
