//! MP4 / WebM encoding through FFmpeg.
//!
//! The muxer writes fragmented output into a spool file; every timeslice the
//! bytes appended since the last slice are read back as one chunk.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbaImage;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::encoder::{EncoderSettings, MediaEncoder, RecorderEvent};
use super::format::{Container, OutputFormat};

static SPOOL_COUNTER: AtomicU64 = AtomicU64::new(0);

fn codec_id(format: &OutputFormat) -> Option<ffmpeg::codec::Id> {
    let codec = format.codec().unwrap_or_default().to_ascii_lowercase();
    match format.container() {
        Container::Mp4 if codec.is_empty() || codec.starts_with("avc1") || codec.starts_with("h264") => {
            Some(ffmpeg::codec::Id::H264)
        }
        Container::WebM if codec.is_empty() || codec.starts_with("vp9") => {
            Some(ffmpeg::codec::Id::VP9)
        }
        Container::WebM if codec.starts_with("vp8") => Some(ffmpeg::codec::Id::VP8),
        _ => None,
    }
}

fn muxer_name(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "mp4",
        Container::WebM => "webm",
        Container::Mjpeg => "mjpeg",
    }
}

/// Whether this FFmpeg build has an encoder for `format`.
pub(crate) fn is_supported(format: &OutputFormat) -> bool {
    if ffmpeg::init().is_err() {
        return false;
    }
    codec_id(format)
        .and_then(ffmpeg::encoder::find)
        .is_some()
}

pub(crate) struct FfmpegEncoder {
    settings: EncoderSettings,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    spool_path: PathBuf,
    spool: File,
    spool_offset: u64,
    slice_started: Duration,
    last_pts: Option<i64>,
    events: Vec<RecorderEvent>,
    stopped: bool,
}

impl FfmpegEncoder {
    pub(crate) fn new(format: &OutputFormat, settings: EncoderSettings) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let id = codec_id(format).ok_or_else(|| anyhow!("no ffmpeg codec for {}", format))?;
        let codec = ffmpeg::encoder::find(id)
            .ok_or_else(|| anyhow!("ffmpeg build has no encoder for {}", format))?;

        let spool_path = std::env::temp_dir().join(format!(
            "live-detect-{}-{}.{}",
            std::process::id(),
            SPOOL_COUNTER.fetch_add(1, Ordering::Relaxed),
            format.extension()
        ));
        let mut output = ffmpeg::format::output_as(&spool_path, muxer_name(format.container()))
            .with_context(|| format!("open ffmpeg output {}", spool_path.display()))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let mut stream = output.add_stream(codec).context("add video stream")?;
        let stream_index = stream.index();

        let fps = settings.fps.max(1) as i32;
        let encoder_time_base = ffmpeg::Rational::new(1, fps);
        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        video.set_width(settings.width);
        video.set_height(settings.height);
        video.set_format(ffmpeg::format::Pixel::YUV420P);
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
        if global_header {
            video.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
        }
        let encoder = video
            .open_as(codec)
            .with_context(|| format!("open ffmpeg encoder for {}", format))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        let mut options = ffmpeg::Dictionary::new();
        if format.container() == Container::Mp4 {
            options.set("movflags", "frag_keyframe+empty_moov+default_base_moof");
        }
        output
            .write_header_with(options)
            .context("write container header")?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or(encoder_time_base);

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGBA,
            settings.width,
            settings.height,
            ffmpeg::format::Pixel::YUV420P,
            settings.width,
            settings.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let spool = File::open(&spool_path)
            .with_context(|| format!("open spool {}", spool_path.display()))?;

        log::info!(
            "recording: ffmpeg {} encoder {}x{} @ {} fps",
            format,
            settings.width,
            settings.height,
            fps
        );

        Ok(Self {
            settings,
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            spool_path,
            spool,
            spool_offset: 0,
            slice_started: Duration::ZERO,
            last_pts: None,
            events: Vec::new(),
            stopped: false,
        })
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write encoded packet")?;
        }
        Ok(())
    }

    /// Bytes the muxer appended to the spool since the last read.
    fn read_spool(&mut self) -> Result<Vec<u8>> {
        self.spool
            .seek(SeekFrom::Start(self.spool_offset))
            .context("seek spool")?;
        let mut bytes = Vec::new();
        self.spool.read_to_end(&mut bytes).context("read spool")?;
        self.spool_offset += bytes.len() as u64;
        Ok(bytes)
    }
}

fn rgba_frame(frame: &RgbaImage) -> ffmpeg::frame::Video {
    let mut rgba = ffmpeg::frame::Video::new(
        ffmpeg::format::Pixel::RGBA,
        frame.width(),
        frame.height(),
    );
    let row_bytes = frame.width() as usize * 4;
    let stride = rgba.stride(0);
    let data = rgba.data_mut(0);
    for (row, src) in frame.as_raw().chunks_exact(row_bytes).enumerate() {
        let start = row * stride;
        data[start..start + row_bytes].copy_from_slice(src);
    }
    rgba
}

impl MediaEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        if frame.dimensions() != (self.settings.width, self.settings.height) {
            return Err(anyhow!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.settings.width,
                self.settings.height
            ));
        }

        let pts = (timestamp.as_secs_f64() * self.settings.fps.max(1) as f64).round() as i64;
        if self.last_pts.is_some_and(|last| pts <= last) {
            return Ok(());
        }
        self.last_pts = Some(pts);

        let rgba = rgba_frame(frame);
        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgba, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(pts));
        self.encoder
            .send_frame(&yuv)
            .context("send frame to ffmpeg encoder")?;
        self.drain_packets()?;

        while timestamp.saturating_sub(self.slice_started) >= self.settings.timeslice {
            let chunk = self.read_spool()?;
            self.events.push(RecorderEvent::DataAvailable(chunk));
            self.slice_started += self.settings.timeslice;
        }
        Ok(())
    }

    fn request_stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.encoder.send_eof().context("flush ffmpeg encoder")?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .context("write container trailer")?;
        let chunk = self.read_spool()?;
        self.events.push(RecorderEvent::DataAvailable(chunk));
        self.events.push(RecorderEvent::Stopped);
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<RecorderEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.spool_path) {
            log::debug!(
                "recording: failed to remove spool {}: {}",
                self.spool_path.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::format::{PRIMARY_MIME, WEBM_MIME};

    #[test]
    fn maps_mime_codecs() -> Result<()> {
        assert_eq!(
            codec_id(&OutputFormat::parse(PRIMARY_MIME)?),
            Some(ffmpeg::codec::Id::H264)
        );
        assert_eq!(
            codec_id(&OutputFormat::parse(WEBM_MIME)?),
            Some(ffmpeg::codec::Id::VP9)
        );
        assert_eq!(
            codec_id(&OutputFormat::parse("video/mp4; codecs=hev1")?),
            None
        );
        Ok(())
    }
}
