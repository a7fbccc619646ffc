//! Recording of the annotated capture surface.
//!
//! [`RecordingController`] is a two-state machine (`Stopped`, `Recording`).
//! While recording, the loop hands it every composited capture frame; a
//! [`FrameSampler`] picks frames at the capture rate and the encoder turns
//! them into chunks. Stopping assembles the chunks into a [`Blob`] kept in
//! the [`BlobStore`] until the next recording starts.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::RecordingSettings;

mod blob;
mod encoder;
#[cfg(feature = "encode-ffmpeg")]
mod ffmpeg;
pub mod format;
mod mjpeg;
mod sampler;

pub use blob::{Blob, BlobStore, BlobUrl};
pub use encoder::{EncoderHost, EncoderSettings, HostEncoders, MediaEncoder, RecorderEvent};
pub use format::{choose_format, Container, OutputFormat};
pub use mjpeg::MjpegEncoder;
pub use sampler::FrameSampler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Stopped,
    Recording,
}

/// What must hold before a recording may start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CapturePreconditions {
    pub source_active: bool,
    pub model_loaded: bool,
}

impl CapturePreconditions {
    fn met(self) -> bool {
        self.source_active && self.model_loaded
    }
}

/// State of the recording in progress.
pub struct RecordingSession {
    format: OutputFormat,
    chunks: Vec<Vec<u8>>,
    encoder: Box<dyn MediaEncoder>,
    sampler: FrameSampler,
    started_at: Duration,
    frames: u64,
}

impl RecordingSession {
    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// The last completed recording, available for preview and saving.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishedRecording {
    pub url: BlobUrl,
    pub format: OutputFormat,
    pub size: usize,
}

pub struct RecordingController {
    settings: RecordingSettings,
    host: Box<dyn EncoderHost>,
    blobs: BlobStore,
    session: Option<RecordingSession>,
    finished: Option<FinishedRecording>,
}

impl RecordingController {
    pub fn new(settings: RecordingSettings, host: Box<dyn EncoderHost>) -> Self {
        Self {
            settings,
            host,
            blobs: BlobStore::new(),
            session: None,
            finished: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        if self.session.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Stopped
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Begin recording frames of `size` (the capture surface's native size).
    ///
    /// Returns `Ok(false)` without doing anything when the preconditions do
    /// not hold or a recording is already running.
    pub fn start(
        &mut self,
        preconditions: CapturePreconditions,
        size: (u32, u32),
        now: Duration,
    ) -> Result<bool> {
        if !preconditions.met() {
            log::debug!("recording: start ignored ({:?})", preconditions);
            return Ok(false);
        }
        if self.session.is_some() {
            log::debug!("recording: already recording");
            return Ok(false);
        }

        if let Some(previous) = self.finished.take() {
            self.blobs.release(&previous.url);
            log::debug!("recording: released {}", previous.url);
        }

        let format = choose_format(
            &self.settings.primary_format,
            &self.settings.fallback_format,
            self.host.as_ref(),
        )?;
        let encoder = self
            .host
            .create(
                &format,
                EncoderSettings {
                    width: size.0,
                    height: size.1,
                    fps: self.settings.capture_fps,
                    timeslice: self.settings.timeslice,
                },
            )
            .with_context(|| format!("failed to start {} encoder", format))?;

        log::info!(
            "recording: started {} at {}x{}",
            format,
            size.0,
            size.1
        );
        self.session = Some(RecordingSession {
            format,
            chunks: Vec::new(),
            encoder,
            sampler: FrameSampler::new(self.settings.capture_fps),
            started_at: now,
            frames: 0,
        });
        Ok(true)
    }

    /// Offer the composited capture surface observed at `now`.
    pub fn capture(&mut self, frame: &RgbaImage, now: Duration) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if !session.sampler.should_sample(now) {
            return Ok(());
        }
        let timestamp = now.saturating_sub(session.started_at);
        session.encoder.write_frame(frame, timestamp)?;
        session.frames += 1;
        self.pump_events();
        Ok(())
    }

    /// Stop recording and finalize the blob.
    ///
    /// Returns `Ok(false)` when nothing was recording. Stopping twice
    /// finalizes once.
    pub fn stop(&mut self) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        let stop_result = session.encoder.request_stop();
        if self.pump_events() {
            return stop_result.map(|_| true);
        }

        log::warn!("recording: encoder did not confirm stop; finalizing collected chunks");
        self.finalize();
        stop_result.map(|_| true)
    }

    /// Apply one encoder event.
    pub fn handle_event(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::DataAvailable(chunk) => {
                if chunk.is_empty() {
                    return;
                }
                if let Some(session) = self.session.as_mut() {
                    session.chunks.push(chunk);
                }
            }
            RecorderEvent::Stopped => self.finalize(),
        }
    }

    /// Drain and apply pending encoder events. Returns `true` when the
    /// session was finalized.
    fn pump_events(&mut self) -> bool {
        let events = match self.session.as_mut() {
            Some(session) => session.encoder.poll_events(),
            None => return false,
        };
        for event in events {
            self.handle_event(event);
            if self.session.is_none() {
                return true;
            }
        }
        false
    }

    fn finalize(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let blob = Blob::assemble(session.chunks, session.format.mime_type());
        let size = blob.len();
        let url = self.blobs.create_ref(blob);
        log::info!(
            "recording: finished {} ({} frames, {} bytes) as {}",
            session.format,
            session.frames,
            size,
            url
        );
        self.finished = Some(FinishedRecording {
            url,
            format: session.format,
            size,
        });
    }

    pub fn finished_recording(&self) -> Option<&FinishedRecording> {
        self.finished.as_ref()
    }

    /// Bytes of the finished recording.
    pub fn finished_blob(&self) -> Option<&Blob> {
        self.finished
            .as_ref()
            .and_then(|finished| self.blobs.get(&finished.url))
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Write the finished recording to `dir/captured_video.<ext>`.
    ///
    /// Returns `Ok(None)` when there is nothing to save.
    pub fn save(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(finished) = self.finished.as_ref() else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(finished.format.file_name());
        self.blobs.save(&finished.url, &path)?;
        log::info!("recording: saved {}", path.display());
        Ok(Some(path))
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }
}
