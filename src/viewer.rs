//! The live detection session.
//!
//! A [`Viewer`] owns every piece of session state: the loaded detector, the
//! camera stream, the color assignment, both drawing surfaces and the
//! recording controller. It is driven one iteration at a time through
//! [`Viewer::tick_at`], either by [`Viewer::run`] or directly by tests.
//!
//! The loop is `Idle` until a camera stream has been started and its native
//! size is known, then `Detecting`. Each detecting iteration grabs the
//! current frame, waits for its detections, redraws the display overlay,
//! composites the capture surface when recording, and publishes the legend.

use anyhow::Result;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::camera::{self, CameraHost, SizeTracker, VideoSource};
use crate::color::ColorAssignment;
use crate::config::ViewerConfig;
use crate::detect::{self, DetectorBackend};
use crate::display::{DisplaySink, Presentation};
use crate::legend::{build_legend, Legend};
use crate::record::{
    CapturePreconditions, EncoderHost, FinishedRecording, RecordingController, RecordingState,
};
use crate::render::{render, Scale, Surface};
use crate::schedule::FrameScheduler;
use crate::status::{Status, StatusSurface};
use crate::surface::{load_font, ImageSurface};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Detecting,
}

/// User commands delivered to a running viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    StartCamera,
    ToggleCapture,
    Save,
    Quit,
}

impl FromStr for Control {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "camera" => Ok(Control::StartCamera),
            "capture" | "c" => Ok(Control::ToggleCapture),
            "save" | "s" => Ok(Control::Save),
            "quit" | "q" | "exit" => Ok(Control::Quit),
            other => Err(anyhow::anyhow!(
                "unknown command '{}' (expected start, capture, save or quit)",
                other
            )),
        }
    }
}

/// Outcome of one loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// No started stream with known dimensions.
    Idle,
    /// Frame grab or detection failed; nothing was drawn.
    Skipped,
    Rendered { detections: usize },
}

/// What the user can currently do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Controls {
    pub start_camera_enabled: bool,
    pub start_camera_visible: bool,
    pub results_visible: bool,
    pub capture_visible: bool,
    pub capture_label: &'static str,
    pub preview_visible: bool,
    pub save_enabled: bool,
}

pub const START_CAPTURE_LABEL: &str = "Start capture";
pub const STOP_CAPTURE_LABEL: &str = "Stop capture";

/// Collaborators a viewer is built from.
pub struct ViewerParts {
    pub camera_host: Box<dyn CameraHost>,
    pub encoders: Box<dyn EncoderHost>,
    pub display: Box<dyn DisplaySink>,
    pub status: Box<dyn StatusSurface>,
}

pub struct Viewer {
    config: ViewerConfig,
    camera_host: Box<dyn CameraHost>,
    display: Box<dyn DisplaySink>,
    status_surface: Box<dyn StatusSurface>,
    detector: Option<Box<dyn DetectorBackend>>,
    source: Option<Box<dyn VideoSource>>,
    state: LoopState,
    colors: ColorAssignment,
    overlay: ImageSurface,
    capture: ImageSurface,
    tracker: Option<SizeTracker>,
    recorder: RecordingController,
    legend: Legend,
    status: Option<Status>,
    camera_started: bool,
    preview_visible: bool,
}

impl Viewer {
    pub fn new(config: ViewerConfig, parts: ViewerParts) -> Result<Self> {
        let colors = ColorAssignment::from_hex_palette(&config.render.palette)?;
        let font = load_font(config.render.font_path.as_deref())?;
        let recorder = RecordingController::new(config.recording.clone(), parts.encoders);
        Ok(Self {
            camera_host: parts.camera_host,
            display: parts.display,
            status_surface: parts.status,
            detector: None,
            source: None,
            state: LoopState::Idle,
            colors,
            overlay: ImageSurface::transparent(0, 0, font.clone()),
            capture: ImageSurface::opaque(0, 0, font),
            tracker: None,
            recorder,
            legend: Legend::default(),
            status: None,
            camera_started: false,
            preview_visible: false,
            config,
        })
    }

    fn set_status(&mut self, status: Status) {
        self.status_surface.update(&status);
        self.status = Some(status);
    }

    /// Load the configured detector. A failure is final for this session.
    pub fn load_model(&mut self) -> Result<()> {
        self.set_status(Status::ModelLoading);
        match detect::load_backend(&self.config.model) {
            Ok(backend) => {
                self.attach_detector(backend);
                Ok(())
            }
            Err(err) => {
                log::error!("model load failed: {:#}", err);
                self.set_status(Status::ModelLoadFailed);
                Err(err)
            }
        }
    }

    /// Use an already loaded detector.
    pub fn attach_detector(&mut self, backend: Box<dyn DetectorBackend>) {
        self.detector = Some(backend);
        self.set_status(Status::ModelReady);
    }

    pub fn model_loaded(&self) -> bool {
        self.detector.is_some()
    }

    /// Acquire and start the camera. Returns whether a stream was started.
    ///
    /// Access failures are reported through the status surface; the user may
    /// try again. Once a stream has started the control is gone and further
    /// calls do nothing.
    pub fn start_camera(&mut self) -> Result<bool> {
        if self.camera_started {
            log::debug!("camera already started");
            return Ok(false);
        }
        if self.detector.is_none() {
            self.set_status(Status::ModelNotReady);
            return Ok(false);
        }
        self.preview_visible = false;
        self.set_status(Status::CameraRequesting);

        let preferred = (self.config.camera.width, self.config.camera.height);
        match camera::acquire(self.camera_host.as_mut(), preferred) {
            Ok(source) => {
                self.source = Some(source);
                self.state = LoopState::Idle;
                self.camera_started = true;
                self.set_status(Status::CameraLoading);
                Ok(true)
            }
            Err(err) => {
                log::warn!("camera unavailable: {:#}", err);
                self.set_status(Status::CameraAccessDenied);
                Ok(false)
            }
        }
    }

    /// Start or stop recording, depending on the current state.
    pub fn toggle_capture(&mut self, now: Duration) -> Result<RecordingState> {
        if self.recorder.is_recording() {
            if self.recorder.stop()? {
                self.preview_visible = true;
                self.set_status(Status::CaptureFinished);
            }
            return Ok(self.recorder.state());
        }

        let native = self.tracker.as_ref().map(SizeTracker::native);
        let preconditions = CapturePreconditions {
            source_active: native.is_some()
                && self.source.as_ref().is_some_and(|s| s.is_active()),
            model_loaded: self.detector.is_some(),
        };
        self.preview_visible = false;
        let size = native.unwrap_or_default();
        if self.recorder.start(preconditions, size, now)? {
            self.set_status(Status::CaptureStarted);
        }
        Ok(self.recorder.state())
    }

    /// Write the finished recording into the output directory.
    pub fn save_recording(&mut self) -> Result<Option<PathBuf>> {
        let saved = self.recorder.save(&self.config.recording.output_dir)?;
        if let Some(path) = &saved {
            self.set_status(Status::Saved(path.clone()));
        }
        Ok(saved)
    }

    /// Promote the stream to `Detecting` once its native size is known.
    fn on_metadata(&mut self) -> bool {
        let Some(native) = self.source.as_ref().and_then(|s| s.dimensions()) else {
            return false;
        };
        self.capture.resize(native.0, native.1);
        let viewport = self.display.viewport(native);
        self.overlay.resize(viewport.0, viewport.1);
        self.tracker = Some(SizeTracker::new(native, viewport));
        self.state = LoopState::Detecting;
        log::info!(
            "stream ready: native {}x{}, display {}x{}",
            native.0,
            native.1,
            viewport.0,
            viewport.1
        );
        self.set_status(Status::Detecting);
        true
    }

    /// Run one loop iteration at `now` (time since the loop started).
    pub fn tick_at(&mut self, now: Duration) -> Result<Tick> {
        if self.state == LoopState::Idle && !self.on_metadata() {
            return Ok(Tick::Idle);
        }
        let (Some(source), Some(detector)) = (self.source.as_mut(), self.detector.as_mut()) else {
            return Ok(Tick::Idle);
        };
        if !source.is_active() {
            return Ok(Tick::Idle);
        }

        let frame = match source.current_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame grab failed: {:#}", err);
                return Ok(Tick::Skipped);
            }
        };
        let detections = match detector.detect(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("detection failed on frame {}: {:#}", frame.sequence, err);
                return Ok(Tick::Skipped);
            }
        };

        let scale = match self.tracker.as_mut() {
            Some(tracker) => {
                let viewport = self.display.viewport(tracker.native());
                if tracker.observe(viewport) {
                    self.overlay.resize(viewport.0, viewport.1);
                }
                tracker.scale()
            }
            None => Scale::IDENTITY,
        };
        self.overlay.clear();
        render(&mut self.overlay, &detections, &mut self.colors, scale);

        if self.recorder.is_recording() {
            self.capture.clear();
            self.capture.draw_frame(&frame);
            render(&mut self.capture, &detections, &mut self.colors, Scale::IDENTITY);
            if let Err(err) = self.recorder.capture(self.capture.image(), now) {
                log::warn!("recording frame dropped: {:#}", err);
            }
        }

        self.legend = build_legend(&detections, &self.colors);

        let presentation = Presentation {
            frame: &frame,
            overlay: self.overlay.image(),
            legend: &self.legend,
            now,
        };
        if let Err(err) = self.display.present(&presentation) {
            log::warn!("display update failed: {:#}", err);
        }

        Ok(Tick::Rendered {
            detections: detections.len(),
        })
    }

    /// Apply a control. Returns `false` when the viewer should exit.
    pub fn handle_control(&mut self, control: Control, now: Duration) -> Result<bool> {
        match control {
            Control::StartCamera => {
                self.start_camera()?;
            }
            Control::ToggleCapture => {
                self.toggle_capture(now)?;
            }
            Control::Save => {
                if self.save_recording()?.is_none() {
                    log::info!("nothing to save yet");
                }
            }
            Control::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Drive the loop until `Quit` arrives or `shutdown` is set.
    ///
    /// A disconnected control channel only means no more commands: the loop
    /// keeps detecting until shut down.
    pub fn run(
        &mut self,
        scheduler: &mut dyn FrameScheduler,
        controls: &Receiver<Control>,
        shutdown: &AtomicBool,
    ) -> Result<()> {
        'frames: while !shutdown.load(Ordering::SeqCst) {
            let now = scheduler.wait_next();
            for control in controls.try_iter() {
                match self.handle_control(control, now) {
                    Ok(true) => {}
                    Ok(false) => break 'frames,
                    Err(err) => log::error!("{:?} failed: {:#}", control, err),
                }
            }
            self.tick_at(now)?;
        }
        self.shutdown()
    }

    /// Finish a running recording and release the camera.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.recorder.is_recording() {
            self.recorder.stop()?;
        }
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        self.state = LoopState::Idle;
        Ok(())
    }

    pub fn controls(&self) -> Controls {
        let recording = self.recorder.is_recording();
        let detecting = self.state == LoopState::Detecting;
        Controls {
            start_camera_enabled: self.detector.is_some(),
            start_camera_visible: !self.camera_started,
            results_visible: detecting,
            capture_visible: detecting,
            capture_label: if recording {
                STOP_CAPTURE_LABEL
            } else {
                START_CAPTURE_LABEL
            },
            preview_visible: self.preview_visible && self.recorder.finished_recording().is_some(),
            save_enabled: self.recorder.finished_recording().is_some(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    pub fn colors(&self) -> &ColorAssignment {
        &self.colors
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }

    pub fn finished_recording(&self) -> Option<&FinishedRecording> {
        self.recorder.finished_recording()
    }

    /// Display overlay at viewport size.
    pub fn overlay(&self) -> &image::RgbaImage {
        self.overlay.image()
    }

    /// Capture surface at native size.
    pub fn capture_surface(&self) -> &image::RgbaImage {
        self.capture.image()
    }

    pub fn display_size(&self) -> Option<(u32, u32)> {
        self.tracker.as_ref().map(SizeTracker::display)
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}
