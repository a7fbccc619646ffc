//! Live object-detection viewer.
//!
//! Streams a camera feed, runs every frame through an object detector, draws
//! color-coded boxes and a legend over the video, and records the annotated
//! feed to `captured_video.<ext>` on request.
//!
//! # Module Structure
//!
//! - `viewer`: the session object and its per-frame loop
//! - `camera`: camera acquisition with fallback, display size tracking
//! - `detect`: detector backends (stub, ONNX via tract) and detection types
//! - `render`, `surface`, `legend`, `color`: overlay drawing
//! - `record`: capture state machine, encoders, recorded blobs
//! - `display`, `status`, `schedule`: presentation and loop pacing
//! - `config`: file + environment configuration

pub mod camera;
pub mod color;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod legend;
pub mod record;
pub mod render;
pub mod schedule;
pub mod status;
pub mod surface;
pub mod viewer;

pub use camera::{acquire, CameraConstraints, CameraHost, LocalCameraHost, VideoSource};
pub use color::{Color, ColorAssignment};
pub use config::ViewerConfig;
pub use detect::{BoundingBox, Detection, DetectorBackend};
pub use display::{DisplaySink, NullDisplay, SnapshotDisplay};
pub use frame::VideoFrame;
pub use legend::{build_legend, Legend, LegendEntry};
pub use record::{EncoderHost, HostEncoders, RecordingController, RecordingState};
pub use render::{render, Scale, Surface};
pub use schedule::{FrameScheduler, RefreshScheduler};
pub use status::{LogStatus, Status, StatusSurface, Ui};
pub use viewer::{Control, Controls, LoopState, Tick, Viewer, ViewerParts};
