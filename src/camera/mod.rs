//! Camera acquisition.
//!
//! A [`CameraHost`] grants access to a [`VideoSource`] for a set of
//! [`CameraConstraints`]. [`acquire`] walks the fallback chain: the preferred
//! rear-facing request first (or the permissive one on constrained
//! platforms), then the permissive request, then gives up.

use anyhow::{bail, Context, Result};
use std::fmt;

use crate::config::CameraSettings;
use crate::frame::VideoFrame;

#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
mod normalize;
mod size;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

pub use size::SizeTracker;
pub use synthetic::SyntheticCamera;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Camera, V4l2Request};

/// Prefix selecting the synthetic camera instead of a device node.
pub const SYNTHETIC_PREFIX: &str = "stub://";

/// Capture constraints for one access request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraConstraints {
    /// Rear-facing camera at the configured resolution, nothing else accepted.
    RearFacing { width: u32, height: u32 },
    /// Whatever camera and format the host offers.
    Any,
}

impl fmt::Display for CameraConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraConstraints::RearFacing { width, height } => {
                write!(f, "rear-facing {}x{}", width, height)
            }
            CameraConstraints::Any => f.write_str("any camera"),
        }
    }
}

/// A live stream that can be played and sampled.
pub trait VideoSource {
    fn describe(&self) -> String;

    /// Start the stream. Native dimensions become known once this succeeds.
    fn play(&mut self) -> Result<()>;

    /// Native frame size, `None` until the stream has started.
    fn dimensions(&self) -> Option<(u32, u32)>;

    fn is_active(&self) -> bool;

    /// Grab the frame currently shown by the stream.
    fn current_frame(&mut self) -> Result<VideoFrame>;

    fn stop(&mut self);
}

/// Grants camera access.
pub trait CameraHost {
    /// Platforms that reject explicit capture constraints.
    fn is_constrained_platform(&self) -> bool;

    fn request_access(&mut self, constraints: &CameraConstraints) -> Result<Box<dyn VideoSource>>;
}

/// Acquire and start a camera, falling back to the permissive request.
pub fn acquire(host: &mut dyn CameraHost, preferred: (u32, u32)) -> Result<Box<dyn VideoSource>> {
    let first = if host.is_constrained_platform() {
        CameraConstraints::Any
    } else {
        CameraConstraints::RearFacing {
            width: preferred.0,
            height: preferred.1,
        }
    };

    match open_and_play(host, &first) {
        Ok(source) => return Ok(source),
        Err(err) => log::warn!("camera request ({}) failed: {:#}", first, err),
    }

    open_and_play(host, &CameraConstraints::Any).context("camera access failed after fallback")
}

fn open_and_play(
    host: &mut dyn CameraHost,
    constraints: &CameraConstraints,
) -> Result<Box<dyn VideoSource>> {
    let mut source = host.request_access(constraints)?;
    if let Err(err) = source.play() {
        source.stop();
        return Err(err.context(format!("failed to start {}", source.describe())));
    }
    log::info!("camera: {} granted for {}", source.describe(), constraints);
    Ok(source)
}

/// Host backed by local devices: V4L2 nodes or the synthetic camera.
pub struct LocalCameraHost {
    settings: CameraSettings,
}

impl LocalCameraHost {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings }
    }
}

impl CameraHost for LocalCameraHost {
    fn is_constrained_platform(&self) -> bool {
        self.settings.constrained_platform
    }

    fn request_access(&mut self, constraints: &CameraConstraints) -> Result<Box<dyn VideoSource>> {
        let (device, size) = match constraints {
            CameraConstraints::RearFacing { width, height } => (
                self.settings
                    .rear_device
                    .as_deref()
                    .unwrap_or(&self.settings.device),
                Some((*width, *height)),
            ),
            CameraConstraints::Any => (self.settings.device.as_str(), None),
        };

        if let Some(name) = device.strip_prefix(SYNTHETIC_PREFIX) {
            if name == "denied" {
                bail!("access to {} denied", device);
            }
            let (width, height) = size.unwrap_or((self.settings.width, self.settings.height));
            return Ok(Box::new(SyntheticCamera::new(device, width, height)));
        }

        open_device_node(device, size, &self.settings)
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device_node(
    device: &str,
    size: Option<(u32, u32)>,
    settings: &CameraSettings,
) -> Result<Box<dyn VideoSource>> {
    let (width, height) = size.unwrap_or((settings.width, settings.height));
    let camera = V4l2Camera::open(V4l2Request {
        device: device.to_string(),
        width,
        height,
        fps: settings.fps,
        exact: size.is_some(),
    })?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device_node(
    device: &str,
    _size: Option<(u32, u32)>,
    _settings: &CameraSettings,
) -> Result<Box<dyn VideoSource>> {
    Err(anyhow::anyhow!(
        "camera {} needs the ingest-v4l2 feature (use {}<name> for the synthetic camera)",
        device,
        SYNTHETIC_PREFIX
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(device: &str) -> CameraSettings {
        CameraSettings {
            device: device.to_string(),
            ..CameraSettings::default()
        }
    }

    #[test]
    fn local_host_opens_synthetic_camera() -> Result<()> {
        let mut host = LocalCameraHost::new(settings("stub://front"));
        let source = acquire(&mut host, (320, 240))?;
        assert_eq!(source.dimensions(), Some((320, 240)));
        assert!(source.is_active());
        Ok(())
    }

    #[test]
    fn rear_requests_use_rear_device() -> Result<()> {
        let mut host = LocalCameraHost::new(CameraSettings {
            rear_device: Some("stub://rear".to_string()),
            ..settings("stub://front")
        });
        let source = host.request_access(&CameraConstraints::RearFacing {
            width: 64,
            height: 48,
        })?;
        assert!(source.describe().contains("stub://rear"));
        Ok(())
    }

    #[test]
    fn denied_synthetic_camera_fails_both_attempts() {
        let mut host = LocalCameraHost::new(settings("stub://denied"));
        let err = match acquire(&mut host, (64, 48)) {
            Ok(_) => panic!("expected access failure"),
            Err(err) => err,
        };
        assert!(format!("{:#}", err).contains("denied"));
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn device_nodes_need_the_v4l2_feature() {
        let mut host = LocalCameraHost::new(settings("/dev/video0"));
        assert!(host.request_access(&CameraConstraints::Any).is_err());
    }
}
