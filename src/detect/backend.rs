use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::VideoFrame;

/// Object detector backend.
///
/// A backend is loaded once per session and then called once per loop
/// iteration. Calls never overlap: the frame loop blocks on `detect` before
/// scheduling the next iteration.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame. Boxes are returned in source-frame pixels.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run right after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
