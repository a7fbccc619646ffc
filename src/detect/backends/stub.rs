use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::VideoFrame;

/// Stub backend for testing and demos.
///
/// Either replays a fixed script of per-frame detections (cycling), or, when
/// built with `new()`, produces a synthetic "person" box that sweeps across
/// the frame plus a static "cup".
pub struct StubBackend {
    script: Option<Vec<Vec<Detection>>>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: None,
            calls: 0,
        }
    }

    /// Replay `script[i % len]` on the i-th call. An empty script always
    /// yields no detections.
    pub fn scripted(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: Some(script),
            calls: 0,
        }
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn sweep(&self, frame: &VideoFrame) -> Vec<Detection> {
        let w = frame.width as f32;
        let h = frame.height as f32;
        let box_w = w * 0.25;
        let box_h = h * 0.6;
        let travel = (w - box_w).max(1.0);
        let x = (self.calls as f32 * 4.0) % travel;

        vec![
            Detection::new("person", 0.91, BoundingBox::new(x, h * 0.2, box_w, box_h)),
            Detection::new(
                "cup",
                0.64,
                BoundingBox::new(w * 0.7, h * 0.65, w * 0.1, h * 0.15),
            ),
        ]
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let detections = match &self.script {
            Some(script) if script.is_empty() => Vec::new(),
            Some(script) => script[(self.calls % script.len() as u64) as usize].clone(),
            None => self.sweep(frame),
        };
        self.calls += 1;
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_backend_cycles() -> Result<()> {
        let a = vec![Detection::new("cat", 0.5, BoundingBox::new(0.0, 0.0, 1.0, 1.0))];
        let mut backend = StubBackend::scripted(vec![a.clone(), Vec::new()]);
        let frame = VideoFrame::filled(4, 4, [0, 0, 0], 0);

        assert_eq!(backend.detect(&frame)?, a);
        assert!(backend.detect(&frame)?.is_empty());
        assert_eq!(backend.detect(&frame)?, a);
        assert_eq!(backend.calls(), 3);
        Ok(())
    }

    #[test]
    fn sweep_stays_inside_frame() -> Result<()> {
        let mut backend = StubBackend::new();
        let frame = VideoFrame::filled(640, 480, [0, 0, 0], 0);
        for _ in 0..500 {
            for det in backend.detect(&frame)? {
                assert!(det.bbox.x >= 0.0);
                assert!(det.bbox.x + det.bbox.width <= 640.0);
            }
        }
        Ok(())
    }
}
