use crate::render::Scale;

/// Keeps the display surface sized to the rendered viewport.
///
/// The display surface tracks the viewport, not the native frame size;
/// the scale between the two is recomputed on every change.
#[derive(Clone, Debug)]
pub struct SizeTracker {
    native: (u32, u32),
    display: (u32, u32),
}

impl SizeTracker {
    pub fn new(native: (u32, u32), viewport: (u32, u32)) -> Self {
        Self {
            native,
            display: viewport,
        }
    }

    /// Record the current viewport size. Returns `true` when it changed.
    pub fn observe(&mut self, viewport: (u32, u32)) -> bool {
        if viewport == self.display {
            return false;
        }
        log::debug!(
            "display resized {}x{} -> {}x{}",
            self.display.0,
            self.display.1,
            viewport.0,
            viewport.1
        );
        self.display = viewport;
        true
    }

    pub fn native(&self) -> (u32, u32) {
        self.native
    }

    pub fn display(&self) -> (u32, u32) {
        self.display
    }

    pub fn scale(&self) -> Scale {
        Scale::between(self.native, self.display)
    }
}
