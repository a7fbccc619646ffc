//! Presentation of rendered frames.
//!
//! The viewer has no window of its own. A [`DisplaySink`] reports the size
//! the video is shown at and receives every rendered frame.

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::path::PathBuf;
use std::time::Duration;

use crate::color::Color;
use crate::frame::VideoFrame;
use crate::legend::Legend;
use crate::render::{Surface, SurfaceRect, LABEL_HEIGHT, TEXT_OFFSET};
use crate::surface::ImageSurface;

const LEGEND_MARGIN: f32 = 8.0;
const LEGEND_SWATCH: f32 = 12.0;
const LEGEND_ROW_GAP: f32 = 4.0;

/// One rendered frame.
pub struct Presentation<'a> {
    pub frame: &'a VideoFrame,
    /// Detection overlay at viewport size, transparent background.
    pub overlay: &'a RgbaImage,
    pub legend: &'a Legend,
    pub now: Duration,
}

pub trait DisplaySink {
    /// Size the video is rendered at for a source of `native` size.
    fn viewport(&self, native: (u32, u32)) -> (u32, u32);

    fn present(&mut self, presentation: &Presentation<'_>) -> Result<()>;
}

/// Discards frames; the viewport is fixed or follows the native size.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDisplay {
    viewport: Option<(u32, u32)>,
}

impl NullDisplay {
    pub fn new(viewport: Option<(u32, u32)>) -> Self {
        Self { viewport }
    }
}

impl DisplaySink for NullDisplay {
    fn viewport(&self, native: (u32, u32)) -> (u32, u32) {
        self.viewport.unwrap_or(native)
    }

    fn present(&mut self, _presentation: &Presentation<'_>) -> Result<()> {
        Ok(())
    }
}

/// Periodically writes the composited view (frame, boxes, legend) as a JPEG.
pub struct SnapshotDisplay {
    path: PathBuf,
    viewport: Option<(u32, u32)>,
    interval: Duration,
    last_written: Option<Duration>,
    font: Option<FontArc>,
}

impl SnapshotDisplay {
    pub fn new(
        path: PathBuf,
        viewport: Option<(u32, u32)>,
        interval: Duration,
        font: Option<FontArc>,
    ) -> Self {
        Self {
            path,
            viewport,
            interval,
            last_written: None,
            font,
        }
    }

    fn due(&self, now: Duration) -> bool {
        self.last_written
            .map_or(true, |last| now.saturating_sub(last) >= self.interval)
    }

    fn write(&self, image: &RgbaImage) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .save_with_format(&tmp, ImageFormat::Jpeg)
            .with_context(|| format!("failed to write snapshot {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace snapshot {}", self.path.display()))
    }
}

impl DisplaySink for SnapshotDisplay {
    fn viewport(&self, native: (u32, u32)) -> (u32, u32) {
        self.viewport.unwrap_or(native)
    }

    fn present(&mut self, presentation: &Presentation<'_>) -> Result<()> {
        if !self.due(presentation.now) {
            return Ok(());
        }
        let image = composite(presentation, self.font.clone());
        self.write(&image)?;
        self.last_written = Some(presentation.now);
        Ok(())
    }
}

/// Frame scaled to the overlay size, overlay on top, legend in the corner.
pub fn composite(presentation: &Presentation<'_>, font: Option<FontArc>) -> RgbaImage {
    let (width, height) = presentation.overlay.dimensions();
    let mut base = presentation.frame.to_rgba_image();
    if base.dimensions() != (width, height) {
        base = image::imageops::resize(&base, width, height, FilterType::Triangle);
    }
    image::imageops::overlay(&mut base, presentation.overlay, 0, 0);

    let mut surface = ImageSurface::from_image(base, font);
    draw_legend(&mut surface, presentation.legend);
    surface.into_image()
}

/// Swatch + label rows, top-right aligned.
pub fn draw_legend<S: Surface + ?Sized>(surface: &mut S, legend: &Legend) {
    if legend.is_empty() {
        return;
    }
    let (width, _) = surface.size();
    let label_width = legend
        .entries()
        .iter()
        .map(|e| surface.measure_text(&e.class_label))
        .fold(0.0_f32, f32::max);
    let box_width = LEGEND_SWATCH + TEXT_OFFSET.0 * 3.0 + label_width;
    let row_height = LABEL_HEIGHT + LEGEND_ROW_GAP;
    let box_height = row_height * legend.len() as f32 + LEGEND_ROW_GAP;
    let left = (width as f32 - box_width - LEGEND_MARGIN).max(0.0);
    let top = LEGEND_MARGIN;

    surface.fill_rect(
        SurfaceRect::new(left, top, box_width, box_height),
        Color::rgb(0x20, 0x20, 0x20),
    );
    for (row, entry) in legend.entries().iter().enumerate() {
        let y = top + LEGEND_ROW_GAP + row as f32 * row_height;
        let swatch_y = y + (LABEL_HEIGHT - LEGEND_SWATCH) / 2.0;
        surface.fill_rect(
            SurfaceRect::new(left + TEXT_OFFSET.0, swatch_y, LEGEND_SWATCH, LEGEND_SWATCH),
            entry.color,
        );
        surface.fill_text(
            &entry.class_label,
            left + TEXT_OFFSET.0 * 2.0 + LEGEND_SWATCH,
            y + TEXT_OFFSET.1,
            Color::WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorAssignment;
    use crate::detect::{BoundingBox, Detection};
    use crate::legend::build_legend;

    #[test]
    fn composite_matches_overlay_size() {
        let frame = VideoFrame::filled(64, 48, [0, 0, 255], 1);
        let mut overlay = RgbaImage::new(32, 24);
        overlay.put_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        let legend = Legend::default();
        let presentation = Presentation {
            frame: &frame,
            overlay: &overlay,
            legend: &legend,
            now: Duration::ZERO,
        };

        let image = composite(&presentation, None);
        assert_eq!(image.dimensions(), (32, 24));
        assert_eq!(image.get_pixel(1, 1), &image::Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(20, 20)[2], 255);
    }

    #[test]
    fn legend_box_is_drawn_top_right() {
        let mut colors = ColorAssignment::new();
        let det = Detection::new("dog", 0.7, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        let dog = colors.color_for("dog");
        let legend = build_legend(&[det], &colors);

        let mut surface = ImageSurface::transparent(200, 100, None);
        draw_legend(&mut surface, &legend);

        let img = surface.image();
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        let swatch_hit = img.pixels().any(|p| *p == dog.to_rgba());
        assert!(swatch_hit);
    }

    #[test]
    fn snapshots_are_rate_limited() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("view.jpg");
        let mut display = SnapshotDisplay::new(path.clone(), None, Duration::from_millis(500), None);
        let frame = VideoFrame::filled(16, 16, [10, 10, 10], 1);
        let overlay = RgbaImage::new(16, 16);
        let legend = Legend::default();

        let mut present_at = |ms: u64| {
            display.present(&Presentation {
                frame: &frame,
                overlay: &overlay,
                legend: &legend,
                now: Duration::from_millis(ms),
            })
        };
        present_at(0)?;
        assert!(path.exists());
        std::fs::remove_file(&path)?;
        present_at(100)?;
        assert!(!path.exists());
        present_at(600)?;
        assert!(path.exists());
        Ok(())
    }
}
