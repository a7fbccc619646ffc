//! In-memory RGBA drawing surfaces.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::color::Color;
use crate::frame::VideoFrame;
use crate::render::{Surface, SurfaceRect, FONT_SIZE};

/// Fonts probed when no font path is configured.
const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Average glyph advance used to size label tags when no font is loaded.
const FALLBACK_ADVANCE: f32 = FONT_SIZE * 0.55;

/// Load the label font from `path`, or the first system font found.
///
/// Returns `Ok(None)` when no path is configured and no system font exists;
/// labels then get their tags but no glyphs.
pub fn load_font(path: Option<&Path>) -> Result<Option<FontArc>> {
    if let Some(path) = path {
        return read_font(path).map(Some);
    }
    for candidate in SYSTEM_FONTS.iter().map(PathBuf::from) {
        if candidate.exists() {
            match read_font(&candidate) {
                Ok(font) => return Ok(Some(font)),
                Err(err) => log::debug!("skipping font {}: {:#}", candidate.display(), err),
            }
        }
    }
    log::warn!("no label font found; detection labels will be drawn without text");
    Ok(None)
}

fn read_font(path: &Path) -> Result<FontArc> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(bytes).with_context(|| format!("invalid font file {}", path.display()))
}

/// `Surface` backed by an `RgbaImage`.
pub struct ImageSurface {
    image: RgbaImage,
    background: Rgba<u8>,
    font: Option<FontArc>,
}

impl ImageSurface {
    /// Transparent surface, used for the on-screen overlay.
    pub fn transparent(width: u32, height: u32, font: Option<FontArc>) -> Self {
        Self::with_background(width, height, Rgba([0, 0, 0, 0]), font)
    }

    /// Opaque black surface, used for the capture surface.
    pub fn opaque(width: u32, height: u32, font: Option<FontArc>) -> Self {
        Self::with_background(width, height, Rgba([0, 0, 0, 255]), font)
    }

    fn with_background(width: u32, height: u32, background: Rgba<u8>, font: Option<FontArc>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, background),
            background,
            font,
        }
    }

    /// Draw on an existing image; `clear` resets it to opaque black.
    pub fn from_image(image: RgbaImage, font: Option<FontArc>) -> Self {
        Self {
            image,
            background: Rgba([0, 0, 0, 255]),
            font,
        }
    }

    /// Reallocate to a new pixel size. Contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.image = RgbaImage::from_pixel(width, height, self.background);
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Edges further than this outside the surface are pulled in to it. Clamped
/// edges stay off-surface so clipped outlines are not drawn on the border.
const CLAMP_MARGIN: i64 = 1;

/// Pixel rectangle for `rect` on a `bounds`-sized surface.
///
/// `None` for non-finite or empty rectangles.
fn to_rect(rect: SurfaceRect, bounds: (u32, u32)) -> Option<Rect> {
    let values = [rect.x, rect.y, rect.width, rect.height];
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let (left, right) = clamp_span(rect.x, rect.width, bounds.0);
    let (top, bottom) = clamp_span(rect.y, rect.height, bounds.1);
    if right - left < 1 || bottom - top < 1 {
        return None;
    }
    Some(Rect::at(left as i32, top as i32).of_size((right - left) as u32, (bottom - top) as u32))
}

fn clamp_span(start: f32, length: f32, limit: u32) -> (i64, i64) {
    let (lo, hi) = (-CLAMP_MARGIN, limit as i64 + CLAMP_MARGIN);
    let from = (start.round() as i64).clamp(lo, hi);
    let to = ((start + length).round() as i64).clamp(lo, hi);
    (from, to)
}

impl Surface for ImageSurface {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = self.background;
        }
    }

    fn draw_frame(&mut self, frame: &VideoFrame) {
        let rgba = frame.to_rgba_image();
        let (width, height) = self.image.dimensions();
        self.image = if rgba.dimensions() == (width, height) {
            rgba
        } else {
            image::imageops::resize(&rgba, width, height, FilterType::Triangle)
        };
    }

    fn stroke_rect(&mut self, rect: SurfaceRect, color: Color, width: u32) {
        let color = color.to_rgba();
        for inset in 0..width {
            let inset = inset as f32;
            let ring = SurfaceRect::new(
                rect.x + inset,
                rect.y + inset,
                rect.width - 2.0 * inset,
                rect.height - 2.0 * inset,
            );
            if let Some(r) = to_rect(ring, self.image.dimensions()) {
                draw_hollow_rect_mut(&mut self.image, r, color);
            }
        }
    }

    fn fill_rect(&mut self, rect: SurfaceRect, color: Color) {
        if let Some(r) = to_rect(rect, self.image.dimensions()) {
            draw_filled_rect_mut(&mut self.image, r, color.to_rgba());
        }
    }

    fn measure_text(&self, text: &str) -> f32 {
        match &self.font {
            Some(font) => text_size(PxScale::from(FONT_SIZE), font, text).0 as f32,
            None => text.chars().count() as f32 * FALLBACK_ADVANCE,
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color) {
        let Some(font) = &self.font else {
            return;
        };
        // imageproc positions text by its top edge, not its baseline.
        let scale = PxScale::from(FONT_SIZE);
        let top = y - font.as_scaled(scale).ascent();
        let (width, height) = self.image.dimensions();
        let visible = x.is_finite()
            && top.is_finite()
            && x < width as f32
            && top < height as f32
            && x + text_size(scale, font, text).0 as f32 >= 0.0
            && top + 2.0 * FONT_SIZE >= 0.0;
        if !visible {
            return;
        }
        draw_text_mut(
            &mut self.image,
            color.to_rgba(),
            x.round() as i32,
            top.round() as i32,
            scale,
            font,
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stroke_is_two_pixels_wide() {
        let mut surface = ImageSurface::transparent(40, 40, None);
        let red = Color::rgb(255, 0, 0);
        surface.stroke_rect(SurfaceRect::new(5.0, 5.0, 20.0, 20.0), red, 2);

        let img = surface.image();
        assert_eq!(img.get_pixel(5, 5), &red.to_rgba());
        assert_eq!(img.get_pixel(6, 6), &red.to_rgba());
        assert_eq!(img.get_pixel(24, 24), &red.to_rgba());
        assert_eq!(img.get_pixel(10, 10)[3], 0);
    }

    #[test]
    fn clear_restores_background() {
        let mut surface = ImageSurface::opaque(8, 8, None);
        surface.fill_rect(SurfaceRect::new(0.0, 0.0, 8.0, 8.0), Color::WHITE);
        surface.clear();
        assert!(surface.image().pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn degenerate_rects_are_skipped() {
        let mut surface = ImageSurface::transparent(8, 8, None);
        surface.fill_rect(SurfaceRect::new(2.0, 2.0, 0.0, 4.0), Color::WHITE);
        surface.stroke_rect(SurfaceRect::new(2.0, 2.0, 4.0, 0.4), Color::WHITE, 2);
        assert!(surface.image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn non_finite_rects_are_skipped() {
        let mut surface = ImageSurface::transparent(64, 64, None);
        surface.stroke_rect(SurfaceRect::new(4.0, 4.0, f32::NAN, 10.0), Color::WHITE, 2);
        surface.fill_rect(SurfaceRect::new(f32::INFINITY, 4.0, 10.0, 10.0), Color::WHITE);
        surface.fill_text("person (50%)", f32::NAN, 14.0, Color::WHITE);
        assert!(surface.image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn far_out_of_range_rects_are_clamped() {
        let mut surface = ImageSurface::transparent(64, 64, None);
        surface.stroke_rect(SurfaceRect::new(2.0e9, 10.0, 1.0e9, 10.0), Color::WHITE, 2);
        surface.fill_rect(SurfaceRect::new(2.0e9, 10.0, 1.0e9, 18.0), Color::WHITE);
        assert!(surface.image().pixels().all(|p| p[3] == 0));

        // A box overhanging the surface keeps its on-surface edges only.
        let red = Color::rgb(255, 0, 0);
        surface.stroke_rect(SurfaceRect::new(-1000.0, 10.0, 1020.0, 20.0), red, 2);
        let img = surface.image();
        assert_eq!(img.get_pixel(5, 10), &red.to_rgba());
        assert_eq!(img.get_pixel(19, 20), &red.to_rgba());
        assert_eq!(img.get_pixel(0, 20)[3], 0);
    }

    #[test]
    fn draw_frame_stretches_to_surface() {
        let mut surface = ImageSurface::opaque(4, 4, None);
        surface.draw_frame(&VideoFrame::filled(2, 2, [9, 8, 7], 0));
        assert_eq!(surface.size(), (4, 4));
        let pixel = surface.image().get_pixel(3, 3);
        for (got, want) in pixel.0.iter().zip([9u8, 8, 7, 255]) {
            assert!(got.abs_diff(want) <= 1, "{:?}", pixel);
        }
    }

    #[test]
    fn measures_without_font() {
        let surface = ImageSurface::transparent(4, 4, None);
        assert!(surface.measure_text("person (91%)") > 0.0);
    }
}
