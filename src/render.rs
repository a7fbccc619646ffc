//! Detection overlay renderer.
//!
//! Draws one outlined box plus a filled label tag per detection. Detections
//! are drawn in input order, so later entries paint over earlier ones. The
//! renderer never clears the surface; callers do that once per frame.

use crate::color::{Color, ColorAssignment};
use crate::detect::Detection;
use crate::frame::VideoFrame;

pub const STROKE_WIDTH: u32 = 2;
pub const FONT_SIZE: f32 = 14.0;
pub const LABEL_PADDING: f32 = 8.0;
pub const LABEL_HEIGHT: f32 = 18.0;
/// Text origin inside the label tag (left inset, baseline offset).
pub const TEXT_OFFSET: (f32, f32) = (4.0, 14.0);
pub const LABEL_TEXT_COLOR: Color = Color::WHITE;

/// Ratio of display-surface size to native frame size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale mapping `native` pixel coordinates onto a `display`-sized surface.
    pub fn between(native: (u32, u32), display: (u32, u32)) -> Self {
        if native.0 == 0 || native.1 == 0 {
            return Self::IDENTITY;
        }
        Self {
            x: display.0 as f32 / native.0 as f32,
            y: display.1 as f32 / native.1 as f32,
        }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rectangle in surface pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// 2D drawing target.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Reset every pixel to the surface's background.
    fn clear(&mut self);

    /// Draw a video frame stretched over the whole surface.
    fn draw_frame(&mut self, frame: &VideoFrame);

    fn stroke_rect(&mut self, rect: SurfaceRect, color: Color, width: u32);

    fn fill_rect(&mut self, rect: SurfaceRect, color: Color);

    /// Advance width of `text` at [`FONT_SIZE`].
    fn measure_text(&self, text: &str) -> f32;

    /// Draw `text` with its baseline starting at (`x`, `y`).
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color);
}

/// Label shown on a detection's tag, e.g. `person (91%)`.
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{} ({}%)",
        detection.class_label,
        (detection.confidence * 100.0).round() as i64
    )
}

/// Box outline for `detection` after scaling.
pub fn scaled_rect(detection: &Detection, scale: Scale) -> SurfaceRect {
    let bbox = detection.bbox;
    SurfaceRect::new(
        bbox.x * scale.x,
        bbox.y * scale.y,
        bbox.width * scale.x,
        bbox.height * scale.y,
    )
}

/// Draw every detection onto `surface`. Colors are assigned on first sight.
pub fn render<S: Surface + ?Sized>(
    surface: &mut S,
    detections: &[Detection],
    colors: &mut ColorAssignment,
    scale: Scale,
) {
    for detection in detections {
        let color = colors.color_for(&detection.class_label);
        let rect = scaled_rect(detection, scale);
        surface.stroke_rect(rect, color, STROKE_WIDTH);

        let text = label_text(detection);
        let text_width = surface.measure_text(&text);
        surface.fill_rect(
            SurfaceRect::new(rect.x, rect.y, text_width + LABEL_PADDING, LABEL_HEIGHT),
            color,
        );
        surface.fill_text(
            &text,
            rect.x + TEXT_OFFSET.0,
            rect.y + TEXT_OFFSET.1,
            LABEL_TEXT_COLOR,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[derive(Debug, PartialEq)]
    enum Op {
        Stroke(SurfaceRect, Color, u32),
        Fill(SurfaceRect, Color),
        Text(String, f32, f32, Color),
    }

    /// Records draw calls; every glyph is 7px wide.
    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<Op>,
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            (640, 480)
        }

        fn clear(&mut self) {
            self.ops.clear();
        }

        fn draw_frame(&mut self, _frame: &VideoFrame) {}

        fn stroke_rect(&mut self, rect: SurfaceRect, color: Color, width: u32) {
            self.ops.push(Op::Stroke(rect, color, width));
        }

        fn fill_rect(&mut self, rect: SurfaceRect, color: Color) {
            self.ops.push(Op::Fill(rect, color));
        }

        fn measure_text(&self, text: &str) -> f32 {
            text.chars().count() as f32 * 7.0
        }

        fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color) {
            self.ops.push(Op::Text(text.to_string(), x, y, color));
        }
    }

    fn person() -> Detection {
        Detection::new("person", 0.91, BoundingBox::new(10.0, 20.0, 100.0, 200.0))
    }

    #[test]
    fn scales_box_and_labels_with_confidence() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorAssignment::new();

        render(&mut surface, &[person()], &mut colors, Scale::new(2.0, 1.0));

        let color = colors.get("person").expect("person color assigned");
        let label = "person (91%)";
        assert_eq!(
            surface.ops,
            vec![
                Op::Stroke(SurfaceRect::new(20.0, 20.0, 200.0, 200.0), color, STROKE_WIDTH),
                Op::Fill(
                    SurfaceRect::new(20.0, 20.0, label.len() as f32 * 7.0 + 8.0, 18.0),
                    color
                ),
                Op::Text(label.to_string(), 24.0, 34.0, Color::WHITE),
            ]
        );
    }

    #[test]
    fn empty_list_draws_nothing() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorAssignment::new();
        render(&mut surface, &[], &mut colors, Scale::IDENTITY);
        assert!(surface.ops.is_empty());
        assert!(colors.is_empty());
    }

    #[test]
    fn draws_in_input_order() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorAssignment::new();
        let dog = Detection::new("dog", 0.5, BoundingBox::new(0.0, 0.0, 5.0, 5.0));

        render(&mut surface, &[dog, person()], &mut colors, Scale::IDENTITY);

        let texts: Vec<&str> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(t, ..) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["dog (50%)", "person (91%)"]);
        assert_eq!(colors.labels(), ["dog", "person"]);
    }

    #[test]
    fn rounds_confidence_to_whole_percent() {
        let det = Detection::new("cup", 0.996, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(label_text(&det), "cup (100%)");
        let det = Detection::new("cup", 0.004, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(label_text(&det), "cup (0%)");
    }

    #[test]
    fn scale_between_sizes() {
        assert_eq!(Scale::between((640, 480), (320, 480)), Scale::new(0.5, 1.0));
        assert_eq!(Scale::between((0, 480), (320, 480)), Scale::IDENTITY);
    }
}
