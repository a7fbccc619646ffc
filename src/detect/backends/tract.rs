#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{non_maximum_suppression, BoundingBox, Detection};
use crate::frame::VideoFrame;

const LETTERBOX_FILL: u8 = 114;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single `[1, 3, S, S]` f32 input and a `[1, 4 + classes, anchors]`
/// output of center-format boxes followed by per-class scores. Frames are
/// letterboxed into the square input and boxes are mapped back to source
/// pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    labels: Vec<String>,
    confidence_threshold: f32,
    iou_threshold: f32,
}

/// Letterbox placement of a source frame inside the model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    scaled_w: u32,
    scaled_h: u32,
}

impl Letterbox {
    fn fit(src_w: u32, src_h: u32, size: u32) -> Self {
        let scale = (size as f32 / src_w as f32).min(size as f32 / src_h as f32);
        let scaled_w = ((src_w as f32 * scale).round() as u32).clamp(1, size);
        let scaled_h = ((src_h as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            pad_x: ((size - scaled_w) / 2) as f32,
            pad_y: ((size - scaled_h) / 2) as f32,
            scaled_w,
            scaled_h,
        }
    }

    fn to_source(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let cx = (cx - self.pad_x) / self.scale;
        let cy = (cy - self.pad_y) / self.scale;
        let w = w / self.scale;
        let h = h / self.scale;
        BoundingBox::from_corners(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, labels: Vec<String>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            labels,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
        })
    }

    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &VideoFrame) -> Result<(Tensor, Letterbox)> {
        let size = self.input_size;
        let letterbox = Letterbox::fit(frame.width, frame.height, size);
        let rgb = frame.to_rgb_image()?;
        let resized = image::imageops::resize(
            &rgb,
            letterbox.scaled_w,
            letterbox.scaled_h,
            FilterType::Triangle,
        );

        let pad_x = letterbox.pad_x as u32;
        let pad_y = letterbox.pad_y as u32;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, channel, y, x)| {
                let (x, y) = (x as u32, y as u32);
                let inside = x >= pad_x
                    && y >= pad_y
                    && x < pad_x + letterbox.scaled_w
                    && y < pad_y + letterbox.scaled_h;
                let value = if inside {
                    resized.get_pixel(x - pad_x, y - pad_y)[channel]
                } else {
                    LETTERBOX_FILL
                };
                value as f32 / 255.0
            },
        );

        Ok((input.into_tensor(), letterbox))
    }

    fn decode(&self, outputs: TVec<TValue>, letterbox: Letterbox) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not [1, 4 + classes, anchors]")?;

        let rows = view.shape()[1];
        let anchors = view.shape()[2];
        if rows <= 4 {
            return Err(anyhow!("model output has no class scores ({} rows)", rows));
        }

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let mut best_class = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for class in 0..rows - 4 {
                let score = view[[0, 4 + class, i]];
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }
            if !best_score.is_finite() || best_score < self.confidence_threshold {
                continue;
            }

            let label = self
                .labels
                .get(best_class)
                .cloned()
                .unwrap_or_else(|| format!("class {}", best_class));
            let bbox = letterbox.to_source(
                view[[0, 0, i]],
                view[[0, 1, i]],
                view[[0, 2, i]],
                view[[0, 3, i]],
            );
            candidates.push(Detection::new(label, best_score.clamp(0.0, 1.0), bbox));
        }

        Ok(non_maximum_suppression(candidates, self.iou_threshold))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let (input, letterbox) = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, letterbox)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = VideoFrame::filled(self.input_size, self.input_size, [0, 0, 0], 0);
        self.detect(&blank).map(|_| ())
    }
}
