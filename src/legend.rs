//! Per-frame legend of detected classes.

use std::fmt;

use crate::color::{Color, ColorAssignment};
use crate::detect::Detection;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegendEntry {
    pub class_label: String,
    pub color: Color,
}

/// Distinct labels of one frame, in first-seen order.
///
/// Rebuilt from scratch every frame: classes missing from the current frame
/// drop out immediately.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Legend {
    entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn entries(&self) -> &[LegendEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.class_label.as_str()).collect()
    }
}

impl fmt::Display for Legend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", entry.color, entry.class_label)?;
        }
        Ok(())
    }
}

/// Build the legend for `detections`.
///
/// Colors are only looked up, never assigned: render the same detections
/// first so every label already has its color. Labels without one are left
/// out.
pub fn build_legend(detections: &[Detection], colors: &ColorAssignment) -> Legend {
    let mut entries: Vec<LegendEntry> = Vec::new();
    for detection in detections {
        let label = &detection.class_label;
        if entries.iter().any(|e| &e.class_label == label) {
            continue;
        }
        match colors.get(label) {
            Some(color) => entries.push(LegendEntry {
                class_label: label.clone(),
                color,
            }),
            None => log::debug!("legend: no color assigned yet for '{}'", label),
        }
    }
    Legend { entries }
}
