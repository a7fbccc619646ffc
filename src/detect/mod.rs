//! Object detector backends.
//!
//! The model is loaded once per session with [`load_backend`] and then driven
//! by the frame loop through the [`DetectorBackend`] trait.

mod backend;
mod backends;
pub mod labels;
mod result;

use anyhow::{anyhow, Result};

use crate::config::ModelSettings;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{non_maximum_suppression, BoundingBox, Detection};

/// Load the configured backend and run its warm-up hook.
pub fn load_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match settings.backend.as_str() {
        "stub" => Box::new(StubBackend::new()),
        "tract" => load_tract(settings)?,
        other => return Err(anyhow!("unknown detector backend '{}'", other)),
    };
    backend.warm_up()?;
    log::info!("detector backend '{}' ready", backend.name());
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn load_tract(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    let path = settings
        .path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract backend requires a model path"))?;
    let labels = labels::load_labels(settings.labels_path.as_deref())?;
    let backend = TractBackend::new(path, settings.input_size, labels)?
        .with_thresholds(settings.confidence_threshold, settings.iou_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!("the tract backend requires the backend-tract feature"))
}
