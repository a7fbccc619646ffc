use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::color::DEFAULT_PALETTE;
use crate::record::format::{default_fallback_mime, PRIMARY_MIME};

const DEFAULT_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_CAPTURE_FPS: u32 = 30;
const DEFAULT_TIMESLICE_MS: u64 = 100;
const DEFAULT_OUTPUT_DIR: &str = ".";
const DEFAULT_REFRESH_HZ: u32 = 60;
const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 500;

#[derive(Debug, Deserialize, Default)]
struct ViewerConfigFile {
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    recording: Option<RecordingConfigFile>,
    render: Option<RenderConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    rear_device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    constrained_platform: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    labels_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    primary_format: Option<String>,
    fallback_format: Option<String>,
    capture_fps: Option<u32>,
    timeslice_ms: Option<u64>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    font_path: Option<PathBuf>,
    palette: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    snapshot_path: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    refresh_hz: Option<u32>,
    snapshot_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ViewerConfig {
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub recording: RecordingSettings,
    pub render: RenderSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Primary device node, or `stub://<name>` for the synthetic camera.
    pub device: String,
    /// Device used for rear-facing requests. Defaults to `device`.
    pub rear_device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Platforms whose capture API rejects explicit format constraints.
    pub constrained_platform: bool,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: String,
    pub path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub labels_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RecordingSettings {
    pub primary_format: String,
    pub fallback_format: String,
    pub capture_fps: u32,
    pub timeslice: Duration,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub font_path: Option<PathBuf>,
    pub palette: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub snapshot_path: Option<PathBuf>,
    /// Rendered viewport size. Unset means the native frame size.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub refresh_hz: u32,
    pub snapshot_interval: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            rear_device: None,
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            fps: DEFAULT_CAMERA_FPS,
            constrained_platform: false,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            path: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
            labels_path: None,
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            primary_format: PRIMARY_MIME.to_string(),
            fallback_format: default_fallback_mime().to_string(),
            capture_fps: DEFAULT_CAPTURE_FPS,
            timeslice: Duration::from_millis(DEFAULT_TIMESLICE_MS),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font_path: None,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            width: None,
            height: None,
            refresh_hz: DEFAULT_REFRESH_HZ,
            snapshot_interval: Duration::from_millis(DEFAULT_SNAPSHOT_INTERVAL_MS),
        }
    }
}

impl ViewerConfig {
    /// Load from `LIVE_DETECT_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LIVE_DETECT_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from `path` (JSON, or TOML for `.toml` files), then apply env
    /// overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ViewerConfigFile) -> Self {
        let defaults = Self::default();

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera_file.device.unwrap_or(defaults.camera.device),
            rear_device: camera_file.rear_device,
            width: camera_file.width.unwrap_or(defaults.camera.width),
            height: camera_file.height.unwrap_or(defaults.camera.height),
            fps: camera_file.fps.unwrap_or(defaults.camera.fps),
            constrained_platform: camera_file
                .constrained_platform
                .unwrap_or(defaults.camera.constrained_platform),
        };

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            backend: model_file.backend.unwrap_or(defaults.model.backend),
            path: model_file.path,
            input_size: model_file.input_size.unwrap_or(defaults.model.input_size),
            confidence_threshold: model_file
                .confidence_threshold
                .unwrap_or(defaults.model.confidence_threshold),
            iou_threshold: model_file
                .iou_threshold
                .unwrap_or(defaults.model.iou_threshold),
            labels_path: model_file.labels_path,
        };

        let recording_file = file.recording.unwrap_or_default();
        let recording = RecordingSettings {
            primary_format: recording_file
                .primary_format
                .unwrap_or(defaults.recording.primary_format),
            fallback_format: recording_file
                .fallback_format
                .unwrap_or(defaults.recording.fallback_format),
            capture_fps: recording_file
                .capture_fps
                .unwrap_or(defaults.recording.capture_fps),
            timeslice: recording_file
                .timeslice_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.recording.timeslice),
            output_dir: recording_file
                .output_dir
                .unwrap_or(defaults.recording.output_dir),
        };

        let render_file = file.render.unwrap_or_default();
        let render = RenderSettings {
            font_path: render_file.font_path,
            palette: render_file.palette.unwrap_or(defaults.render.palette),
        };

        let display_file = file.display.unwrap_or_default();
        let display = DisplaySettings {
            snapshot_path: display_file.snapshot_path,
            width: display_file.width,
            height: display_file.height,
            refresh_hz: display_file
                .refresh_hz
                .unwrap_or(defaults.display.refresh_hz),
            snapshot_interval: display_file
                .snapshot_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.display.snapshot_interval),
        };

        Self {
            camera,
            model,
            recording,
            render,
            display,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("LIVE_DETECT_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(backend) = std::env::var("LIVE_DETECT_BACKEND") {
            if !backend.trim().is_empty() {
                self.model.backend = backend;
            }
        }
        if let Ok(path) = std::env::var("LIVE_DETECT_MODEL") {
            if !path.trim().is_empty() {
                self.model.path = Some(PathBuf::from(path));
            }
        }
        if let Ok(dir) = std::env::var("LIVE_DETECT_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.recording.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("LIVE_DETECT_SNAPSHOT") {
            if !path.trim().is_empty() {
                self.display.snapshot_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(flag) = std::env::var("LIVE_DETECT_CONSTRAINED") {
            self.camera.constrained_platform = parse_bool(&flag).ok_or_else(|| {
                anyhow!("LIVE_DETECT_CONSTRAINED must be one of true/false/1/0")
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input_size must be greater than zero"));
        }
        for (name, value) in [
            ("confidence_threshold", self.model.confidence_threshold),
            ("iou_threshold", self.model.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("model {} must be within 0..=1, got {}", name, value));
            }
        }
        if self.recording.capture_fps == 0 {
            return Err(anyhow!("recording capture_fps must be greater than zero"));
        }
        if self.recording.timeslice.is_zero() {
            return Err(anyhow!("recording timeslice must be greater than zero"));
        }
        if self.display.refresh_hz == 0 {
            return Err(anyhow!("display refresh_hz must be greater than zero"));
        }
        if matches!(self.display.width, Some(0)) || matches!(self.display.height, Some(0)) {
            return Err(anyhow!("display width and height must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ViewerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
