//! User-facing status text and terminal presentation.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Milestones reported to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    ModelLoading,
    ModelReady,
    ModelLoadFailed,
    ModelNotReady,
    CameraRequesting,
    CameraLoading,
    CameraAccessDenied,
    Detecting,
    CaptureStarted,
    CaptureFinished,
    Saved(PathBuf),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::ModelLoading => f.write_str("Loading the detection model..."),
            Status::ModelReady => f.write_str("Press start to open the camera."),
            Status::ModelLoadFailed => {
                f.write_str("Failed to load the detection model. Please restart the viewer.")
            }
            Status::ModelNotReady => {
                f.write_str("The model is not loaded yet. Please wait a moment.")
            }
            Status::CameraRequesting => f.write_str("Requesting camera access..."),
            Status::CameraLoading => f.write_str("Loading the camera..."),
            Status::CameraAccessDenied => {
                f.write_str("Cannot access the camera. Please check permissions.")
            }
            Status::Detecting => f.write_str("Detecting objects in real time..."),
            Status::CaptureStarted => f.write_str("Capture started."),
            Status::CaptureFinished => {
                f.write_str("Capture finished. Preview it and save it below.")
            }
            Status::Saved(path) => write!(f, "Saved {}.", path.display()),
        }
    }
}

/// Where status text is shown.
pub trait StatusSurface {
    fn update(&mut self, status: &Status);
}

/// Sends status text to the log only.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogStatus;

impl StatusSurface for LogStatus {
    fn update(&mut self, status: &Status) {
        log::info!("status: {}", status);
    }
}

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal status line with spinner stages for slow steps.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    /// Show a spinner (or a plain line) until the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

impl StatusSurface for Ui {
    fn update(&mut self, status: &Status) {
        log::debug!("status: {}", status);
        if self.use_pretty() {
            eprintln!("• {}", status);
        } else {
            eprintln!("status: {}", status);
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
