//! live_detect - live object-detection viewer
//!
//! Loads the detector, then takes commands on stdin:
//! `start` opens the camera, `capture` toggles recording, `save` writes
//! `captured_video.<ext>` to the output directory, `quit` exits.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::Duration;

use live_detect::{
    surface::load_font, Control, DisplaySink, HostEncoders, LocalCameraHost, NullDisplay,
    RefreshScheduler, SnapshotDisplay, Ui, Viewer, ViewerConfig, ViewerParts,
};

/// Time given to the camera to report its size before scripted capture starts.
const CAPTURE_WARMUP: Duration = Duration::from_millis(750);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "LIVE_DETECT_CONFIG")]
    config: Option<PathBuf>,
    /// Camera device node, or stub://<name> for the synthetic camera.
    #[arg(long)]
    device: Option<String>,
    /// Detector backend (stub|tract).
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model path for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Directory recordings are saved into.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Write the annotated view to this JPEG periodically.
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Start the camera as soon as the model is loaded.
    #[arg(long)]
    autostart: bool,
    /// Record this many seconds after startup, save, and exit. Implies --autostart.
    #[arg(long, value_name = "SECS")]
    record_secs: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty).
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn apply(&self, config: &mut ViewerConfig) {
        if let Some(device) = &self.device {
            config.camera.device = device.clone();
        }
        if let Some(backend) = &self.backend {
            config.model.backend = backend.clone();
        }
        if let Some(model) = &self.model {
            config.model.path = Some(model.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.recording.output_dir = dir.clone();
        }
        if let Some(path) = &self.snapshot {
            config.display.snapshot_path = Some(path.clone());
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut config = ViewerConfig::load_from(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let viewport = config.display.width.zip(config.display.height);
    let display: Box<dyn DisplaySink> = match &config.display.snapshot_path {
        Some(path) => {
            log::info!("writing snapshots to {}", path.display());
            Box::new(SnapshotDisplay::new(
                path.clone(),
                viewport,
                config.display.snapshot_interval,
                load_font(config.render.font_path.as_deref())?,
            ))
        }
        None => Box::new(NullDisplay::new(viewport)),
    };

    let parts = ViewerParts {
        camera_host: Box::new(LocalCameraHost::new(config.camera.clone())),
        encoders: Box::new(HostEncoders),
        display,
        status: Box::new(ui.clone()),
    };
    let mut scheduler = RefreshScheduler::new(config.display.refresh_hz);
    let mut viewer = Viewer::new(config, parts)?;

    {
        let _stage = ui.stage("Loading detection model");
        viewer.load_model()?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let (tx, rx) = mpsc::channel();
    spawn_stdin_reader(tx.clone());
    if args.autostart || args.record_secs.is_some() {
        tx.send(Control::StartCamera)
            .context("queue camera start")?;
    }
    if let Some(secs) = args.record_secs {
        spawn_scripted_capture(tx.clone(), Duration::from_secs(secs));
    }
    drop(tx);

    log::info!("live_detect running. commands: start, capture, save, quit");
    viewer.run(&mut scheduler, &rx, &shutdown)?;
    log::info!("live_detect stopped");
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<Control>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Control>() {
                Ok(control) => {
                    if tx.send(control).is_err() {
                        break;
                    }
                }
                Err(err) => eprintln!("{err}"),
            }
        }
    });
}

fn spawn_scripted_capture(tx: Sender<Control>, length: Duration) {
    std::thread::spawn(move || {
        std::thread::sleep(CAPTURE_WARMUP);
        let script = [
            (Duration::ZERO, Control::ToggleCapture),
            (length, Control::ToggleCapture),
            (Duration::ZERO, Control::Save),
            (Duration::ZERO, Control::Quit),
        ];
        for (delay, control) in script {
            std::thread::sleep(delay);
            if tx.send(control).is_err() {
                return;
            }
        }
    });
}
