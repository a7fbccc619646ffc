use std::sync::Mutex;
use std::time::Duration;

use tempfile::Builder;

use live_detect::config::ViewerConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LIVE_DETECT_CONFIG",
        "LIVE_DETECT_DEVICE",
        "LIVE_DETECT_BACKEND",
        "LIVE_DETECT_MODEL",
        "LIVE_DETECT_OUTPUT_DIR",
        "LIVE_DETECT_SNAPSHOT",
        "LIVE_DETECT_CONSTRAINED",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    let json = r##"{
        "camera": {
            "device": "/dev/video2",
            "rear_device": "/dev/video3",
            "width": 1280,
            "height": 720
        },
        "model": {
            "backend": "tract",
            "path": "models/yolov8n.onnx",
            "confidence_threshold": 0.4
        },
        "recording": {
            "fallback_format": "video/x-motion-jpeg",
            "timeslice_ms": 250
        },
        "render": {
            "palette": ["#112233", "#445566"]
        }
    }"##;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("LIVE_DETECT_CONFIG", file.path());
    std::env::set_var("LIVE_DETECT_DEVICE", "stub://override");
    std::env::set_var("LIVE_DETECT_OUTPUT_DIR", "/tmp/recordings");
    std::env::set_var("LIVE_DETECT_CONSTRAINED", "yes");

    let cfg = ViewerConfig::load().expect("load config");

    assert_eq!(cfg.camera.device, "stub://override");
    assert_eq!(cfg.camera.rear_device.as_deref(), Some("/dev/video3"));
    assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 720));
    assert!(cfg.camera.constrained_platform);
    assert_eq!(cfg.model.backend, "tract");
    assert_eq!(
        cfg.model.path.as_deref(),
        Some(std::path::Path::new("models/yolov8n.onnx"))
    );
    assert_eq!(cfg.model.confidence_threshold, 0.4);
    assert_eq!(cfg.model.iou_threshold, 0.45);
    assert_eq!(cfg.recording.primary_format, "video/mp4; codecs=avc1");
    assert_eq!(cfg.recording.fallback_format, "video/x-motion-jpeg");
    assert_eq!(cfg.recording.timeslice, Duration::from_millis(250));
    assert_eq!(cfg.recording.capture_fps, 30);
    assert_eq!(
        cfg.recording.output_dir,
        std::path::PathBuf::from("/tmp/recordings")
    );
    assert_eq!(cfg.render.palette, vec!["#112233", "#445566"]);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
        [camera]
        device = "stub://bench"
        fps = 15

        [display]
        width = 320
        height = 240
        refresh_hz = 30
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = ViewerConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!(cfg.camera.fps, 15);
    assert_eq!(cfg.display.width, Some(320));
    assert_eq!(cfg.display.height, Some(240));
    assert_eq!(cfg.display.refresh_hz, 30);
    assert_eq!(cfg.model.backend, "stub");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "recording": { "capture_fps": 0 } }"#)
        .expect("write config");
    assert!(ViewerConfig::load_from(Some(file.path())).is_err());

    std::env::set_var("LIVE_DETECT_CONSTRAINED", "sometimes");
    assert!(ViewerConfig::load_from(None).is_err());

    clear_env();
}
