use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use image::RgbaImage;

use live_detect::config::RecordingSettings;
use live_detect::record::format::{MJPEG_MIME, PRIMARY_MIME, WEBM_MIME};
use live_detect::record::{
    CapturePreconditions, EncoderHost, EncoderSettings, MediaEncoder, OutputFormat,
    RecorderEvent, RecordingController, RecordingState,
};

/// Emits one chunk per written frame; the chunk holds the frame's first byte.
struct ChunkPerFrame {
    events: Vec<RecorderEvent>,
    stopped: bool,
}

impl MediaEncoder for ChunkPerFrame {
    fn write_frame(&mut self, frame: &RgbaImage, _timestamp: Duration) -> Result<()> {
        self.events
            .push(RecorderEvent::DataAvailable(vec![frame.as_raw()[0]]));
        Ok(())
    }

    fn request_stop(&mut self) -> Result<()> {
        if !self.stopped {
            self.stopped = true;
            self.events.push(RecorderEvent::DataAvailable(Vec::new()));
            self.events.push(RecorderEvent::Stopped);
        }
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<RecorderEvent> {
        std::mem::take(&mut self.events)
    }
}

#[derive(Clone, Default)]
struct FakeEncoders {
    supported: Vec<&'static str>,
    created: Rc<RefCell<Vec<(String, EncoderSettings)>>>,
}

impl EncoderHost for FakeEncoders {
    fn is_format_supported(&self, mime_type: &str) -> bool {
        self.supported.contains(&mime_type)
    }

    fn create(
        &mut self,
        format: &OutputFormat,
        settings: EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>> {
        self.created
            .borrow_mut()
            .push((format.mime_type().to_string(), settings));
        Ok(Box::new(ChunkPerFrame {
            events: Vec::new(),
            stopped: false,
        }))
    }
}

fn ready() -> CapturePreconditions {
    CapturePreconditions {
        source_active: true,
        model_loaded: true,
    }
}

fn frame(value: u8) -> RgbaImage {
    RgbaImage::from_pixel(4, 4, image::Rgba([value, 0, 0, 255]))
}

#[test]
fn prefers_primary_format_when_supported() -> Result<()> {
    let encoders = FakeEncoders {
        supported: vec![PRIMARY_MIME],
        ..FakeEncoders::default()
    };
    let created = Rc::clone(&encoders.created);
    let mut controller =
        RecordingController::new(RecordingSettings::default(), Box::new(encoders));

    assert!(controller.start(ready(), (640, 480), Duration::ZERO)?);

    let created = created.borrow();
    assert_eq!(created[0].0, PRIMARY_MIME);
    assert_eq!(
        created[0].1,
        EncoderSettings {
            width: 640,
            height: 480,
            fps: 30,
            timeslice: Duration::from_millis(100),
        }
    );
    Ok(())
}

#[test]
fn falls_back_when_primary_is_unsupported() -> Result<()> {
    let settings = RecordingSettings {
        fallback_format: WEBM_MIME.to_string(),
        ..RecordingSettings::default()
    };
    let dir = tempfile::tempdir()?;
    let mut controller = RecordingController::new(settings, Box::new(FakeEncoders::default()));

    controller.start(ready(), (4, 4), Duration::ZERO)?;
    controller.capture(&frame(9), Duration::ZERO)?;
    controller.stop()?;

    let saved = controller.save(dir.path())?.expect("saved");
    assert_eq!(saved.file_name().and_then(|n| n.to_str()), Some("captured_video.webm"));
    assert_eq!(std::fs::read(saved)?, vec![9]);
    Ok(())
}

#[test]
fn chunks_are_assembled_in_order() -> Result<()> {
    let mut controller = RecordingController::new(
        RecordingSettings::default(),
        Box::new(FakeEncoders::default()),
    );
    controller.start(ready(), (4, 4), Duration::ZERO)?;

    let interval = Duration::from_secs(1) / 30;
    for (i, value) in [1u8, 2, 3].into_iter().enumerate() {
        controller.capture(&frame(value), interval * i as u32)?;
    }
    // Faster than the capture rate: dropped by the sampler.
    controller.capture(&frame(99), interval * 2 + Duration::from_millis(5))?;

    assert!(controller.stop()?);
    let blob = controller.finished_blob().expect("blob");
    assert_eq!(blob.bytes(), &[1, 2, 3]);
    assert_eq!(blob.mime_type(), RecordingSettings::default().fallback_format);
    Ok(())
}

#[test]
fn stopping_twice_finalizes_once() -> Result<()> {
    let mut controller = RecordingController::new(
        RecordingSettings::default(),
        Box::new(FakeEncoders::default()),
    );
    assert!(!controller.stop()?);

    controller.start(ready(), (4, 4), Duration::ZERO)?;
    assert_eq!(controller.state(), RecordingState::Recording);
    assert!(controller.stop()?);
    let finished = controller.finished_recording().cloned();
    assert!(!controller.stop()?);

    assert_eq!(controller.finished_recording().cloned(), finished);
    assert_eq!(controller.blobs().len(), 1);
    Ok(())
}

#[test]
fn empty_recording_yields_empty_blob() -> Result<()> {
    let settings = RecordingSettings {
        primary_format: MJPEG_MIME.to_string(),
        ..RecordingSettings::default()
    };
    let mut controller =
        RecordingController::new(settings, Box::new(live_detect::HostEncoders));
    controller.start(ready(), (4, 4), Duration::ZERO)?;
    controller.stop()?;

    let finished = controller.finished_recording().expect("finished").clone();
    assert_eq!(finished.size, 0);
    assert!(controller.blobs().get(&finished.url).is_some());
    Ok(())
}

#[test]
fn save_without_recording_is_a_no_op() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let controller = RecordingController::new(
        RecordingSettings::default(),
        Box::new(FakeEncoders::default()),
    );
    assert_eq!(controller.save(dir.path())?, None);
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}
