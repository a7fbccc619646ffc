//! Output container selection.

use anyhow::{anyhow, Result};
use std::fmt;

use super::encoder::EncoderHost;

pub const PRIMARY_MIME: &str = "video/mp4; codecs=avc1";
pub const WEBM_MIME: &str = "video/webm; codecs=vp9";
pub const MJPEG_MIME: &str = "video/x-motion-jpeg";

/// Base name of saved recordings; the extension follows the format.
pub const SAVED_FILE_STEM: &str = "captured_video";

/// Fallback used when the primary format is unavailable.
pub fn default_fallback_mime() -> &'static str {
    if cfg!(feature = "encode-ffmpeg") {
        WEBM_MIME
    } else {
        MJPEG_MIME
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Mp4,
    WebM,
    Mjpeg,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Mjpeg => "mjpeg",
        }
    }
}

/// A recording format: its MIME type and the container it maps to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    mime_type: String,
    container: Container,
}

impl OutputFormat {
    /// Parse a MIME type such as `video/webm; codecs=vp9`.
    pub fn parse(mime_type: &str) -> Result<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let container = match essence.as_str() {
            "video/mp4" => Container::Mp4,
            "video/webm" => Container::WebM,
            "video/x-motion-jpeg" => Container::Mjpeg,
            _ => return Err(anyhow!("unsupported recording format '{}'", mime_type)),
        };
        Ok(Self {
            mime_type: mime_type.trim().to_string(),
            container,
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }

    /// Value of the `codecs` parameter, if present.
    pub fn codec(&self) -> Option<&str> {
        self.mime_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key.trim().eq_ignore_ascii_case("codecs"))
                .then(|| value.trim().trim_matches('"'))
        })
    }

    /// `captured_video.<ext>`
    pub fn file_name(&self) -> String {
        format!("{}.{}", SAVED_FILE_STEM, self.extension())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mime_type)
    }
}

/// Primary format if the host can encode it, otherwise the fallback.
pub fn choose_format(primary: &str, fallback: &str, host: &dyn EncoderHost) -> Result<OutputFormat> {
    if host.is_format_supported(primary) {
        return OutputFormat::parse(primary);
    }
    log::info!("recording: {} unsupported, falling back to {}", primary, fallback);
    OutputFormat::parse(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_container_and_codec() -> Result<()> {
        let mp4 = OutputFormat::parse(PRIMARY_MIME)?;
        assert_eq!(mp4.container(), Container::Mp4);
        assert_eq!(mp4.codec(), Some("avc1"));
        assert_eq!(mp4.file_name(), "captured_video.mp4");

        let webm = OutputFormat::parse(WEBM_MIME)?;
        assert_eq!(webm.extension(), "webm");
        assert_eq!(webm.codec(), Some("vp9"));

        let mjpeg = OutputFormat::parse(MJPEG_MIME)?;
        assert_eq!(mjpeg.codec(), None);
        assert_eq!(mjpeg.file_name(), "captured_video.mjpeg");
        Ok(())
    }

    #[test]
    fn rejects_unknown_containers() {
        assert!(OutputFormat::parse("audio/ogg").is_err());
    }
}
