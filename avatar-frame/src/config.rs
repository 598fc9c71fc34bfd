use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::frame::FrameCatalog;

pub const DEFAULT_OUTPUT_SIZE: (u32, u32) = (1024, 1024);
pub const DEFAULT_QUALITY: u8 = 95;
// 16 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Everything the compositor needs, built once at startup and handed to
/// [`crate::Framer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    pub output_size: (u32, u32),
    // JPEG quality: 1-100
    pub quality: u8,
    pub max_upload_bytes: usize,
    pub allowed_extensions: Vec<String>,
    // Entries given in the file override the defaults one by one
    #[serde(deserialize_with = "merge_frames")]
    pub frames: FrameCatalog,
}

fn merge_frames<'de, D>(deserializer: D) -> std::result::Result<FrameCatalog, D::Error>
where
    D: Deserializer<'de>,
{
    let mut frames = FrameCatalog::default();
    frames.merge(FrameCatalog::deserialize(deserializer)?);
    Ok(frames)
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            output_size: DEFAULT_OUTPUT_SIZE,
            quality: DEFAULT_QUALITY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: ["png", "jpg", "jpeg"].map(String::from).to_vec(),
            frames: FrameCatalog::default(),
        }
    }
}

impl FramerConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path.as_ref(), json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Point every frame variant at its default file name under `dir`
    pub fn with_static_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.frames = FrameCatalog::in_dir(dir);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.output_size;
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "output size must be non-zero, got {width}x{height}"
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(Error::Config(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        if self.allowed_extensions.is_empty() {
            return Err(Error::Config("no allowed file extensions".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;

    #[test]
    fn defaults() {
        let config = FramerConfig::default();
        assert_eq!(config.output_size, (1024, 1024));
        assert_eq!(config.quality, 95);
        assert_eq!(config.max_upload_bytes, 16_777_216);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"quality": 80, "frames": {"organizer": "/srv/frames/org.png"}}"#,
        )
        .unwrap();

        let config = FramerConfig::load(&path).unwrap();
        assert_eq!(config.quality, 80);
        assert_eq!(config.output_size, DEFAULT_OUTPUT_SIZE);
        assert_eq!(
            config.frames.path(FrameKind::Organizer).unwrap(),
            Path::new("/srv/frames/org.png")
        );
        assert_eq!(
            config.frames.path(FrameKind::Participant).unwrap(),
            Path::new("static/avatar-participant.png")
        );
    }

    #[test]
    fn rejects_bad_values() {
        let config = FramerConfig {
            quality: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = FramerConfig {
            output_size: (0, 1024),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = FramerConfig::default().with_static_dir(dir.path());
        config.save(&path).unwrap();
        assert_eq!(FramerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn unreadable_config() {
        let err = FramerConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
