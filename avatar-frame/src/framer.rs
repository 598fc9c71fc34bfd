//! Request-level operations: the upload preview and the framed download

use std::path::Path;

use imageproc::image;

use crate::config::FramerConfig;
use crate::error::{Error, Result};
use crate::frame::FrameKind;
use crate::image::{
    decode, decode_data_url, encode_base64, encode_jpeg, normalize, Compositor, SourceImage,
};
use crate::upload::check_filename;

/// A framed JPEG ready to send
#[derive(Debug, Clone)]
pub struct Generated {
    pub frame: FrameKind,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Owns the configuration and a compositor built from it.
///
/// Shared read-only between requests; every call allocates its own buffers.
#[derive(Debug, Clone)]
pub struct Framer {
    config: FramerConfig,
    compositor: Compositor,
}

impl Framer {
    pub fn new(config: FramerConfig) -> Result<Self> {
        config.validate()?;
        let compositor = Compositor::new(config.output_size, config.frames.clone());
        Ok(Framer { config, compositor })
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Validate an uploaded file and return it as a base64 JPEG with any
    /// transparency flattened onto white.
    pub fn prepare_upload(&self, filename: &str, data: &[u8]) -> Result<String> {
        check_filename(filename, &self.config.allowed_extensions)?;

        let source = decode(data)?;
        log::debug!(
            "Upload `{filename}`: {:?} {}x{}",
            source.mode(),
            source.dimensions().0,
            source.dimensions().1
        );

        let jpeg = encode_jpeg(&normalize(&source), self.config.quality)?;
        Ok(encode_base64(&jpeg))
    }

    /// Frame a data URL (or bare base64) image. `frame_type` defaults to
    /// the participant frame.
    pub fn generate(&self, image_data: &str, frame_type: Option<&str>) -> Result<Generated> {
        let frame = match frame_type {
            Some(name) => self.config.frames.resolve(name)?.0,
            None => FrameKind::default(),
        };

        let source = decode_data_url(image_data)?;
        self.frame_source(&source, frame)
    }

    /// Frame an image file on disk
    pub fn compose_file(&self, input: &Path, frame: FrameKind) -> Result<Generated> {
        let source = SourceImage::new(image::open(input).map_err(Error::Decode)?);
        self.frame_source(&source, frame)
    }

    fn frame_source(&self, source: &SourceImage, frame: FrameKind) -> Result<Generated> {
        let normalized = normalize(source);
        let composite = self.compositor.composite(&normalized, frame)?;
        let data = composite.encode_jpeg(self.config.quality)?;

        Ok(Generated {
            frame,
            file_name: frame.download_name(),
            data,
        })
    }
}
