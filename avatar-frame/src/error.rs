//! Error types for decoding, compositing and encoding

use std::path::PathBuf;

use imageproc::image::ImageError;
use thiserror::Error;

use crate::frame::FrameKind;

/// Result type alias for framing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a photo into a framed avatar
#[derive(Error, Debug)]
pub enum Error {
    /// The request carried no file at all
    #[error("no file uploaded")]
    MissingFile,

    /// A file part was present but its filename was empty
    #[error("no file selected")]
    EmptyFilename,

    /// The filename extension is not one of the allowed image types
    #[error("invalid file type: {0}")]
    InvalidExtension(String),

    #[error("invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The bytes could not be decoded as an image
    #[error("failed to decode image: {0}")]
    Decode(#[source] ImageError),

    #[error("frame not found: {0}")]
    UnknownFrameVariant(String),

    /// The variant is valid but the catalog has no path for it
    #[error("no asset configured for the {0} frame")]
    UnmappedFrame(FrameKind),

    /// The frame variant is known but its asset is not on disk
    #[error("frame asset missing: {}", .0.display())]
    MissingFrameAsset(PathBuf),

    #[error("failed to load frame asset {}: {source}", path.display())]
    FrameDecode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("failed to encode image: {0}")]
    Encode(#[source] ImageError),

    /// Invalid or unreadable configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Where in the pipeline an error happened.
///
/// The HTTP boundary maps each stage to a status code and a short message
/// so internals never leak to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Bad request data: missing file, wrong extension, unknown frame
    Input,
    /// Decoding or normalizing the user's image
    Processing,
    /// Loading the frame asset or compositing
    Compositing,
    Encoding,
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::MissingFile
            | Error::EmptyFilename
            | Error::InvalidExtension(_)
            | Error::UnknownFrameVariant(_) => Stage::Input,
            Error::InvalidBase64(_) | Error::Decode(_) => Stage::Processing,
            Error::UnmappedFrame(_)
            | Error::MissingFrameAsset(_)
            | Error::FrameDecode { .. }
            | Error::Resize(_) => Stage::Compositing,
            Error::Encode(_) => Stage::Encoding,
            Error::Config(_) => Stage::Input,
        }
    }
}

impl From<fast_image_resize::ResizeError> for Error {
    fn from(err: fast_image_resize::ResizeError) -> Self {
        Error::Resize(err.to_string())
    }
}

impl From<fast_image_resize::ImageBufferError> for Error {
    fn from(err: fast_image_resize::ImageBufferError) -> Self {
        Error::Resize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages() {
        assert_eq!(Error::MissingFile.stage(), Stage::Input);
        assert_eq!(
            Error::UnknownFrameVariant("sponsor".into()).stage(),
            Stage::Input
        );
        assert_eq!(
            Error::MissingFrameAsset(PathBuf::from("static/nope.png")).stage(),
            Stage::Compositing
        );
        assert_eq!(Error::Resize("zero".into()).stage(), Stage::Compositing);
        assert_eq!(
            Error::UnmappedFrame(FrameKind::Participant).stage(),
            Stage::Compositing
        );
    }

    #[test]
    fn unknown_frame_message() {
        let err = Error::UnknownFrameVariant("sponsor".into());
        assert_eq!(err.to_string(), "frame not found: sponsor");
    }
}
