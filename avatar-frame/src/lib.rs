pub mod config;
pub mod error;
pub mod frame;
pub mod framer;
pub mod image;
pub mod upload;

// Re-export commonly used types
pub use config::FramerConfig;
pub use error::{Error, Result, Stage};
pub use frame::{FrameAsset, FrameCatalog, FrameKind};
pub use framer::{Framer, Generated};
pub use image::{ColorMode, CompositeResult, Compositor, SourceImage};
pub use upload::allowed_file;
