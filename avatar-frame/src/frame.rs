//! Frame variants and the assets backing them

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use imageproc::image::{self, DynamicImage, GenericImageView, ImageError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::{Error, Result};

#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FrameKind {
    #[default]
    Participant,
    Organizer,
}

impl FrameKind {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }

    /// File name of the bundled asset for this variant
    pub fn default_file_name(self) -> &'static str {
        match self {
            FrameKind::Participant => "avatar-participant.png",
            FrameKind::Organizer => "avatar-organizer.png",
        }
    }

    /// Name offered to the browser for the generated download
    pub fn download_name(self) -> String {
        format!("devfest_{self}_frame.jpg")
    }
}

impl TryFrom<&str> for FrameKind {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        match s {
            "participant" => Ok(FrameKind::Participant),
            "organizer" => Ok(FrameKind::Organizer),
            _ => Err(Error::UnknownFrameVariant(s.to_string())),
        }
    }
}

impl FromStr for FrameKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_from(s)
    }
}

/// Fixed mapping from frame variant to the PNG on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameCatalog(BTreeMap<FrameKind, PathBuf>);

impl FrameCatalog {
    /// Default asset paths for every variant under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        FrameCatalog(
            FrameKind::iter()
                .map(|kind| (kind, dir.join(kind.default_file_name())))
                .collect(),
        )
    }

    pub fn empty() -> Self {
        FrameCatalog(BTreeMap::new())
    }

    pub fn insert(&mut self, kind: FrameKind, path: impl Into<PathBuf>) {
        self.0.insert(kind, path.into());
    }

    pub fn path(&self, kind: FrameKind) -> Result<&Path> {
        self.0
            .get(&kind)
            .map(PathBuf::as_path)
            .ok_or(Error::UnmappedFrame(kind))
    }

    /// Override entries from `other`, keep the rest
    pub fn merge(&mut self, other: FrameCatalog) {
        self.0.extend(other.0);
    }

    /// Resolve a variant name as sent by a client
    pub fn resolve(&self, name: &str) -> Result<(FrameKind, &Path)> {
        let kind = FrameKind::try_from(name)?;
        Ok((kind, self.path(kind)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameKind, &Path)> {
        self.0.iter().map(|(kind, path)| (*kind, path.as_path()))
    }
}

impl Default for FrameCatalog {
    fn default() -> Self {
        Self::in_dir("static")
    }
}

/// A decorative frame loaded from disk. Never cached: each composite reads
/// the file again.
#[derive(Debug, Clone)]
pub struct FrameAsset {
    kind: FrameKind,
    image: DynamicImage,
}

impl FrameAsset {
    pub fn load(kind: FrameKind, path: &Path) -> Result<Self> {
        let image = image::open(path).map_err(|e| match e {
            ImageError::IoError(io) if io.kind() == io::ErrorKind::NotFound => {
                Error::MissingFrameAsset(path.to_path_buf())
            }
            source => Error::FrameDecode {
                path: path.to_path_buf(),
                source,
            },
        })?;

        log::debug!(
            "Loaded {kind} frame from {} ({:?}, {}x{})",
            path.display(),
            image.color(),
            image.width(),
            image.height()
        );

        Ok(FrameAsset { kind, image })
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}
