//! Photo normalization and frame compositing

mod decode;
mod encode;
mod transform;

// Re-export public API
pub use decode::{data_url_payload, decode, decode_base64, decode_data_url};
pub use encode::{compress_to_jpeg, encode_base64, encode_jpeg};

use imageproc::image::{ColorType, DynamicImage, GenericImageView, RgbImage};

use crate::error::Result;
use crate::frame::{FrameAsset, FrameCatalog, FrameKind};

/// Color mode of a decoded upload. Bit depth is ignored: 16-bit and float
/// images fold into the matching 8-bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Luma,
    LumaAlpha,
    Rgb,
    Rgba,
}

impl ColorMode {
    pub fn has_alpha(self) -> bool {
        matches!(self, ColorMode::LumaAlpha | ColorMode::Rgba)
    }
}

impl From<ColorType> for ColorMode {
    fn from(color: ColorType) -> Self {
        match color {
            ColorType::L8 | ColorType::L16 => ColorMode::Luma,
            ColorType::La8 | ColorType::La16 => ColorMode::LumaAlpha,
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => ColorMode::Rgb,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => ColorMode::Rgba,
            other if other.has_alpha() => ColorMode::Rgba,
            _ => ColorMode::Rgb,
        }
    }
}

/// A decoded upload, alive for one request
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    mode: ColorMode,
}

impl SourceImage {
    pub fn new(image: DynamicImage) -> Self {
        let mode = image.color().into();
        SourceImage { image, mode }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Flatten transparency onto white; opaque images pass through as RGB.
///
/// Palette PNGs are expanded by the decoder, so a palette with a tRNS chunk
/// arrives here as RGBA and takes the flattening path.
pub fn normalize(source: &SourceImage) -> RgbImage {
    if source.mode.has_alpha() {
        log::trace!("Flattening {:?} image onto white", source.mode);
        transform::flatten_onto(&source.image.to_rgba8(), transform::WHITE)
    } else {
        source.image.to_rgb8()
    }
}

/// Final framed image, always exactly the configured output size
#[derive(Debug, Clone)]
pub struct CompositeResult {
    image: RgbImage,
    frame: FrameKind,
}

impl CompositeResult {
    pub fn frame(&self) -> FrameKind {
        self.frame
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        encode::encode_jpeg(&self.image, quality)
    }
}

/// Lays a frame asset over a normalized photo.
///
/// Holds no mutable state and caches nothing, so one instance can serve
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct Compositor {
    output_size: (u32, u32),
    frames: FrameCatalog,
}

impl Compositor {
    pub fn new(output_size: (u32, u32), frames: FrameCatalog) -> Self {
        Compositor {
            output_size,
            frames,
        }
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn frames(&self) -> &FrameCatalog {
        &self.frames
    }

    /// Composite `source` (already normalized) with the `kind` frame.
    ///
    /// The source is stretched to the output size, not cropped, so
    /// non-square photos are distorted.
    pub fn composite(&self, source: &RgbImage, kind: FrameKind) -> Result<CompositeResult> {
        let path = self.frames.path(kind)?;
        let frame = FrameAsset::load(kind, path)?;

        let target = self.output_size;
        let (width, height) = target;

        let mut canvas = RgbImage::from_pixel(width, height, transform::WHITE);

        let resized = transform::resize_rgb(source, target)?;
        transform::paste(&mut canvas, &resized);

        if frame.has_alpha() {
            let overlay = transform::resize_rgba(&frame.image().to_rgba8(), target)?;
            transform::paste_masked(&mut canvas, &overlay);
        } else {
            let overlay = transform::resize_rgb(&frame.image().to_rgb8(), target)?;
            transform::paste(&mut canvas, &overlay);
        }

        log::debug!(
            "Composited {}x{} source with {kind} frame into {width}x{height}",
            source.width(),
            source.height()
        );

        Ok(CompositeResult {
            image: canvas,
            frame: kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{ImageFormat, LumaA, Rgb, Rgba, RgbaImage};
    use std::path::Path;

    /// Opaque blue 8px border, fully transparent inside
    fn write_ring_frame(path: &Path, size: u32) {
        let mut frame = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0]));
        for (x, y, px) in frame.enumerate_pixels_mut() {
            if x < 8 || y < 8 || x >= size - 8 || y >= size - 8 {
                *px = Rgba([0, 0, 255, 255]);
            }
        }
        frame.save_with_format(path, ImageFormat::Png).unwrap();
    }

    fn compositor_in(dir: &Path) -> Compositor {
        Compositor::new((1024, 1024), FrameCatalog::in_dir(dir))
    }

    #[test]
    fn color_modes() {
        assert_eq!(ColorMode::from(ColorType::La16), ColorMode::LumaAlpha);
        assert_eq!(ColorMode::from(ColorType::Rgb32F), ColorMode::Rgb);
        assert!(ColorMode::Rgba.has_alpha());
        assert!(!ColorMode::Luma.has_alpha());
    }

    #[test]
    fn normalize_luma_alpha() {
        let mut img = imageproc::image::GrayAlphaImage::from_pixel(2, 2, LumaA([0, 255]));
        img.put_pixel(1, 1, LumaA([0, 0]));
        let source = SourceImage::new(DynamicImage::ImageLumaA8(img));
        assert_eq!(source.mode(), ColorMode::LumaAlpha);

        let flat = normalize(&source);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(flat.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn normalize_opaque_passes_through() {
        let img = RgbImage::from_pixel(5, 3, Rgb([1, 2, 3]));
        let source = SourceImage::new(DynamicImage::ImageRgb8(img.clone()));
        assert_eq!(normalize(&source), img);
    }

    #[test]
    fn output_is_always_output_size() {
        let dir = tempfile::tempdir().unwrap();
        write_ring_frame(&dir.path().join("avatar-participant.png"), 300);
        let compositor = compositor_in(dir.path());

        for (w, h) in [(1, 1), (640, 480), (200, 1500), (1024, 1024)] {
            let source = RgbImage::from_pixel(w, h, Rgb([10, 200, 10]));
            let result = compositor
                .composite(&source, FrameKind::Participant)
                .unwrap();
            assert_eq!(result.dimensions(), (1024, 1024));
            assert_eq!(result.frame(), FrameKind::Participant);
        }
    }

    #[test]
    fn frame_over_photo() {
        let dir = tempfile::tempdir().unwrap();
        write_ring_frame(&dir.path().join("avatar-organizer.png"), 1024);
        let compositor = compositor_in(dir.path());

        let source = RgbImage::from_pixel(512, 512, Rgb([200, 0, 0]));
        let result = compositor.composite(&source, FrameKind::Organizer).unwrap();
        let img = result.image();

        // border comes from the frame, center shows the photo
        assert_eq!(img.get_pixel(2, 2), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(512, 512), &Rgb([200, 0, 0]));
    }

    #[test]
    fn transparent_source_region_is_white_under_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_ring_frame(&dir.path().join("avatar-participant.png"), 1024);
        let compositor = compositor_in(dir.path());

        let source = SourceImage::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            256,
            256,
            Rgba([0, 0, 0, 0]),
        )));
        let result = compositor
            .composite(&normalize(&source), FrameKind::Participant)
            .unwrap();

        assert_eq!(result.image().get_pixel(512, 512), &Rgb([255, 255, 255]));
    }

    #[test]
    fn opaque_frame_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(64, 64, Rgb([9, 9, 9]))
            .save_with_format(dir.path().join("avatar-participant.png"), ImageFormat::Png)
            .unwrap();
        let compositor = compositor_in(dir.path());

        let source = RgbImage::from_pixel(64, 64, Rgb([200, 0, 0]));
        let result = compositor
            .composite(&source, FrameKind::Participant)
            .unwrap();
        assert_eq!(result.image().get_pixel(512, 512), &Rgb([9, 9, 9]));
    }

    #[test]
    fn deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_ring_frame(&dir.path().join("avatar-participant.png"), 500);
        let compositor = compositor_in(dir.path());

        let mut source = RgbImage::new(333, 217);
        for (x, y, px) in source.enumerate_pixels_mut() {
            *px = Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8]);
        }

        let a = compositor
            .composite(&source, FrameKind::Participant)
            .unwrap()
            .encode_jpeg(95)
            .unwrap();
        let b = compositor
            .composite(&source, FrameKind::Participant)
            .unwrap()
            .encode_jpeg(95)
            .unwrap();
        assert_eq!(a, b);

        assert_eq!(
            imageproc::image::guess_format(&a).unwrap(),
            ImageFormat::Jpeg
        );
        let decoded = imageproc::image::load_from_memory(&a).unwrap();
        assert_eq!(decoded.dimensions(), (1024, 1024));
    }

    #[test]
    fn missing_frame_asset_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = compositor_in(dir.path());
        let source = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        assert!(matches!(
            compositor.composite(&source, FrameKind::Organizer),
            Err(crate::Error::MissingFrameAsset(_))
        ));
    }
}
