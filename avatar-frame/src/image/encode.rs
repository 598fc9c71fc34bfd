//! Image encoding: JPEG bytes and base64 text

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imageproc::image::codecs::jpeg::JpegEncoder;
use imageproc::image::RgbImage;

use crate::error::{Error, Result};

/// Compress an image to JPEG format with the specified quality
pub fn compress_to_jpeg<W>(img: &RgbImage, writer: &mut W, quality: u8) -> Result<()>
where
    W: std::io::Write,
{
    let mut encoder = JpegEncoder::new_with_quality(writer, quality);

    encoder.encode_image(img).map_err(Error::Encode)?;

    Ok(())
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    // JPEG output is usually well under a byte per pixel
    let mut buffer = Vec::with_capacity((width * height) as usize / 4);
    compress_to_jpeg(img, &mut buffer, quality)?;
    log::trace!("Encoded {width}x{height} JPEG, {} bytes", buffer.len());
    Ok(buffer)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{load_from_memory, ImageFormat, Rgb};

    #[test]
    fn jpeg_keeps_dimensions() {
        let img = RgbImage::from_pixel(40, 30, Rgb([200, 100, 50]));
        let bytes = encode_jpeg(&img, 95).unwrap();

        assert_eq!(
            imageproc::image::guess_format(&bytes).unwrap(),
            ImageFormat::Jpeg
        );
        let decoded = load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn base64_is_padded_standard() {
        assert_eq!(encode_base64(b"ab"), "YWI=");
    }
}
