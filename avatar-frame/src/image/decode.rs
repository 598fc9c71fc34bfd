//! Image decoding, from raw bytes or base64 data URLs

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use imageproc::image::load_from_memory;

use super::SourceImage;
use crate::error::{Error, Result};

/// Standard alphabet, `=` padding optional
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DATA_URL_MARKER: &str = "base64,";

/// Decode image from memory
pub fn decode(data: &[u8]) -> Result<SourceImage> {
    let image = load_from_memory(data).map_err(Error::Decode)?;
    Ok(SourceImage::new(image))
}

/// Strip a `data:image/...;base64,` prefix if present
pub fn data_url_payload(data_url: &str) -> &str {
    data_url
        .split_once(DATA_URL_MARKER)
        .map_or(data_url, |(_, payload)| payload)
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(LENIENT_BASE64.decode(cleaned)?)
}

/// Decode a data URL or bare base64 string into an image
pub fn decode_data_url(data_url: &str) -> Result<SourceImage> {
    let bytes = decode_base64(data_url_payload(data_url))?;
    log::trace!("Decoded {} bytes of base64 image data", bytes.len());
    decode(&bytes)
}
