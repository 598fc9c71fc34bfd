//! Pixel work: flattening alpha, Lanczos resizing, masked pasting

use fast_image_resize as fr;
use fr::images::{Image as FrImage, ImageRef};
use imageproc::image::{imageops, Pixel, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{Error, Result};

pub(crate) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// `fg` over `bg` with coverage `alpha`, rounded to nearest
#[inline]
fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

#[inline]
fn over(fg: Rgba<u8>, bg: Rgb<u8>) -> Rgb<u8> {
    let alpha = fg[3];
    match alpha {
        255 => fg.to_rgb(),
        0 => bg,
        _ => Rgb([
            blend(fg[0], bg[0], alpha),
            blend(fg[1], bg[1], alpha),
            blend(fg[2], bg[2], alpha),
        ]),
    }
}

/// Flatten onto an opaque background of the same size, using the image's
/// own alpha as the mask
pub(super) fn flatten_onto(img: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut flat = RgbImage::from_pixel(width, height, background);
    paste_masked(&mut flat, img);
    flat
}

/// Paste `top` over `canvas` at the origin using `top`'s alpha as the mask.
/// Both images must have the same dimensions.
pub(super) fn paste_masked(canvas: &mut RgbImage, top: &RgbaImage) {
    debug_assert_eq!(canvas.dimensions(), top.dimensions());
    for (bg, fg) in canvas.pixels_mut().zip(top.pixels()) {
        *bg = over(*fg, *bg);
    }
}

/// Paste `top` over `canvas` at the origin, overwriting it
pub(super) fn paste(canvas: &mut RgbImage, top: &RgbImage) {
    imageops::replace(canvas, top, 0, 0);
}

/// Resize to exactly `target`, ignoring aspect ratio
pub(super) fn resize_rgb(img: &RgbImage, target: (u32, u32)) -> Result<RgbImage> {
    if img.dimensions() == target {
        return Ok(img.clone());
    }
    let (width, height) = target;
    let resized = lanczos(
        img.as_raw(),
        img.dimensions(),
        target,
        fr::PixelType::U8x3,
        3,
    )?;
    RgbImage::from_raw(width, height, resized)
        .ok_or_else(|| Error::Resize(format!("buffer too small for {width}x{height}")))
}

/// Resize to exactly `target`, ignoring aspect ratio. Alpha is
/// premultiplied during filtering so transparent pixels don't bleed color.
pub(super) fn resize_rgba(img: &RgbaImage, target: (u32, u32)) -> Result<RgbaImage> {
    if img.dimensions() == target {
        return Ok(img.clone());
    }
    let (width, height) = target;
    let resized = lanczos(
        img.as_raw(),
        img.dimensions(),
        target,
        fr::PixelType::U8x4,
        4,
    )?;
    RgbaImage::from_raw(width, height, resized)
        .ok_or_else(|| Error::Resize(format!("buffer too small for {width}x{height}")))
}

/// Resize straight out of the source buffer, no intermediate copy
fn lanczos(
    src_buffer: &[u8],
    (width, height): (u32, u32),
    (target_width, target_height): (u32, u32),
    pixel_type: fr::PixelType,
    channels: usize,
) -> Result<Vec<u8>> {
    let src_image = ImageRef::new(width, height, src_buffer, pixel_type)?;

    let mut dst_buffer = vec![0u8; target_width as usize * target_height as usize * channels];
    {
        let mut dst_image =
            FrImage::from_slice_u8(target_width, target_height, &mut dst_buffer, pixel_type)?;

        // Lanczos3 for both up- and downscaling
        let options =
            fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));
        let mut resizer = fr::Resizer::new();
        resizer.resize(&src_image, &mut dst_image, Some(&options))?;
    }

    Ok(dst_buffer)
}
