use tracing::warn;

use crate::model::constants::CHANNELS;

/// Converts a flat NHWC buffer of `[-1, 1]` floats back to an RGB image.
///
/// Returns `None` when the buffer length does not match the requested
/// dimensions.
pub fn nhwc_to_image(data: &[f32], height: usize, width: usize) -> Option<image::DynamicImage> {
    let expected_len = width * height * CHANNELS;
    if data.len() != expected_len {
        warn!(
            expected = expected_len,
            got = data.len(),
            "mismatched pixel buffer length"
        );
        return None;
    }

    let raw_pixels: Vec<u8> = data
        .iter()
        .map(|&val| {
            // Reversing the normalization: (val + 1.0) * 127.5
            let denormalized = (val + 1.0) * 127.5;
            denormalized.clamp(0.0, 255.0) as u8
        })
        .collect();

    let img_buf = image::ImageBuffer::<image::Rgb<u8>, Vec<u8>>::from_raw(
        width as u32,
        height as u32,
        raw_pixels,
    )?;

    Some(image::DynamicImage::ImageRgb8(img_buf))
}
