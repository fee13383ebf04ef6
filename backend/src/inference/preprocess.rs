//! Image decoding and tensor preparation.
//!
//! Every model in the service consumes a batch-of-one NHWC tensor with values in
//! `[0, 1]`. Images are stretched to the target size with a triangle (bilinear)
//! filter and never cropped. The filter is linear, so scaling by `1/255` before
//! the resize yields the same values as resizing the raw `[0, 255]` range.

use image::{imageops, imageops::FilterType, DynamicImage, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

/// Decodes uploaded bytes into an RGB pixel grid. Grayscale and alpha inputs are
/// converted, so the result always has three channels.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    Ok(into_rgb(image))
}

pub fn into_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        // luma is replicated across the three channels
        other => other.to_rgb8(),
    }
}

/// Resizes to `size`×`size`, scales to `[0, 1]` and adds the batch axis.
///
/// Output shape is `(1, size, size, 3)`.
pub fn preprocess(image: &RgbImage, size: u32) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let scaled: ImageBuffer<Rgb<f32>, Vec<f32>> = ImageBuffer::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgb([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
    });
    let resized = if (width, height) == (size, size) {
        scaled
    } else {
        imageops::resize(&scaled, size, size, FilterType::Triangle)
    };

    let side = size as usize;
    Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c].clamp(0.0, 1.0)
    })
}
