use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, imageops::FilterType, ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::ArrayD;

use crate::config::OverlayConfig;

pub type ProbabilityMask = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Segmentation output shape {0:?} is not a single-channel 2-D mask")]
    MaskShape(Vec<usize>),
    #[error("Failed to encode overlay: {0}")]
    Encode(#[from] image::ImageError),
}

/// Squeezes a segmentation output such as `(1, H, W, 1)` or `(1, 1, H, W)` into an `H×W` mask.
pub fn mask_from_output(output: &ArrayD<f32>) -> Result<ProbabilityMask, OverlayError> {
    let dims: Vec<usize> = output.shape().iter().copied().filter(|&d| d != 1).collect();
    let (height, width) = match dims.as_slice() {
        [h, w] if *h > 0 && *w > 0 => (*h, *w),
        _ => return Err(OverlayError::MaskShape(output.shape().to_vec())),
    };
    let data: Vec<f32> = output.iter().copied().collect();
    ImageBuffer::from_raw(width as u32, height as u32, data)
        .ok_or_else(|| OverlayError::MaskShape(output.shape().to_vec()))
}

/// Blends the configured colour over every pixel whose mask probability reaches the threshold.
/// The mask is resized to the image's resolution first.
pub fn render_overlay(
    image: &RgbImage,
    mask: &ProbabilityMask,
    config: &OverlayConfig,
) -> RgbImage {
    let (width, height) = image.dimensions();
    let mask = if mask.dimensions() == (width, height) {
        mask.clone()
    } else {
        imageops::resize(mask, width, height, FilterType::Triangle)
    };

    let alpha = config.alpha.clamp(0.0, 1.0);
    let color = config.color.map(f32::from);
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] < config.threshold {
            continue;
        }
        let Rgb(channels) = *pixel;
        let blended: [u8; 3] = std::array::from_fn(|c| {
            let v = (1.0 - alpha) * f32::from(channels[c]) + alpha * color[c];
            v.round().clamp(0.0, 255.0) as u8
        });
        *pixel = Rgb(blended);
    }
    out
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, OverlayError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(bytes)
}

/// JPEG-encodes the overlay and wraps it in standard base64 for embedding in JSON.
pub fn encode_overlay(image: &RgbImage, quality: u8) -> Result<String, OverlayError> {
    let jpeg = encode_jpeg(image, quality)?;
    Ok(STANDARD.encode(jpeg))
}
