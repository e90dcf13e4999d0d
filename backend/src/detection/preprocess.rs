use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use ndarray::Array4;

use super::{BoundingBox, DetectionError};

/// A decoded image resized to the model's square input, plus the factors
/// needed to map boxes back onto the original picture.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub tensor: Array4<f32>,
    pub original_width: u32,
    pub original_height: u32,
    pub input_size: u32,
}

impl PreparedImage {
    /// Maps a box in model-input pixels back to original image pixels.
    pub fn rescale(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        let sx = self.original_width as f32 / self.input_size as f32;
        let sy = self.original_height as f32 / self.input_size as f32;
        let x = (x1.min(x2) * sx).max(0.0);
        let y = (y1.min(y2) * sy).max(0.0);
        BoundingBox {
            x,
            y,
            width: ((x1 - x2).abs() * sx).min(self.original_width as f32 - x),
            height: ((y1 - y2).abs() * sy).min(self.original_height as f32 - y),
        }
    }
}

/// Rejects anything that is not a non-empty JPEG or PNG within the upload bound.
pub fn validate(bytes: &[u8], max_bytes: usize) -> Result<ImageFormat, DetectionError> {
    if bytes.is_empty() {
        return Err(DetectionError::InvalidImage("empty image payload".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(DetectionError::InvalidImage(format!(
            "image is {} bytes, limit is {} bytes",
            bytes.len(),
            max_bytes
        )));
    }
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => Ok(format),
        Ok(other) => Err(DetectionError::InvalidImage(format!(
            "unsupported image format {:?}, expected JPEG or PNG",
            other
        ))),
        Err(_) => Err(DetectionError::InvalidImage(
            "unrecognized image format".to_string(),
        )),
    }
}

pub fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, DetectionError> {
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DetectionError::InvalidImage(format!("failed to decode image: {}", e)))
}

/// Builds a `[1, 3, size, size]` tensor in CHW order with values in `[0, 1]`.
pub fn prepare(image: &DynamicImage, input_size: u32) -> PreparedImage {
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, input_size, input_size, FilterType::Triangle);
    let side = input_size as usize;
    let tensor = Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });
    PreparedImage {
        tensor,
        original_width: rgb.width(),
        original_height: rgb.height(),
        input_size,
    }
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(color));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
