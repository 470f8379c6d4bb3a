use crate::utils::error::ClassifyError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbImage};

/// Filename extensions accepted by the upload endpoints.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

pub struct ImageLoader;

impl ImageLoader {
    /// Decode raw bytes in any container format the `image` crate recognizes.
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(ClassifyError::UnsupportedImage(
                "empty image data".to_string(),
            ));
        }

        if Self::detect_format(bytes).is_none() {
            return Err(ClassifyError::UnsupportedImage(
                "unrecognized image format".to_string(),
            ));
        }

        let image = image::load_from_memory(bytes)?;
        Ok(image)
    }

    /// Decode a base64 payload, optionally wrapped in a data URL
    /// (`data:image/png;base64,...`), and return the raw bytes.
    pub fn decode_base64(base64_data: &str, max_size: usize) -> Result<Vec<u8>> {
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        if image_bytes.len() > max_size {
            return Err(ClassifyError::FileTooLarge(image_bytes.len(), max_size));
        }

        Ok(image_bytes)
    }

    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// Checks an upload filename against [`ALLOWED_EXTENSIONS`].
    pub fn is_allowed_filename(filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| {
                let ext = ext.to_ascii_lowercase();
                ALLOWED_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// Collapse any color layout to 8-bit RGB. Alpha is dropped and
    /// grayscale is replicated across the three channels.
    pub fn to_rgb(image: DynamicImage) -> RgbImage {
        match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        }
    }
}
