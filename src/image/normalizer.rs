//! Raw bytes to model input tensor.
//!
//! The model was trained on RGB images scaled to `[0, 1]` in NHWC layout,
//! so every input goes through exactly the same decode, RGB conversion,
//! bilinear resize and scaling steps.

use crate::config::InputSize;
use crate::image::ImageLoader;
use crate::utils::error::ClassifyError;
use crate::Result;
use image::imageops::{self, FilterType};
use ndarray::{Array4, ArrayView4};

/// Resize filter applied on every call. Triangle is bilinear interpolation.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// `(1, H, W, 3)` f32 tensor, RGB, values in `[0.0, 1.0]`.
///
/// Owns its buffer and exposes no mutable access.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// `(height, width)` of the spatial dimensions.
    pub fn spatial_size(&self) -> InputSize {
        InputSize::new(self.0.shape()[1], self.0.shape()[2])
    }
}

pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn normalize(raw_bytes: &[u8], target_size: InputSize) -> Result<ImageTensor> {
        if target_size.height == 0 || target_size.width == 0 {
            return Err(ClassifyError::UnknownInference(format!(
                "invalid target size {target_size}"
            )));
        }

        let image = ImageLoader::from_bytes(raw_bytes)?;
        tracing::debug!(
            "Decoded image {}x{} ({:?}), resizing to {}",
            image.width(),
            image.height(),
            image.color(),
            target_size
        );

        let rgb = ImageLoader::to_rgb(image);
        let (height, width) = (target_size.height, target_size.width);
        let resized = imageops::resize(&rgb, width as u32, height as u32, RESIZE_FILTER);

        let data: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|value| value as f32 / 255.0)
            .collect();

        let tensor = Array4::from_shape_vec((1, height, width, 3), data).map_err(|e| {
            ClassifyError::UnknownInference(format!("tensor shape error: {e}"))
        })?;

        Ok(ImageTensor(tensor))
    }
}
