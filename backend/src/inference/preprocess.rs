use image::DynamicImage;
use image::imageops::{self, FilterType};
use ndarray::Array4;
use tch::{Device, Tensor};

use super::InferenceError;

pub const INPUT_SIZE: u32 = 224;

/// ImageNet statistics the backbones were trained with, in R, G, B order.
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A normalized NCHW batch of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    data: Array4<f32>,
}

impl PreparedImage {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    #[cfg(test)]
    pub fn view(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn to_tensor(&self, device: Device) -> Result<Tensor, InferenceError> {
        let shape: Vec<i64> = self.shape().iter().map(|&d| d as i64).collect();
        let slice = self
            .data
            .as_slice()
            .ok_or_else(|| InferenceError::Preprocess("input is not contiguous".into()))?;
        Tensor::from_slice(slice)
            .f_view(shape.as_slice())
            .and_then(|t| t.f_to_device(device))
            .map_err(InferenceError::Forward)
    }
}

/// Converts any decoded image into the (1, 3, 224, 224) network input.
///
/// Grayscale is replicated across channels and alpha is dropped before the
/// bilinear resize, which ignores aspect ratio.
pub fn prepare(image: &DynamicImage) -> PreparedImage {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let size = INPUT_SIZE as usize;
    let mut data = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[[0, c, y as usize, x as usize]] = (value - MEAN[c]) / STD[c];
        }
    }

    PreparedImage { data }
}
