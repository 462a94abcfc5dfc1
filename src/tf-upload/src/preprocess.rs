use image::{imageops, imageops::FilterType, DynamicImage};
use serde::Deserialize;

use crate::Timer;

/// Side of the square input the model expects.
pub const INPUT_SIZE: u32 = 224;

pub const CHANNELS: u32 = 3;

/// Scaling applied to 8-bit pixel values before inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// MobileNet family: `[-1, 1]`.
    #[default]
    MobileNet,

    /// `[0, 1]`.
    Unit,
}

impl Normalization {
    pub fn apply(self, value: u8) -> f32 {
        match self {
            Normalization::MobileNet => value as f32 / 127.5 - 1.0,
            Normalization::Unit => value as f32 / 255.0,
        }
    }
}

/// Dense NHWC `f32` tensor holding a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    dims: [u64; 4],
    data: Vec<f32>,
}

impl InputTensor {
    pub fn dims(&self) -> [u64; 4] {
        self.dims
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Resize `image` to `INPUT_SIZE` x `INPUT_SIZE` RGB and normalize it into a
/// batch of one.
pub fn preprocess(image: &DynamicImage, normalization: Normalization) -> InputTensor {
    let mut t = Timer::new_start("Resizing image");

    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);

    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| normalization.apply(v))
        .collect();

    t.stop();

    InputTensor {
        dims: [1, INPUT_SIZE as u64, INPUT_SIZE as u64, CHANNELS as u64],
        data,
    }
}
