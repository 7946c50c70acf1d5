use image::{DynamicImage, RgbImage};
use ndarray::{Array1, Array2};
use rand::{thread_rng, Rng};

use crate::error::Result;

/// An injected augmentation step.
///
/// Contract: given the decoded image, an `(N, 4)` coordinate block and an
/// `(N,)` label column, return transformed versions of all three. Box and
/// label counts must stay paired; an augmentation may drop entries but then
/// has to drop the box and its label together.
pub trait Augmentation: Send + Sync {
    fn augment(
        &self,
        image: RgbImage,
        boxes: Array2<f32>,
        labels: Array1<f32>,
    ) -> Result<(RgbImage, Array2<f32>, Array1<f32>)>;
}

impl<F> Augmentation for F
where
    F: Fn(RgbImage, Array2<f32>, Array1<f32>) -> Result<(RgbImage, Array2<f32>, Array1<f32>)>
        + Send
        + Sync,
{
    fn augment(
        &self,
        image: RgbImage,
        boxes: Array2<f32>,
        labels: Array1<f32>,
    ) -> Result<(RgbImage, Array2<f32>, Array1<f32>)> {
        self(image, boxes, labels)
    }
}

// Reasonable values are -30 and +30, max is 255, min is 0
pub fn random_change_brightness(img: &DynamicImage, min: i32, max: i32) -> DynamicImage {
    let value = thread_rng().gen_range(min..max);
    img.brighten(value)
}

// Reasonable values are -10 and +10
pub fn random_change_contrast(img: &DynamicImage, min: f32, max: f32) -> DynamicImage {
    let value = thread_rng().gen_range(min..max);
    img.adjust_contrast(value)
}

// Reasonable values are -30 and +30
pub fn random_hue_rotation(img: &DynamicImage, min: i32, max: i32) -> DynamicImage {
    let value = thread_rng().gen_range(min..max);
    img.huerotate(value)
}

// Reasonable values are 0.5 to 1.0
pub fn random_blur(img: &DynamicImage, min: f32, max: f32) -> DynamicImage {
    let value = thread_rng().gen_range(min..max);
    img.blur(value)
}

/// Color-only augmentation: random brightness, contrast, hue rotation and
/// blur within the configured ranges. Leaves geometry alone, so boxes and
/// labels pass through untouched.
#[derive(Debug, Clone)]
pub struct PhotometricAugmentation {
    pub brightness: (i32, i32),
    pub contrast: (f32, f32),
    pub hue: (i32, i32),
    pub blur: (f32, f32),
}

impl Default for PhotometricAugmentation {
    fn default() -> Self {
        Self {
            brightness: (-40, 40),
            contrast: (-15.0, 15.0),
            hue: (-35, 35),
            blur: (0.5, 1.0),
        }
    }
}

impl Augmentation for PhotometricAugmentation {
    fn augment(
        &self,
        image: RgbImage,
        boxes: Array2<f32>,
        labels: Array1<f32>,
    ) -> Result<(RgbImage, Array2<f32>, Array1<f32>)> {
        let img = DynamicImage::ImageRgb8(image);
        let img = random_change_brightness(&img, self.brightness.0, self.brightness.1);
        let img = random_change_contrast(&img, self.contrast.0, self.contrast.1);
        let img = random_hue_rotation(&img, self.hue.0, self.hue.1);
        let img = random_blur(&img, self.blur.0, self.blur.1);
        Ok((img.to_rgb8(), boxes, labels))
    }
}
