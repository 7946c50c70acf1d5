use image::RgbImage;
use ndarray::{s, Array1, Array2, Array3, Array4};

use crate::dataset::transform::LabeledBox;

/// Converts a decoded image to a channel-first `(3, H, W)` float array,
/// the layout training code consumes.
pub fn image_to_chw(img: &RgbImage) -> Array3<f32> {
    let (width, height) = img.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        f32::from(img.get_pixel(x as u32, y as u32)[c])
    })
}

/// Converts a decoded image to a `(1, H, W, 3)` float array: the raw
/// decode layout with a leading batch-like dimension.
pub fn image_to_batched_hwc(img: &RgbImage) -> Array4<f32> {
    let (width, height) = img.dimensions();
    Array4::from_shape_fn((1, height as usize, width as usize, 3), |(_, y, x, c)| {
        f32::from(img.get_pixel(x as u32, y as u32)[c])
    })
}

/// Lays transformed boxes out as an `(N, 5)` target array, one row per box:
/// four coordinates then the class index. Empty input gives an `(0, 5)` array.
pub fn boxes_to_target(boxes: &[LabeledBox]) -> Array2<f32> {
    let mut target = Array2::zeros((boxes.len(), 5));
    for (i, b) in boxes.iter().enumerate() {
        for (j, value) in b.to_row().iter().enumerate() {
            target[[i, j]] = *value;
        }
    }
    target
}

/// Splits an `(N, 5)` target into its `(N, 4)` coordinate block and `(N,)`
/// label column, the shape augmentations operate on.
pub fn split_target(target: &Array2<f32>) -> (Array2<f32>, Array1<f32>) {
    let boxes = target.slice(s![.., ..4]).to_owned();
    let labels = target.column(4).to_owned();
    (boxes, labels)
}

/// Re-attaches a label column to a coordinate block, inverse of
/// [`split_target`].
pub fn join_target(boxes: &Array2<f32>, labels: &Array1<f32>) -> Array2<f32> {
    let n = boxes.nrows();
    let mut target = Array2::zeros((n, 5));
    target.slice_mut(s![.., ..4]).assign(boxes);
    target.column_mut(4).assign(labels);
    target
}
