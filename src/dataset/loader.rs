use ndarray::{Array2, Array3, Array4, Axis};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::dataset::voc::VocDetection;
use crate::error::{DatasetError, Result};

/// Iterates the samples of a [`VocDetection`], optionally in a shuffled
/// order. Each step runs the full retrieval pipeline, so item failures show
/// up as `Err` elements rather than ending iteration.
pub struct SampleIter<'a> {
    dataset: &'a VocDetection,
    order: Vec<usize>,
    cursor: usize,
}

impl<'a> SampleIter<'a> {
    pub(crate) fn new(dataset: &'a VocDetection, shuffle: bool) -> Self {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if shuffle {
            order.shuffle(&mut thread_rng());
        }
        Self {
            dataset,
            order,
            cursor: 0,
        }
    }
}

impl Iterator for SampleIter<'_> {
    type Item = Result<(Array3<f32>, Array2<f32>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.order.get(self.cursor)?;
        self.cursor += 1;
        Some(self.dataset.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SampleIter<'_> {}

/// Groups any iterator's items into `Vec`s of `batch_size`. The final batch
/// may be smaller when the item count is not a multiple of the batch size.
/// `batch_size` must be at least 1.
pub trait Batching: Iterator + Sized {
    fn batching(self, batch_size: usize) -> Batcher<Self> {
        assert!(batch_size > 0, "batch size must be at least 1");
        Batcher {
            inner: self,
            batch_size,
        }
    }
}

impl<I: Iterator> Batching for I {}

pub struct Batcher<I: Iterator> {
    inner: I,
    batch_size: usize,
}

impl<I: Iterator> Iterator for Batcher<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.inner.next() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Combines a batch of `(image, target)` pairs into a stacked `(B, 3, H, W)`
/// image array and the per-image target arrays, which stay separate because
/// each image annotates a different number of objects.
///
/// All images in a batch must share one shape; mixed shapes are an error.
pub fn detection_collate(
    batch: Vec<(Array3<f32>, Array2<f32>)>,
) -> Result<(Array4<f32>, Vec<Array2<f32>>)> {
    let mut images = Vec::with_capacity(batch.len());
    let mut targets = Vec::with_capacity(batch.len());
    for (image, target) in batch {
        images.push(image);
        targets.push(target);
    }

    let first = images.first().ok_or(DatasetError::EmptyBatch)?.dim();
    for image in &images {
        if image.dim() != first {
            return Err(DatasetError::CollateShape {
                first,
                other: image.dim(),
            });
        }
    }

    let views: Vec<_> = images.iter().map(Array3::view).collect();
    let stacked = ndarray::stack(Axis(0), &views).expect("shapes checked above");
    Ok((stacked, targets))
}
