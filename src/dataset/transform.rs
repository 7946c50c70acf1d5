use serde::Serialize;

use crate::dataset::annotation::AnnotationRecord;
use crate::dataset::classes::{ClassVocabulary, DEFAULT_VOCABULARY};
use crate::error::Result;

/// A bounding box after the annotation transform: zero-based coordinates
/// divided by the image dimensions, plus the resolved class index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub class_index: usize,
}

impl LabeledBox {
    /// The five-column row layout used in target arrays.
    pub fn to_row(&self) -> [f32; 5] {
        [
            self.xmin,
            self.ymin,
            self.xmax,
            self.ymax,
            self.class_index as f32,
        ]
    }
}

/// Turns a parsed [`AnnotationRecord`] into normalized boxes with class
/// indices.
///
/// The source format stores 1-based integer pixel coordinates; the transform
/// shifts them to 0-based and divides x by the image width and y by the
/// height. Passing `width = height = 1` skips normalization and yields raw
/// (minus one) pixel coordinates, which is what
/// [`VocDetection::pull_annotation`](crate::VocDetection::pull_annotation)
/// relies on.
#[derive(Debug, Clone)]
pub struct AnnotationTransform {
    vocabulary: ClassVocabulary,
    keep_difficult: bool,
}

impl Default for AnnotationTransform {
    fn default() -> Self {
        Self::new(DEFAULT_VOCABULARY.clone(), false)
    }
}

impl AnnotationTransform {
    pub fn new(vocabulary: ClassVocabulary, keep_difficult: bool) -> Self {
        Self {
            vocabulary,
            keep_difficult,
        }
    }

    pub fn vocabulary(&self) -> &ClassVocabulary {
        &self.vocabulary
    }

    /// Pure and deterministic. Entries flagged difficult are dropped unless
    /// `keep_difficult` is set; source order is preserved. Assumes
    /// `width > 0` and `height > 0`.
    pub fn transform(
        &self,
        record: &AnnotationRecord,
        width: u32,
        height: u32,
    ) -> Result<Vec<LabeledBox>> {
        let mut boxes = Vec::with_capacity(record.objects.len());
        for entry in &record.objects {
            if entry.difficult && !self.keep_difficult {
                continue;
            }
            let class_index = self.vocabulary.index_of(&entry.name)?;
            let b = &entry.bndbox;
            boxes.push(LabeledBox {
                xmin: (b.xmin - 1) as f32 / width as f32,
                ymin: (b.ymin - 1) as f32 / height as f32,
                xmax: (b.xmax - 1) as f32 / width as f32,
                ymax: (b.ymax - 1) as f32 / height as f32,
                class_index,
            });
        }
        Ok(boxes)
    }
}
