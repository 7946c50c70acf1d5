//! Loader for VOC-style object detection datasets: one `.bmp` image plus one
//! `.xml` bounding-box annotation file per sample, keyed by a shared filename.
//!
//! The two main entry points are [`VocDetection`], the indexed dataset, and
//! [`AnnotationTransform`], which turns a parsed annotation into normalized
//! box coordinates with class indices.

pub mod dataset;
pub mod error;

pub use crate::dataset::transform::{AnnotationTransform, LabeledBox};
pub use crate::dataset::voc::VocDetection;
pub use crate::error::DatasetError;
