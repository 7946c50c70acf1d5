use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while indexing or retrieving a sample.
///
/// No variant is recovered from internally: bad input data is fatal for the
/// item it belongs to and surfaces to the caller.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {}", .path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("malformed annotation {}", .path.display())]
    AnnotationParse {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("annotation {}: missing or invalid field `{field}`", .path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("unknown class name `{name}` (canonical form `{canonical}`)")]
    UnknownClass { name: String, canonical: String },

    #[error("duplicate class name `{name}` in vocabulary")]
    DuplicateClass { name: String },

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot collate images of differing shapes {first:?} and {other:?}")]
    CollateShape {
        first: (usize, usize, usize),
        other: (usize, usize, usize),
    },

    #[error("cannot collate an empty batch")]
    EmptyBatch,
}

pub type Result<T> = std::result::Result<T, DatasetError>;
