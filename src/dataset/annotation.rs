use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use serde::Serialize;

use crate::error::{DatasetError, Result};

/// A bounding box in raw pixel coordinates as stored in the annotation file:
/// integers, 1-indexed, `(xmin, ymin, xmax, ymax)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

/// One annotated object: class name, difficulty marker and its box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectEntry {
    pub name: String,
    pub difficult: bool,
    pub bndbox: RawBox,
}

/// The parsed contents of one annotation file, object entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnnotationRecord {
    pub objects: Vec<ObjectEntry>,
}

impl AnnotationRecord {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parses the VOC XML shape: repeated `object` elements, each holding
    /// `difficult` (0/1), `name` and a `bndbox` with the four coordinates.
    /// `origin` only labels errors.
    pub fn parse(xml: &str, origin: &Path) -> Result<Self> {
        let doc = Document::parse(xml).map_err(|source| DatasetError::AnnotationParse {
            path: origin.to_owned(),
            source,
        })?;

        let mut objects = Vec::new();
        for node in doc
            .descendants()
            .filter(|n| n.has_tag_name("object"))
        {
            let difficult = int_field(node, "difficult", origin)? == 1;
            let name = text_field(node, "name", origin)?.to_owned();
            let bndbox = child(node, "bndbox", origin)?;
            let bndbox = RawBox {
                xmin: int_field(bndbox, "xmin", origin)?,
                ymin: int_field(bndbox, "ymin", origin)?,
                xmax: int_field(bndbox, "xmax", origin)?,
                ymax: int_field(bndbox, "ymax", origin)?,
            };
            objects.push(ObjectEntry {
                name,
                difficult,
                bndbox,
            });
        }
        Ok(Self { objects })
    }

    /// Parses an in-memory XML string, for callers without a backing file.
    pub fn parse_str(xml: &str) -> Result<Self> {
        Self::parse(xml, &PathBuf::from("<memory>"))
    }
}

fn child<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
    origin: &Path,
) -> Result<Node<'a, 'input>> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .ok_or_else(|| DatasetError::MissingField {
            path: origin.to_owned(),
            field: tag,
        })
}

fn text_field<'a>(node: Node<'a, '_>, tag: &'static str, origin: &Path) -> Result<&'a str> {
    child(node, tag, origin)?
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DatasetError::MissingField {
            path: origin.to_owned(),
            field: tag,
        })
}

fn int_field(node: Node<'_, '_>, tag: &'static str, origin: &Path) -> Result<i32> {
    text_field(node, tag, origin)?
        .parse()
        .map_err(|_| DatasetError::MissingField {
            path: origin.to_owned(),
            field: tag,
        })
}
