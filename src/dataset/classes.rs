use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::{DatasetError, Result};

/// Class names shipped with the dataset, in label-index order.
pub const DEFAULT_CLASSES: &[&str] = &["8FSK", "2FSK", "AM", "CW", "8PSK"];

lazy_static! {
    pub static ref DEFAULT_VOCABULARY: ClassVocabulary =
        ClassVocabulary::new(DEFAULT_CLASSES.iter().copied())
            .expect("default class list contains no duplicates");
}

/// Canonical form used for every vocabulary lookup.
///
/// Annotation files are inconsistent about case and whitespace, so both
/// vocabulary construction and lookup funnel through this one function.
pub fn canonical_name(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// An ordered, fixed set of class names. Declaration order defines the
/// label index assigned to each class.
#[derive(Debug, Clone)]
pub struct ClassVocabulary {
    names: Vec<String>,
    index_by_name: HashMap<String, usize>,
}

impl ClassVocabulary {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index_by_name = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if index_by_name.insert(canonical_name(name), index).is_some() {
                return Err(DatasetError::DuplicateClass { name: name.clone() });
            }
        }
        Ok(Self {
            names,
            index_by_name,
        })
    }

    /// Resolves a raw class name from an annotation file to its label index.
    pub fn index_of(&self, raw_name: &str) -> Result<usize> {
        let canonical = canonical_name(raw_name);
        self.index_by_name
            .get(&canonical)
            .copied()
            .ok_or_else(|| DatasetError::UnknownClass {
                name: raw_name.to_owned(),
                canonical,
            })
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
