use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use itertools::Itertools;
use ndarray::{Array2, Array3, Array4};
use tracing::info;

use crate::dataset::annotation::AnnotationRecord;
use crate::dataset::augment::Augmentation;
use crate::dataset::loader::SampleIter;
use crate::dataset::tensor::{
    boxes_to_target, image_to_batched_hwc, image_to_chw, join_target, split_target,
};
use crate::dataset::transform::{AnnotationTransform, LabeledBox};
use crate::error::{DatasetError, Result};

pub const IMAGE_SUBDIR: &str = "images";
pub const ANNOTATION_SUBDIR: &str = "annotations";
pub const IMAGE_EXT: &str = "bmp";
pub const ANNOTATION_EXT: &str = "xml";

/// Indexed detection dataset over a fixed on-disk layout:
/// `root/images/<id>.bmp` paired with `root/annotations/<id>.xml`.
///
/// The identifier list is built once at construction and immutable
/// afterwards; every retrieval re-reads the files for its item. The dataset
/// holds no mutable state, so shared references can be used from several
/// worker threads at once.
pub struct VocDetection {
    root: PathBuf,
    ids: Vec<String>,
    transform: Option<Box<dyn Augmentation>>,
    target_transform: AnnotationTransform,
}

impl VocDetection {
    /// Opens the dataset under `root` with no augmentation and a fresh
    /// default annotation transform.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_transforms(root, None, AnnotationTransform::default())
    }

    pub fn with_transforms(
        root: impl Into<PathBuf>,
        transform: Option<Box<dyn Augmentation>>,
        target_transform: AnnotationTransform,
    ) -> Result<Self> {
        let root = root.into();
        let ids = scan_identifiers(&root.join(IMAGE_SUBDIR))?;
        info!(
            items = ids.len(),
            root = %root.display(),
            "indexed detection dataset"
        );
        Ok(Self {
            root,
            ids,
            transform,
            target_transform,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in index order.
    pub fn identifiers(&self) -> &[String] {
        &self.ids
    }

    /// Full retrieval pipeline: decode, transform annotation, apply the
    /// configured augmentation. Returns the image as `(3, H, W)` floats and
    /// the `(N, 5)` target array.
    pub fn get(&self, index: usize) -> Result<(Array3<f32>, Array2<f32>)> {
        let (image, target, _height, _width) = self.pull_item(index)?;
        Ok((image, target))
    }

    /// As [`get`](Self::get), plus the original image height and width so
    /// callers can map normalized coordinates back to pixel space.
    pub fn pull_item(&self, index: usize) -> Result<(Array3<f32>, Array2<f32>, u32, u32)> {
        let id = self.id(index)?.to_owned();
        let record = AnnotationRecord::from_file(&self.annotation_path(&id))?;
        let mut image = self.decode_image(&id)?;
        let (width, height) = image.dimensions();

        let boxes = self.target_transform.transform(&record, width, height)?;
        let mut target = boxes_to_target(&boxes);

        if let Some(augmentation) = &self.transform {
            let (coords, labels) = split_target(&target);
            let (augmented, coords, labels) = augmentation.augment(image, coords, labels)?;
            // decode already produced RGB, which is also the canonical order
            image = augmented;
            target = join_target(&coords, &labels);
        }

        Ok((image_to_chw(&image), target, height, width))
    }

    /// Decodes and returns the image untouched by any transform.
    pub fn pull_image(&self, index: usize) -> Result<RgbImage> {
        let id = self.id(index)?.to_owned();
        self.decode_image(&id)
    }

    /// Parses and transforms the annotation with `width = height = 1`, so
    /// the boxes come back in raw zero-based pixel coordinates. Never reads
    /// the image file.
    pub fn pull_annotation(&self, index: usize) -> Result<(String, Vec<LabeledBox>)> {
        let id = self.id(index)?.to_owned();
        let record = AnnotationRecord::from_file(&self.annotation_path(&id))?;
        let boxes = self.target_transform.transform(&record, 1, 1)?;
        Ok((id, boxes))
    }

    /// Raw image as a `(1, H, W, 3)` float array.
    pub fn pull_tensor(&self, index: usize) -> Result<Array4<f32>> {
        Ok(image_to_batched_hwc(&self.pull_image(index)?))
    }

    /// Iterates samples in index order.
    pub fn iter(&self) -> SampleIter<'_> {
        SampleIter::new(self, false)
    }

    /// Iterates samples in a freshly shuffled order.
    pub fn iter_shuffled(&self) -> SampleIter<'_> {
        SampleIter::new(self, true)
    }

    fn id(&self, index: usize) -> Result<&str> {
        self.ids
            .get(index)
            .map(String::as_str)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.ids.len(),
            })
    }

    fn image_path(&self, id: &str) -> PathBuf {
        self.root
            .join(IMAGE_SUBDIR)
            .join(format!("{id}.{IMAGE_EXT}"))
    }

    fn annotation_path(&self, id: &str) -> PathBuf {
        self.root
            .join(ANNOTATION_SUBDIR)
            .join(format!("{id}.{ANNOTATION_EXT}"))
    }

    fn decode_image(&self, id: &str) -> Result<RgbImage> {
        let path = self.image_path(id);
        let img = image::open(&path).map_err(|source| DatasetError::ImageDecode {
            path,
            source,
        })?;
        Ok(img.to_rgb8())
    }
}

/// Collects identifiers by stripping the image extension from every file in
/// the image subdirectory. Directory listing order is filesystem-dependent,
/// so the result is sorted to make indexing reproducible.
fn scan_identifiers(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| DatasetError::Io {
        path: dir.to_owned(),
        source,
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DatasetError::Io {
            path: dir.to_owned(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .and_then(OsStr::to_str)
            .map_or(false, |ext| ext.eq_ignore_ascii_case(IMAGE_EXT));
        if !is_image {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(OsStr::to_str) {
            ids.push(stem.to_owned());
        }
    }
    Ok(ids.into_iter().sorted().dedup().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::classes::DEFAULT_VOCABULARY;
    use image::{Rgb, RgbImage};
    use ndarray::{Array1, Array2};
    use std::fs;
    use tempfile::TempDir;

    const ANNOTATION_A: &str = r#"
        <annotation>
            <object>
                <name>AM</name>
                <difficult>0</difficult>
                <bndbox><xmin>2</xmin><ymin>2</ymin><xmax>102</xmax><ymax>102</ymax></bndbox>
            </object>
        </annotation>"#;

    const ANNOTATION_B: &str = r#"
        <annotation>
            <object>
                <name>CW</name>
                <difficult>1</difficult>
                <bndbox><xmin>5</xmin><ymin>5</ymin><xmax>50</xmax><ymax>50</ymax></bndbox>
            </object>
        </annotation>"#;

    /// Builds the two-sample fixture from the scenario the loader is
    /// designed around: `a` has one plain object, `b` only a difficult one.
    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join(IMAGE_SUBDIR);
        let annotations = dir.path().join(ANNOTATION_SUBDIR);
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&annotations).unwrap();

        let mut img = RgbImage::new(101, 101);
        img.put_pixel(0, 0, Rgb([1, 2, 3]));
        img.save(images.join("a.bmp")).unwrap();
        RgbImage::new(101, 101).save(images.join("b.bmp")).unwrap();

        fs::write(annotations.join("a.xml"), ANNOTATION_A).unwrap();
        fs::write(annotations.join("b.xml"), ANNOTATION_B).unwrap();
        dir
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn length_counts_distinct_identifiers_sorted() {
        let dir = fixture();
        let dataset = VocDetection::new(dir.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.identifiers(), ["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn pull_annotation_returns_raw_zero_based_boxes() {
        let dir = fixture();
        let dataset = VocDetection::new(dir.path()).unwrap();

        let (id, boxes) = dataset.pull_annotation(0).unwrap();
        assert_eq!(id, "a");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].to_row(), [1.0, 1.0, 101.0, 101.0, 2.0]);

        // every object in `b` is difficult, so the default config drops them all
        let (id, boxes) = dataset.pull_annotation(1).unwrap();
        assert_eq!(id, "b");
        assert!(boxes.is_empty());
    }

    #[test]
    fn get_returns_chw_image_and_normalized_target() {
        let dir = fixture();
        let dataset = VocDetection::new(dir.path()).unwrap();

        let (image, target) = dataset.get(0).unwrap();
        assert_eq!(image.dim(), (3, 101, 101));
        assert_eq!(image[[2, 0, 0]], 3.0);

        assert_eq!(target.dim(), (1, 5));
        assert_close(target[[0, 0]], 1.0 / 101.0);
        assert_close(target[[0, 1]], 1.0 / 101.0);
        assert_close(target[[0, 2]], 1.0);
        assert_close(target[[0, 3]], 1.0);
        assert_eq!(target[[0, 4]], 2.0);
        for coord in target.slice(ndarray::s![0, ..4]) {
            assert!((0.0..=1.0).contains(coord));
        }
    }

    #[test]
    fn pull_item_reports_original_dimensions() {
        let dir = fixture();
        let dataset = VocDetection::new(dir.path()).unwrap();
        let (_, target, height, width) = dataset.pull_item(1).unwrap();
        assert_eq!((height, width), (101, 101));
        assert_eq!(target.dim(), (0, 5));
    }

    #[test]
    fn pull_image_and_tensor_are_untransformed() {
        let dir = fixture();
        let dataset = VocDetection::new(dir.path()).unwrap();

        let img = dataset.pull_image(0).unwrap();
        assert_eq!(img.dimensions(), (101, 101));
        assert_eq!(img.get_pixel(0, 0), &Rgb([1, 2, 3]));

        let tensor = dataset.pull_tensor(0).unwrap();
        assert_eq!(tensor.dim(), (1, 101, 101, 3));
        assert_eq!(tensor[[0, 0, 0, 1]], 2.0);
    }

    #[test]
    fn keep_difficult_retains_all_entries() {
        let dir = fixture();
        let dataset = VocDetection::with_transforms(
            dir.path(),
            None,
            AnnotationTransform::new(DEFAULT_VOCABULARY.clone(), true),
        )
        .unwrap();
        let (_, boxes) = dataset.pull_annotation(1).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_index, 3);
    }

    #[test]
    fn augmentation_runs_on_split_target_and_labels_reattach() {
        let dir = fixture();
        let shift = |img: RgbImage,
                     boxes: Array2<f32>,
                     labels: Array1<f32>|
         -> crate::error::Result<(RgbImage, Array2<f32>, Array1<f32>)> {
            Ok((img, boxes.mapv(|c| c / 2.0), labels.mapv(|l| l + 1.0)))
        };
        let dataset = VocDetection::with_transforms(
            dir.path(),
            Some(Box::new(shift)),
            AnnotationTransform::default(),
        )
        .unwrap();

        let (_, target) = dataset.get(0).unwrap();
        assert_eq!(target.dim(), (1, 5));
        assert_close(target[[0, 2]], 0.5);
        assert_eq!(target[[0, 4]], 3.0);
    }

    #[test]
    fn iteration_batches_and_collates_the_whole_dataset() {
        use crate::dataset::loader::{detection_collate, Batching};

        let dir = fixture();
        let dataset = VocDetection::new(dir.path()).unwrap();

        // itertools also has a `batching`, so name the adapter explicitly
        let mut batches = Batching::batching(dataset.iter(), 2);
        let batch: Vec<_> = batches
            .next()
            .unwrap()
            .into_iter()
            .collect::<crate::error::Result<_>>()
            .unwrap();
        assert!(batches.next().is_none());

        let (images, targets) = detection_collate(batch).unwrap();
        assert_eq!(images.dim(), (2, 3, 101, 101));
        assert_eq!(targets[0].dim(), (1, 5));
        assert_eq!(targets[1].dim(), (0, 5));

        let shuffled: Vec<_> = dataset.iter_shuffled().collect();
        assert_eq!(shuffled.len(), 2);
        assert!(shuffled.iter().all(|s| s.is_ok()));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let dir = fixture();
        let dataset = VocDetection::new(dir.path()).unwrap();
        let err = dataset.get(dataset.len()).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::IndexOutOfRange { index: 2, len: 2 }
        ));
        assert!(dataset.pull_annotation(99).is_err());
    }

    #[test]
    fn corrupt_image_fails_decode() {
        let dir = fixture();
        fs::write(dir.path().join(IMAGE_SUBDIR).join("c.bmp"), b"not a bmp").unwrap();
        fs::write(
            dir.path().join(ANNOTATION_SUBDIR).join("c.xml"),
            "<annotation></annotation>",
        )
        .unwrap();
        let dataset = VocDetection::new(dir.path()).unwrap();
        assert_eq!(dataset.len(), 3);

        let err = dataset.pull_image(2).unwrap_err();
        assert!(matches!(err, DatasetError::ImageDecode { .. }));
        assert!(dataset.get(2).is_err());
    }

    #[test]
    fn malformed_annotation_fails_parse() {
        let dir = fixture();
        fs::write(
            dir.path().join(ANNOTATION_SUBDIR).join("a.xml"),
            "<annotation><object>",
        )
        .unwrap();
        let dataset = VocDetection::new(dir.path()).unwrap();
        let err = dataset.pull_annotation(0).unwrap_err();
        assert!(matches!(err, DatasetError::AnnotationParse { .. }));
    }

    #[test]
    fn unknown_class_in_annotation_fails_lookup() {
        let dir = fixture();
        fs::write(
            dir.path().join(ANNOTATION_SUBDIR).join("a.xml"),
            r#"<annotation>
                <object>
                    <name>martian</name>
                    <difficult>0</difficult>
                    <bndbox><xmin>1</xmin><ymin>1</ymin><xmax>2</xmax><ymax>2</ymax></bndbox>
                </object>
            </annotation>"#,
        )
        .unwrap();
        let dataset = VocDetection::new(dir.path()).unwrap();
        let err = dataset.pull_annotation(0).unwrap_err();
        assert!(matches!(err, DatasetError::UnknownClass { .. }));
    }

    #[test]
    fn missing_image_directory_fails_construction() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            VocDetection::new(dir.path()),
            Err(DatasetError::Io { .. })
        ));
    }
}
