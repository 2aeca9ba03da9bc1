//! Dataset layout and the parts of a COCO annotation file this crate reads

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::coco::CategoryMap;
use crate::error::{Error, Result};

/// `categories[]` entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,
}

/// `images[]` entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// Annotation file, reduced to images and categories.
///
/// Instance annotations are the scorer's business and are not parsed here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoAnnotationFile {
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

impl CocoAnnotationFile {
    /// Read an annotation file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("opening annotations {}", path.display()), e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::serialization(format!("{}: {e}", path.display())))
    }

    /// Image ids in file order
    pub fn image_ids(&self) -> Vec<u64> {
        self.images.iter().map(|img| img.id).collect()
    }

    /// Class-id mapping for the file's categories
    pub fn category_map(&self) -> CategoryMap {
        CategoryMap::from_categories(&self.categories)
    }
}

/// Dataset split
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subset {
    Train,
    /// Validation images of one year
    Val(u32),
}

/// Directory conventions of the filament dataset
///
/// ```text
/// <root>/annotations/datasets_train.json    <root>/train_jpg/
/// <root>/annotations/datasets_val_<year>.json    <root>/val_jpg_<year>/
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetPaths {
    root: PathBuf,
}

impl DatasetPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Annotation file of a split
    pub fn annotations(&self, subset: Subset) -> PathBuf {
        let file = match subset {
            Subset::Train => "datasets_train.json".to_string(),
            Subset::Val(year) => format!("datasets_val_{year}.json"),
        };
        self.root.join("annotations").join(file)
    }

    /// Image directory of a split
    pub fn images(&self, subset: Subset) -> PathBuf {
        match subset {
            Subset::Train => self.root.join("train_jpg"),
            Subset::Val(year) => self.root.join(format!("val_jpg_{year}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_paths() {
        let paths = DatasetPaths::new("/data");
        assert_eq!(
            paths.annotations(Subset::Train),
            PathBuf::from("/data/annotations/datasets_train.json")
        );
        assert_eq!(
            paths.annotations(Subset::Val(2016)),
            PathBuf::from("/data/annotations/datasets_val_2016.json")
        );
        assert_eq!(paths.images(Subset::Train), PathBuf::from("/data/train_jpg"));
        assert_eq!(paths.images(Subset::Val(2013)), PathBuf::from("/data/val_jpg_2013"));
    }

    #[test]
    fn test_load_ignores_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("val.json");
        std::fs::write(
            &path,
            r#"{
                "images": [
                    {"id": 31, "file_name": "a.jpg", "width": 1024, "height": 1024},
                    {"id": 12, "file_name": "b.jpg", "width": 1024, "height": 1024}
                ],
                "annotations": [{"id": 1, "image_id": 31, "category_id": 2, "segmentation": []}],
                "categories": [{"id": 2, "name": "QR"}, {"id": 1, "name": "AR"}]
            }"#,
        )
        .unwrap();

        let file = CocoAnnotationFile::load(&path).unwrap();
        assert_eq!(file.image_ids(), vec![31, 12]);
        let map = file.category_map();
        assert_eq!(map.class_id(1), Some(1));
        assert_eq!(map.class_id(2), Some(2));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CocoAnnotationFile::load(Path::new("/nonexistent/annotations.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
