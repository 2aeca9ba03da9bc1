//! COCO evaluation support
//!
//! ## Architecture
//!
//! - `rle`: column-major run-length encoding of binary masks
//! - `coco`: detector output to COCO result records, category mapping
//! - `dataset`: annotation file model and dataset directory conventions
//! - `evaluator`: the detect, format, and score driver behind pluggable traits
//!
//! ## Example
//!
//! ```rust
//! use filament_train::eval::{build_coco_results, CategoryMap, CocoCategory, DetectorOutput};
//!
//! let categories = CategoryMap::from_categories(&[CocoCategory { id: 1, name: "filament".into() }]);
//! let results = build_coco_results(&categories, &[42], &DetectorOutput::empty()).unwrap();
//! assert!(results.is_empty());
//! ```

pub mod coco;
pub mod dataset;
pub mod evaluator;
pub mod rle;

pub use coco::{build_coco_results, CategoryLookup, CategoryMap, DetectionResult, DetectorOutput};
pub use dataset::{CocoAnnotationFile, CocoCategory, CocoImage, DatasetPaths, Subset};
pub use evaluator::{
    collect_coco_results, evaluate_coco, limit_images, write_results, CocoScorer, Detector,
    EvalReport, EvalType, ImageIds, ImageSource, RawDetections, RecordedDetector,
};
pub use rle::{CompressedRle, Rle};
