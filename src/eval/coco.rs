//! Conversion of raw detector output into COCO result records

use std::collections::HashMap;

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use super::dataset::CocoCategory;
use super::rle::{CompressedRle, Rle};
use crate::error::{Error, Result};

/// One predicted instance in COCO result format
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub image_id: u64,
    pub category_id: u64,
    /// `[x, y, width, height]`
    pub bbox: [f64; 4],
    pub score: f64,
    pub segmentation: CompressedRle,
}

/// Raw detector output for one image
///
/// `rois` rows are `(top, left, bottom, right)`; `masks` is
/// `height x width x instances`.
#[derive(Clone, Debug)]
pub struct DetectorOutput {
    pub rois: Option<Array2<f64>>,
    pub class_ids: Vec<usize>,
    pub scores: Vec<f64>,
    pub masks: Array3<u8>,
}

impl DetectorOutput {
    /// Output with no detections
    pub fn empty() -> Self {
        Self {
            rois: None,
            class_ids: Vec::new(),
            scores: Vec::new(),
            masks: Array3::zeros((0, 0, 0)),
        }
    }

    /// Number of detected instances
    pub fn len(&self) -> usize {
        self.rois.as_ref().map_or(0, |r| r.nrows())
    }

    /// Check if nothing was detected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_shapes(&self, image_id: u64) -> Result<()> {
        let Some(rois) = &self.rois else { return Ok(()) };
        let n = rois.nrows();
        let invalid = |message: String| -> Result<()> {
            Err(Error::InvalidDetections { image_id, message })
        };

        if rois.ncols() != 4 {
            return invalid(format!("rois have {} columns, expected 4", rois.ncols()));
        }
        if self.class_ids.len() != n || self.scores.len() != n {
            return invalid(format!(
                "{n} rois but {} class ids and {} scores",
                self.class_ids.len(),
                self.scores.len()
            ));
        }
        if n > 0 && self.masks.len_of(Axis(2)) != n {
            return invalid(format!("{n} rois but {} masks", self.masks.len_of(Axis(2))));
        }
        Ok(())
    }
}

/// Maps a model's internal class id back to the dataset's category id.
pub trait CategoryLookup {
    fn source_category_id(&self, class_id: usize) -> Option<u64>;
}

/// Internal class ids assigned in ascending category-id order; 0 is background.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryMap {
    source_ids: Vec<u64>,
    names: HashMap<u64, String>,
}

impl CategoryMap {
    /// Build from dataset categories in any order.
    pub fn from_categories(categories: &[CocoCategory]) -> Self {
        let mut source_ids: Vec<u64> = categories.iter().map(|c| c.id).collect();
        source_ids.sort_unstable();
        source_ids.dedup();
        let names = categories.iter().map(|c| (c.id, c.name.clone())).collect();
        Self { source_ids, names }
    }

    /// Number of foreground classes
    pub fn num_classes(&self) -> usize {
        self.source_ids.len()
    }

    /// Internal class id of a dataset category
    pub fn class_id(&self, source_id: u64) -> Option<usize> {
        self.source_ids.binary_search(&source_id).ok().map(|i| i + 1)
    }

    /// Category name by dataset id
    pub fn name(&self, source_id: u64) -> Option<&str> {
        self.names.get(&source_id).map(String::as_str)
    }
}

impl CategoryLookup for CategoryMap {
    fn source_category_id(&self, class_id: usize) -> Option<u64> {
        class_id.checked_sub(1).and_then(|i| self.source_ids.get(i)).copied()
    }
}

/// Round half to even at one decimal, matching numpy's `around`.
fn round_1dp(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}

/// Convert one image's detector output into COCO result records.
///
/// Every detection is emitted once per id in `image_ids`, in input order.
/// Masks are assumed non-empty; empty masks are filtered when annotations are
/// loaded, not here.
pub fn build_coco_results(
    categories: &dyn CategoryLookup,
    image_ids: &[u64],
    output: &DetectorOutput,
) -> Result<Vec<DetectionResult>> {
    let Some(rois) = &output.rois else { return Ok(Vec::new()) };
    if rois.nrows() == 0 {
        return Ok(Vec::new());
    }

    let mut results = Vec::with_capacity(image_ids.len() * rois.nrows());
    for &image_id in image_ids {
        output.check_shapes(image_id)?;
        for (i, roi) in rois.outer_iter().enumerate() {
            let class_id = output.class_ids[i];
            let category_id = categories
                .source_category_id(class_id)
                .ok_or(Error::UnknownCategory { class_id })?;

            let (top, left, bottom, right) =
                (round_1dp(roi[0]), round_1dp(roi[1]), round_1dp(roi[2]), round_1dp(roi[3]));
            let mask = output.masks.index_axis(Axis(2), i);

            results.push(DetectionResult {
                image_id,
                category_id,
                bbox: [left, top, right - left, bottom - top],
                score: output.scores[i],
                segmentation: Rle::encode(mask).compress(),
            });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn categories() -> CategoryMap {
        CategoryMap::from_categories(&[
            CocoCategory { id: 7, name: "QR".into() },
            CocoCategory { id: 3, name: "AR".into() },
        ])
    }

    fn one_detection(roi: [f64; 4]) -> DetectorOutput {
        let mut masks = Array3::zeros((4, 4, 1));
        masks[[1, 2, 0]] = 1;
        masks[[2, 2, 0]] = 1;
        DetectorOutput {
            rois: Some(Array2::from_shape_vec((1, 4), roi.to_vec()).unwrap()),
            class_ids: vec![2],
            scores: vec![0.93],
            masks,
        }
    }

    #[test]
    fn test_category_map_sorted_ids() {
        let map = categories();
        assert_eq!(map.num_classes(), 2);
        assert_eq!(map.source_category_id(0), None);
        assert_eq!(map.source_category_id(1), Some(3));
        assert_eq!(map.source_category_id(2), Some(7));
        assert_eq!(map.source_category_id(3), None);
        assert_eq!(map.class_id(7), Some(2));
        assert_eq!(map.name(3), Some("AR"));
    }

    #[test]
    fn test_none_rois_yield_nothing() {
        let results =
            build_coco_results(&categories(), &[1, 2, 3], &DetectorOutput::empty()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_rois_yield_nothing() {
        let output = DetectorOutput {
            rois: Some(Array2::zeros((0, 4))),
            ..DetectorOutput::empty()
        };
        assert!(build_coco_results(&categories(), &[5], &output).unwrap().is_empty());
    }

    #[test]
    fn test_box_conversion() {
        let output = one_detection([10.0, 20.0, 30.0, 50.0]);
        let results = build_coco_results(&categories(), &[42], &output).unwrap();

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.image_id, 42);
        assert_eq!(r.category_id, 7);
        assert_eq!(r.bbox, [20.0, 10.0, 30.0, 20.0]);
        assert_eq!(r.score, 0.93);
        assert_eq!(r.segmentation.size, [4, 4]);
        // Column 2 holds rows 1..=2: 9 zeros, 2 ones, 5 zeros.
        assert_eq!(r.segmentation.decompress().unwrap().counts, vec![9, 2, 5]);
    }

    #[test]
    fn test_box_rounded_to_one_decimal() {
        let output = one_detection([10.04, 20.26, 30.5, 50.0]);
        let results = build_coco_results(&categories(), &[1], &output).unwrap();
        let [x, y, w, h] = results[0].bbox;
        assert_eq!(x, 20.3);
        assert_eq!(y, 10.0);
        assert!((w - 29.7).abs() < 1e-9);
        assert!((h - 20.5).abs() < 1e-9);
    }

    #[test]
    fn test_order_follows_input() {
        let masks = Array3::from_elem((2, 2, 2), 1u8);
        let output = DetectorOutput {
            rois: Some(array![[0.0, 0.0, 1.0, 1.0], [0.0, 0.0, 2.0, 2.0]]),
            class_ids: vec![2, 1],
            scores: vec![0.2, 0.9],
            masks,
        };
        let results = build_coco_results(&categories(), &[8], &output).unwrap();
        let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.2, 0.9]);
        assert_eq!(results[1].category_id, 3);
    }

    #[test]
    fn test_unknown_class_is_error() {
        let mut output = one_detection([0.0, 0.0, 1.0, 1.0]);
        output.class_ids = vec![9];
        let err = build_coco_results(&categories(), &[1], &output).unwrap_err();
        assert!(matches!(err, Error::UnknownCategory { class_id: 9 }));
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let mut output = one_detection([0.0, 0.0, 1.0, 1.0]);
        output.scores.clear();
        let err = build_coco_results(&categories(), &[11], &output).unwrap_err();
        assert!(matches!(err, Error::InvalidDetections { image_id: 11, .. }));
    }

    #[test]
    fn test_result_json_shape() {
        let output = one_detection([10.0, 20.0, 30.0, 50.0]);
        let results = build_coco_results(&categories(), &[42], &output).unwrap();
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["bbox"], serde_json::json!([20.0, 10.0, 30.0, 20.0]));
        assert_eq!(json["segmentation"]["size"], serde_json::json!([4, 4]));
        assert!(json["segmentation"]["counts"].is_string());
    }
}
