//! COCO evaluation driver
//!
//! Detection, image loading and scoring are external collaborators reached
//! through traits. The driver runs the detector one image at a time, formats
//! each image's output, and hands the collected records to the scorer.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use super::coco::{build_coco_results, CategoryLookup, DetectionResult, DetectorOutput};
use crate::error::{Error, Result};

/// What the scorer compares against ground truth
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalType {
    /// Bounding boxes
    Bbox,
    /// Instance masks
    Segm,
}

impl EvalType {
    pub fn as_str(self) -> &'static str {
        match self {
            EvalType::Bbox => "bbox",
            EvalType::Segm => "segm",
        }
    }
}

impl fmt::Display for EvalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvalType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bbox" => Ok(EvalType::Bbox),
            "segm" => Ok(EvalType::Segm),
            other => Err(format!("unknown evaluation type '{other}' (expected bbox or segm)")),
        }
    }
}

/// Loads images by dataset image id
pub trait ImageSource {
    type Image;

    fn load_image(&self, image_id: u64) -> Result<Self::Image>;
}

/// Runs instance detection on one image
pub trait Detector<I> {
    fn detect(&mut self, image: &I) -> Result<DetectorOutput>;
}

/// COCO-compatible scorer
pub trait CocoScorer {
    /// Register detection results.
    fn load_res(&mut self, results: &[DetectionResult]) -> Result<()>;
    /// Match results to ground truth for the given images.
    fn evaluate(&mut self, eval_type: EvalType, image_ids: &[u64]) -> Result<()>;
    /// Accumulate per-image matches into precision/recall tables.
    fn accumulate(&mut self) -> Result<()>;
    /// Report summary statistics.
    fn summarize(&mut self) -> Result<()>;
}

/// Timing and volume of one evaluation pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvalReport {
    /// Images run through the detector
    pub images: usize,
    /// Result records produced
    pub detections: usize,
    /// Time spent inside the detector
    pub prediction_secs: f64,
    /// Wall-clock time of the whole pass
    pub total_secs: f64,
}

impl EvalReport {
    /// Mean detector time per image
    pub fn avg_prediction_secs(&self) -> f64 {
        if self.images == 0 {
            0.0
        } else {
            self.prediction_secs / self.images as f64
        }
    }

    /// Log prediction and total time.
    pub fn log_timings(&self) {
        tracing::info!(
            "Prediction time: {:.3}. Average {:.3}/image",
            self.prediction_secs,
            self.avg_prediction_secs()
        );
        tracing::info!("Total time: {:.3}", self.total_secs);
    }
}

/// First `limit` ids, or all of them when `limit` is 0.
pub fn limit_images(image_ids: &[u64], limit: usize) -> &[u64] {
    if limit == 0 {
        image_ids
    } else {
        &image_ids[..limit.min(image_ids.len())]
    }
}

/// Detect and format every image, without scoring.
pub fn collect_coco_results<S, D>(
    images: &S,
    image_ids: &[u64],
    detector: &mut D,
    categories: &dyn CategoryLookup,
) -> Result<(Vec<DetectionResult>, EvalReport)>
where
    S: ImageSource,
    D: Detector<S::Image>,
{
    let started = Instant::now();
    let mut report = EvalReport::default();
    let mut results = Vec::new();

    for &image_id in image_ids {
        let image = images.load_image(image_id)?;

        let t = Instant::now();
        let output = detector.detect(&image)?;
        report.prediction_secs += t.elapsed().as_secs_f64();

        let image_results = build_coco_results(categories, &[image_id], &output)?;
        tracing::debug!(image_id, detections = image_results.len(), "image detected");
        results.extend(image_results);
        report.images += 1;
    }

    report.detections = results.len();
    report.total_secs = started.elapsed().as_secs_f64();
    Ok((results, report))
}

/// Run detection on the first `limit` images and score the results.
pub fn evaluate_coco<S, D>(
    images: &S,
    image_ids: &[u64],
    detector: &mut D,
    categories: &dyn CategoryLookup,
    scorer: &mut dyn CocoScorer,
    eval_type: EvalType,
    limit: usize,
) -> Result<EvalReport>
where
    S: ImageSource,
    D: Detector<S::Image>,
{
    let started = Instant::now();
    let image_ids = limit_images(image_ids, limit);
    tracing::info!("Running COCO evaluation on {} images.", image_ids.len());

    let (results, mut report) = collect_coco_results(images, image_ids, detector, categories)?;

    scorer.load_res(&results)?;
    scorer.evaluate(eval_type, image_ids)?;
    scorer.accumulate()?;
    scorer.summarize()?;

    report.total_secs = started.elapsed().as_secs_f64();
    report.log_timings();
    Ok(report)
}

/// Write result records as a COCO results JSON array.
pub fn write_results(path: &Path, results: &[DetectionResult]) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| Error::io(format!("creating {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, results).map_err(Error::serialization)?;
    writer.flush().map_err(|e| Error::io(format!("writing {}", path.display()), e))
}

/// One line of a recorded detection stream
///
/// `rois` rows are `[top, left, bottom, right]`; each mask is `height` rows of
/// `width` pixels.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawDetections {
    pub image_id: u64,
    #[serde(default)]
    pub rois: Option<Vec<[f64; 4]>>,
    #[serde(default)]
    pub class_ids: Vec<usize>,
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default)]
    pub masks: Vec<Vec<Vec<u8>>>,
}

impl RawDetections {
    /// Convert to array form, checking mask dimensions.
    pub fn into_output(self) -> Result<DetectorOutput> {
        let image_id = self.image_id;
        let invalid = |message: String| Error::InvalidDetections { image_id, message };

        let rois = match self.rois {
            Some(rows) => {
                let n = rows.len();
                let flat: Vec<f64> = rows.into_iter().flatten().collect();
                Some(Array2::from_shape_vec((n, 4), flat).map_err(|e| invalid(e.to_string()))?)
            }
            None => None,
        };

        let n = self.masks.len();
        let height = self.masks.first().map_or(0, Vec::len);
        let width = self.masks.first().and_then(|m| m.first()).map_or(0, Vec::len);
        let mut masks = Array3::<u8>::zeros((height, width, n));
        for (i, mask) in self.masks.iter().enumerate() {
            if mask.len() != height || mask.iter().any(|row| row.len() != width) {
                return Err(invalid(format!("mask {i} is not {height}x{width}")));
            }
            for (y, row) in mask.iter().enumerate() {
                for (x, &pixel) in row.iter().enumerate() {
                    masks[[y, x, i]] = pixel;
                }
            }
        }

        Ok(DetectorOutput { rois, class_ids: self.class_ids, scores: self.scores, masks })
    }
}

/// Image source for detectors that look images up by id themselves
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageIds;

impl ImageSource for ImageIds {
    type Image = u64;

    fn load_image(&self, image_id: u64) -> Result<u64> {
        Ok(image_id)
    }
}

/// Detector backed by a recorded detection stream
///
/// Pair with [`ImageIds`]; images without a record yield no detections.
#[derive(Clone, Debug, Default)]
pub struct RecordedDetector {
    outputs: HashMap<u64, DetectorOutput>,
}

impl RecordedDetector {
    /// Parse a JSON-lines stream of [`RawDetections`].
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut outputs = HashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::io("reading detection stream", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let raw: RawDetections = serde_json::from_str(&line).map_err(|e| {
                Error::serialization(format!("detection stream line {}: {e}", lineno + 1))
            })?;
            outputs.insert(raw.image_id, raw.into_output()?);
        }
        Ok(Self { outputs })
    }

    /// Parse a JSON-lines detection stream from a file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Number of images with a record
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Check if no images were recorded
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Detector<u64> for RecordedDetector {
    fn detect(&mut self, image: &u64) -> Result<DetectorOutput> {
        Ok(self.outputs.get(image).cloned().unwrap_or_else(DetectorOutput::empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::coco::CategoryMap;
    use crate::eval::dataset::CocoCategory;

    #[derive(Default)]
    struct RecordingScorer {
        calls: Vec<String>,
        loaded: usize,
        image_ids: Vec<u64>,
    }

    impl CocoScorer for RecordingScorer {
        fn load_res(&mut self, results: &[DetectionResult]) -> Result<()> {
            self.calls.push("load_res".into());
            self.loaded = results.len();
            Ok(())
        }

        fn evaluate(&mut self, eval_type: EvalType, image_ids: &[u64]) -> Result<()> {
            self.calls.push(format!("evaluate:{eval_type}"));
            self.image_ids = image_ids.to_vec();
            Ok(())
        }

        fn accumulate(&mut self) -> Result<()> {
            self.calls.push("accumulate".into());
            Ok(())
        }

        fn summarize(&mut self) -> Result<()> {
            self.calls.push("summarize".into());
            Ok(())
        }
    }

    fn categories() -> CategoryMap {
        CategoryMap::from_categories(&[CocoCategory { id: 1, name: "filament".into() }])
    }

    const STREAM: &str = concat!(
        r#"{"image_id": 10, "rois": [[1, 2, 3, 4]], "class_ids": [1], "scores": [0.8], "masks": [[[0, 1], [1, 1]]]}"#,
        "\n",
        r#"{"image_id": 11, "rois": null}"#,
        "\n",
        r#"{"image_id": 12, "rois": [[0, 0, 2, 2], [1, 1, 2, 2]], "class_ids": [1, 1], "scores": [0.5, 0.4], "masks": [[[1, 0], [0, 0]], [[0, 0], [0, 1]]]}"#,
        "\n"
    );

    #[test]
    fn test_eval_type_parse() {
        assert_eq!("segm".parse::<EvalType>().unwrap(), EvalType::Segm);
        assert_eq!("BBOX".parse::<EvalType>().unwrap(), EvalType::Bbox);
        assert!("keypoints".parse::<EvalType>().is_err());
    }

    #[test]
    fn test_limit_images() {
        let ids = [1, 2, 3];
        assert_eq!(limit_images(&ids, 0), &[1, 2, 3]);
        assert_eq!(limit_images(&ids, 2), &[1, 2]);
        assert_eq!(limit_images(&ids, 10), &[1, 2, 3]);
    }

    #[test]
    fn test_recorded_detector_parses_stream() {
        let detector = RecordedDetector::from_reader(STREAM.as_bytes()).unwrap();
        assert_eq!(detector.len(), 3);
    }

    #[test]
    fn test_raw_detections_reject_ragged_masks() {
        let raw = RawDetections {
            image_id: 4,
            rois: Some(vec![[0.0; 4], [0.0; 4]]),
            class_ids: vec![1, 1],
            scores: vec![0.1, 0.2],
            masks: vec![vec![vec![1, 0]], vec![vec![1]]],
        };
        let err = raw.into_output().unwrap_err();
        assert!(matches!(err, Error::InvalidDetections { image_id: 4, .. }));
    }

    #[test]
    fn test_evaluate_coco_calls_scorer_in_order() {
        let mut detector = RecordedDetector::from_reader(STREAM.as_bytes()).unwrap();
        let mut scorer = RecordingScorer::default();

        let report = evaluate_coco(
            &ImageIds,
            &[10, 11, 12, 13],
            &mut detector,
            &categories(),
            &mut scorer,
            EvalType::Segm,
            3,
        )
        .unwrap();

        assert_eq!(report.images, 3);
        assert_eq!(report.detections, 3);
        assert_eq!(scorer.loaded, 3);
        assert_eq!(scorer.image_ids, vec![10, 11, 12]);
        assert_eq!(scorer.calls, vec!["load_res", "evaluate:segm", "accumulate", "summarize"]);
    }

    #[test]
    fn test_collect_results_bbox_and_mask() {
        let mut detector = RecordedDetector::from_reader(STREAM.as_bytes()).unwrap();
        let (results, report) =
            collect_coco_results(&ImageIds, &[10], &mut detector, &categories()).unwrap();

        assert_eq!(report.images, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bbox, [2.0, 1.0, 2.0, 2.0]);
        assert_eq!(results[0].segmentation.decompress().unwrap().counts, vec![1, 3]);
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_results(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_report_average() {
        let report = EvalReport { images: 4, prediction_secs: 2.0, ..Default::default() };
        assert_eq!(report.avg_prediction_secs(), 0.5);
        assert_eq!(EvalReport::default().avg_prediction_secs(), 0.0);
    }
}
