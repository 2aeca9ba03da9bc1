//! Starting-weights selection for `--model`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::RunConfig;
use crate::error::Result;
use crate::train::find_last;

/// Head layers re-initialised when starting from COCO weights, since their
/// shapes depend on the number of classes.
pub const COCO_EXCLUDED_LAYERS: [&str; 4] =
    ["mrcnn_class_logits", "mrcnn_bbox_fc", "mrcnn_bbox", "mrcnn_mask"];

/// Where the initial weights come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WeightsSource {
    /// Most recent checkpoint of the newest run
    Last,
    /// ImageNet-pretrained backbone
    ImageNet,
    /// COCO-pretrained model, heads excluded
    CoCo,
    /// No pretrained weights
    Random,
    /// Explicit weights file
    Path(PathBuf),
}

impl FromStr for WeightsSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("weights source is empty".to_string());
        }
        Ok(match s.to_lowercase().as_str() {
            "last" => WeightsSource::Last,
            "imagenet" => WeightsSource::ImageNet,
            "coco" => WeightsSource::CoCo,
            "random" => WeightsSource::Random,
            _ => WeightsSource::Path(PathBuf::from(s)),
        })
    }
}

impl fmt::Display for WeightsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightsSource::Last => f.write_str("last"),
            WeightsSource::ImageNet => f.write_str("ImageNet"),
            WeightsSource::CoCo => f.write_str("CoCo"),
            WeightsSource::Random => f.write_str("random"),
            WeightsSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolved weights file and the layers not to load from it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightsPlan {
    /// `None` means random initialisation
    pub path: Option<PathBuf>,
    pub exclude: Vec<&'static str>,
}

impl WeightsSource {
    /// Resolve against the run configuration.
    ///
    /// `Last` searches the newest run directory under `log_dir` and fails with
    /// `CheckpointNotFound` when there is none.
    pub fn resolve(&self, config: &RunConfig) -> Result<WeightsPlan> {
        let plan = |path: &Path, exclude: Vec<&'static str>| WeightsPlan {
            path: Some(path.to_path_buf()),
            exclude,
        };
        Ok(match self {
            WeightsSource::Last => plan(&find_last(&config.log_dir, &config.name)?, Vec::new()),
            WeightsSource::ImageNet => plan(&config.imagenet_weights, Vec::new()),
            WeightsSource::CoCo => plan(&config.coco_weights, COCO_EXCLUDED_LAYERS.to_vec()),
            WeightsSource::Random => WeightsPlan { path: None, exclude: Vec::new() },
            WeightsSource::Path(path) => plan(path, Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("LAST".parse::<WeightsSource>().unwrap(), WeightsSource::Last);
        assert_eq!("imagenet".parse::<WeightsSource>().unwrap(), WeightsSource::ImageNet);
        assert_eq!("CoCo".parse::<WeightsSource>().unwrap(), WeightsSource::CoCo);
        assert_eq!("Random".parse::<WeightsSource>().unwrap(), WeightsSource::Random);
        assert_eq!(
            "weights/custom.h5".parse::<WeightsSource>().unwrap(),
            WeightsSource::Path(PathBuf::from("weights/custom.h5"))
        );
        assert!("".parse::<WeightsSource>().is_err());
    }

    #[test]
    fn test_resolve_coco_excludes_heads() {
        let plan = WeightsSource::CoCo.resolve(&RunConfig::default()).unwrap();
        assert_eq!(plan.path, Some(PathBuf::from("mask_rcnn_coco.h5")));
        assert_eq!(plan.exclude, COCO_EXCLUDED_LAYERS.to_vec());
    }

    #[test]
    fn test_resolve_random_has_no_path() {
        let plan = WeightsSource::Random.resolve(&RunConfig::default()).unwrap();
        assert_eq!(plan.path, None);
        assert!(plan.exclude.is_empty());
    }

    #[test]
    fn test_resolve_last_finds_newest_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("filament20240102T0930");
        std::fs::create_dir_all(&run).unwrap();
        std::fs::write(run.join("mask_rcnn_filament_0001.h5"), b"").unwrap();
        std::fs::write(run.join("mask_rcnn_filament_0003.h5"), b"").unwrap();

        let config = RunConfig { log_dir: dir.path().to_path_buf(), ..RunConfig::default() };
        let plan = WeightsSource::Last.resolve(&config).unwrap();
        assert_eq!(plan.path, Some(run.join("mask_rcnn_filament_0003.h5")));
    }

    #[test]
    fn test_resolve_last_without_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig { log_dir: dir.path().to_path_buf(), ..RunConfig::default() };
        let err = WeightsSource::Last.resolve(&config).unwrap_err();
        assert!(matches!(err, Error::CheckpointNotFound { .. }));
    }
}
