//! Evaluate command implementation

use std::path::{Path, PathBuf};

use super::load_config;
use crate::config::{apply_overrides, EvaluateArgs};
use crate::error::{Error, Result};
use crate::eval::{
    collect_coco_results, limit_images, write_results, CocoAnnotationFile, DatasetPaths, ImageIds,
    RecordedDetector, Subset,
};

/// Format recorded detections for the validation split and write the results file.
///
/// Returns the path written.
pub(crate) fn run_evaluate(args: &EvaluateArgs, config_path: Option<&Path>) -> Result<PathBuf> {
    let eval_type = args.eval_type.ok_or(Error::MissingEvalType)?;

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args.common);

    let weights = args.common.model.resolve(&config)?;
    if let Some(path) = &weights.path {
        tracing::info!("Loading weights {}", path.display());
    }

    let paths = DatasetPaths::new(&config.dataset_dir);
    let annotations = CocoAnnotationFile::load(&paths.annotations(Subset::Val(args.common.year)))?;
    let categories = annotations.category_map();
    let image_ids = annotations.image_ids();
    let image_ids = limit_images(&image_ids, args.common.limit);
    tracing::info!("Running COCO evaluation on {} images.", image_ids.len());

    let mut detector = RecordedDetector::from_path(&args.detections)?;
    let (results, report) = collect_coco_results(&ImageIds, image_ids, &mut detector, &categories)?;
    report.log_timings();

    let output = match &args.output {
        Some(path) => path.clone(),
        None => {
            std::fs::create_dir_all(&config.log_dir)
                .map_err(|e| Error::io(format!("creating {}", config.log_dir.display()), e))?;
            config.log_dir.join(format!("coco_results_{eval_type}.json"))
        }
    };
    write_results(&output, &results)?;
    tracing::info!("Wrote {} results to {}", results.len(), output.display());
    Ok(output)
}
