//! Tests for CLI argument parsing

use super::*;
use crate::config::{Patience, RunConfig};
use crate::eval::EvalType;
use std::path::PathBuf;

#[test]
fn test_parse_train_command() {
    let cli = parse_args(["filament-train", "train", "--metrics", "run.jsonl"]).unwrap();
    match cli.command {
        Command::Train(args) => {
            assert_eq!(args.metrics, PathBuf::from("run.jsonl"));
            assert_eq!(args.common.model, WeightsSource::ImageNet);
            assert_eq!(args.common.limit, 500);
            assert_eq!(args.common.year, 2016);
            assert_eq!(args.patience, None);
        }
        _ => panic!("Expected Train command"),
    }
}

#[test]
fn test_parse_train_with_overrides() {
    let cli = parse_args([
        "filament-train",
        "train",
        "--metrics",
        "run.jsonl",
        "--dataset",
        "/data/filaments",
        "--logs",
        "./logs",
        "--model",
        "coco",
        "--patience",
        "unbounded",
    ])
    .unwrap();

    match cli.command {
        Command::Train(args) => {
            assert_eq!(args.common.dataset, Some(PathBuf::from("/data/filaments")));
            assert_eq!(args.common.logs, Some(PathBuf::from("./logs")));
            assert_eq!(args.common.model, WeightsSource::CoCo);
            assert_eq!(args.patience, Some(Patience::Unbounded));
        }
        _ => panic!("Expected Train command"),
    }
}

#[test]
fn test_parse_train_requires_metrics() {
    assert!(parse_args(["filament-train", "train"]).is_err());
}

#[test]
fn test_parse_evaluate_command() {
    let cli = parse_args([
        "filament-train",
        "evaluate",
        "--eval_type",
        "segm",
        "--detections",
        "val.jsonl",
        "--limit",
        "0",
        "--year",
        "2013",
    ])
    .unwrap();

    match cli.command {
        Command::Evaluate(args) => {
            assert_eq!(args.eval_type, Some(EvalType::Segm));
            assert_eq!(args.detections, PathBuf::from("val.jsonl"));
            assert_eq!(args.common.limit, 0);
            assert_eq!(args.common.year, 2013);
            assert_eq!(args.output, None);
        }
        _ => panic!("Expected Evaluate command"),
    }
}

#[test]
fn test_parse_evaluate_without_eval_type() {
    // Accepted by the parser; the command reports the missing type.
    let cli = parse_args(["filament-train", "evaluate", "--detections", "val.jsonl"]).unwrap();
    match cli.command {
        Command::Evaluate(args) => assert_eq!(args.eval_type, None),
        _ => panic!("Expected Evaluate command"),
    }
}

#[test]
fn test_parse_evaluate_rejects_unknown_eval_type() {
    let result = parse_args([
        "filament-train",
        "evaluate",
        "--eval_type",
        "keypoints",
        "--detections",
        "val.jsonl",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_global_flags() {
    let cli = parse_args([
        "filament-train",
        "-v",
        "--config",
        "run.yaml",
        "train",
        "--metrics",
        "run.jsonl",
    ])
    .unwrap();
    assert!(cli.verbose);
    assert!(!cli.quiet);
    assert_eq!(cli.config, Some(PathBuf::from("run.yaml")));

    let cli = parse_args(["filament-train", "train", "--metrics", "m.jsonl", "-q"]).unwrap();
    assert!(cli.quiet);
}

#[test]
fn test_unknown_command() {
    assert!(parse_args(["filament-train", "unknown"]).is_err());
}

#[test]
fn test_apply_train_overrides() {
    let cli = parse_args([
        "filament-train",
        "train",
        "--metrics",
        "run.jsonl",
        "--logs",
        "/tmp/logs",
        "--patience",
        "4",
    ])
    .unwrap();
    let Command::Train(args) = cli.command else { panic!("Expected Train command") };

    let mut config = RunConfig::default();
    apply_train_overrides(&mut config, &args);
    assert_eq!(config.log_dir, PathBuf::from("/tmp/logs"));
    assert_eq!(config.dataset_dir, PathBuf::from("dataset"));
    assert_eq!(config.early_stopping.patience, Patience::Epochs(4));
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_limit_parses(limit in 0usize..100_000) {
            let limit_str = limit.to_string();
            let cli = parse_args([
                "filament-train", "evaluate",
                "--detections", "d.jsonl",
                "--limit", &limit_str,
            ]).unwrap();
            match cli.command {
                Command::Evaluate(args) => prop_assert_eq!(args.common.limit, limit),
                _ => prop_assert!(false, "Expected Evaluate command"),
            }
        }

        #[test]
        fn prop_patience_parses(patience in 1usize..10_000) {
            let patience_str = patience.to_string();
            let cli = parse_args([
                "filament-train", "train",
                "--metrics", "m.jsonl",
                "--patience", &patience_str,
            ]).unwrap();
            match cli.command {
                Command::Train(args) => {
                    prop_assert_eq!(args.patience, Some(Patience::Epochs(patience)));
                }
                _ => prop_assert!(false, "Expected Train command"),
            }
        }

        #[test]
        fn prop_model_keywords_case_insensitive(
            model in prop::sample::select(vec!["last", "LAST", "imagenet", "ImageNet", "coco", "COCO", "random"])
        ) {
            let source = model.parse::<WeightsSource>().unwrap();
            prop_assert!(!matches!(source, WeightsSource::Path(_)));
        }
    }
}
