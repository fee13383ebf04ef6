mod common;

use neurodl_backend::evaluation::{discover_dataset, evaluate};
use neurodl_backend::inference::{Classifier, ClassifierModel};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::*;

/// Writes `count` JPEGs of the given grey level under `root/<class>/`.
fn write_class(root: &Path, class: &str, level: u8, count: usize) {
    let dir = root.join(class);
    fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        let path = dir.join(format!("{}_{}.jpg", class, i));
        fs::write(path, jpeg_bytes(40, 40, [level; 3])).unwrap();
    }
}

fn brightness_dataset() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "glioma_tumor", 20, 3);
    write_class(dir.path(), "meningioma_tumor", 90, 2);
    write_class(dir.path(), "no_tumor", 150, 2);
    // deliberately as bright as no_tumor so the classifier gets them wrong
    write_class(dir.path(), "pituitary_tumor", 150, 1);
    dir
}

#[test]
fn single_classifier_report() {
    let dir = brightness_dataset();
    let dataset = discover_dataset(dir.path()).unwrap();
    let classifier = Classifier::Single(ClassifierModel::new(Arc::new(BrightnessModel), false));

    let mut ticks = 0;
    let report = evaluate(&classifier, &dataset, || ticks += 1).unwrap();
    assert_eq!(ticks, 8);
    assert_eq!(report.total_images, 8);
    assert_eq!(report.skipped_images, 0);
    assert_eq!(report.models.len(), 1);
    assert!((report.models[0].accuracy - 7.0 / 8.0).abs() < 1e-9);
    assert_eq!(report.confusion_matrix.counts[3], vec![0, 0, 1, 0]);
    assert_eq!(report.confusion_matrix.counts[0], vec![3, 0, 0, 0]);
    assert!(report.ensemble_improvement.is_none());
    assert_eq!(report.best_model, "brightness");

    let summary = report.render_summary();
    assert!(summary.contains("pituitary_tumor"));
    assert!(summary.contains("87.50%"));
}

#[test]
fn ensemble_report_scores_every_member() {
    let dir = brightness_dataset();
    let dataset = discover_dataset(dir.path()).unwrap();
    let classifier = Classifier::Ensemble {
        primary: ClassifierModel::new(Arc::new(BrightnessModel), false),
        // always predicts glioma
        secondary: ClassifierModel::new(FixedModel::new(one_hot(0, 0.9)), false),
        // always predicts no tumor
        meta: ClassifierModel::new(FixedModel::new(one_hot(2, 0.9)), false),
    };

    let report = evaluate(&classifier, &dataset, || {}).unwrap();
    let accuracies: Vec<f64> = report.models.iter().map(|m| m.accuracy).collect();
    assert!((accuracies[0] - 0.875).abs() < 1e-9);
    assert!((accuracies[1] - 0.375).abs() < 1e-9);
    assert!((accuracies[2] - 0.25).abs() < 1e-9);
    assert_eq!(report.final_model, "fixed");
    assert_eq!(report.best_model, "brightness");
    assert!((report.ensemble_improvement.unwrap() + 62.5).abs() < 1e-6);
    assert_eq!(report.confusion_matrix.predicted_total(2), 8);
}

#[test]
fn unreadable_images_are_skipped_and_report_is_written() {
    let dir = brightness_dataset();
    fs::write(dir.path().join("no_tumor").join("corrupt.jpg"), b"garbage").unwrap();
    let dataset = discover_dataset(dir.path()).unwrap();
    assert_eq!(dataset.len(), 9);

    let classifier = Classifier::Single(ClassifierModel::new(Arc::new(BrightnessModel), false));
    let report = evaluate(&classifier, &dataset, || {}).unwrap();
    assert_eq!(report.skipped_images, 1);
    assert_eq!(report.total_images, 8);

    let out = tempfile::tempdir().unwrap();
    let path = report.write_json(&out.path().join("evaluation")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["total_images"], 8);
    assert_eq!(json["class_labels"][2], "no_tumor");
    assert_eq!(json["per_class"].as_array().unwrap().len(), 4);
}

#[test]
fn classes_without_images_are_left_out_of_per_class_accuracy() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "glioma_tumor", 20, 2);
    write_class(dir.path(), "meningioma_tumor", 90, 1);
    write_class(dir.path(), "no_tumor", 150, 1);
    fs::create_dir_all(dir.path().join("pituitary_tumor")).unwrap();
    let dataset = discover_dataset(dir.path()).unwrap();
    assert_eq!(dataset.class_counts(), vec![2, 1, 1, 0]);

    let classifier = Classifier::Single(ClassifierModel::new(Arc::new(BrightnessModel), false));
    let report = evaluate(&classifier, &dataset, || {}).unwrap();
    let summary = report.render_summary();
    let (_, per_class) = summary.split_once("Per-class accuracy").unwrap();
    assert!(per_class.contains("glioma_tumor"));
    assert!(!per_class.contains("pituitary_tumor"));
    assert!(!per_class.contains("(0 images)"));
}
