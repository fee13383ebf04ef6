use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use super::dataset::Dataset;
use super::metrics::{accuracy, ClassMetrics, ConfusionMatrix};
use super::EvaluationError;
use crate::inference::classify::{argmax, Classifier};
use crate::inference::preprocess::into_rgb;

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub generated_at: String,
    pub dataset: String,
    pub class_labels: Vec<String>,
    pub total_images: usize,
    pub skipped_images: usize,
    pub models: Vec<ModelSummary>,
    /// The model whose output drives the served prediction (the meta model for ensembles).
    pub final_model: String,
    pub confusion_matrix: ConfusionMatrix,
    pub per_class: Vec<ClassMetrics>,
    /// Final-model accuracy minus the best base model's, in percentage points.
    pub ensemble_improvement: Option<f64>,
    pub best_model: String,
}

/// Scores every member of `classifier` on the dataset.
///
/// `on_progress` is called once per sample, including ones skipped because they fail to decode.
pub fn evaluate<F>(
    classifier: &Classifier,
    dataset: &Dataset,
    mut on_progress: F,
) -> Result<EvaluationReport, EvaluationError>
where
    F: FnMut(),
{
    let mut names: Vec<String> = Vec::new();
    let mut predictions: Vec<Vec<usize>> = Vec::new();
    let mut truth = Vec::with_capacity(dataset.len());
    let mut skipped = 0;

    for sample in &dataset.samples {
        on_progress();
        let image = match image::open(&sample.path) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Skipping {}: {}", sample.path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let trace = classifier.classify_traced(&into_rgb(image))?;
        if names.is_empty() {
            names = trace.members.iter().map(|(name, _)| name.clone()).collect();
            predictions = vec![Vec::with_capacity(dataset.len()); names.len()];
        }
        for (slot, (_, probs)) in predictions.iter_mut().zip(&trace.members) {
            // an all-NaN row can never match a label
            slot.push(argmax(probs).unwrap_or(usize::MAX));
        }
        truth.push(sample.label);
    }

    if truth.is_empty() {
        return Err(EvaluationError::EmptyDataset(dataset.root.clone()));
    }

    let models: Vec<ModelSummary> = names
        .iter()
        .zip(&predictions)
        .map(|(name, preds)| ModelSummary {
            name: name.clone(),
            accuracy: accuracy(&truth, preds),
        })
        .collect();

    let final_index = models.len() - 1;
    let final_predictions = &predictions[final_index];
    let confusion_matrix =
        ConfusionMatrix::new(&truth, final_predictions, dataset.class_labels.len());
    let per_class = confusion_matrix.per_class(&dataset.class_labels);

    let ensemble_improvement = if classifier.is_ensemble() {
        let best_base = models[..final_index]
            .iter()
            .map(|m| m.accuracy)
            .fold(0.0, f64::max);
        Some((models[final_index].accuracy - best_base) * 100.0)
    } else {
        None
    };

    // first model wins ties, matching the order members are reported in
    let best_model = models
        .iter()
        .fold(None::<&ModelSummary>, |best, m| match best {
            Some(b) if b.accuracy >= m.accuracy => Some(b),
            _ => Some(m),
        })
        .map(|m| m.name.clone())
        .unwrap_or_default();

    Ok(EvaluationReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        dataset: dataset.root.display().to_string(),
        class_labels: dataset.class_labels.clone(),
        total_images: truth.len(),
        skipped_images: skipped,
        final_model: models[final_index].name.clone(),
        models,
        confusion_matrix,
        per_class,
        ensemble_improvement,
        best_model,
    })
}

impl EvaluationReport {
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<24} {:>9}", "Model", "Accuracy");
        let _ = writeln!(out, "{}", "-".repeat(34));
        for model in &self.models {
            let _ = writeln!(out, "{:<24} {:>8.2}%", model.name, model.accuracy * 100.0);
        }
        if let Some(improvement) = self.ensemble_improvement {
            let _ = writeln!(out, "Ensemble improvement: {:+.2}%", improvement);
        }

        let _ = writeln!(out, "\nClassification report ({})", self.final_model);
        let _ = writeln!(
            out,
            "{:<20} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        );
        for class in &self.per_class {
            let _ = writeln!(
                out,
                "{:<20} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class.label, class.precision, class.recall, class.f1, class.support
            );
        }

        let _ = writeln!(out, "\nConfusion matrix (rows = true, columns = predicted)");
        for (label, row) in self.class_labels.iter().zip(&self.confusion_matrix.counts) {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>6}", c)).collect();
            let _ = writeln!(out, "{:<20}{}", label, cells.join(""));
        }

        let _ = writeln!(out, "\nPer-class accuracy ({})", self.final_model);
        for (class, label) in self.class_labels.iter().enumerate() {
            if self.confusion_matrix.support(class) == 0 {
                continue;
            }
            let _ = writeln!(
                out,
                "  {:<20} {:>6.2}%  ({} images)",
                label,
                self.confusion_matrix.class_accuracy(class) * 100.0,
                self.confusion_matrix.support(class)
            );
        }
        let _ = writeln!(out, "\nBest model: {}", self.best_model);
        out
    }

    pub fn write_json(&self, output_dir: &Path) -> Result<std::path::PathBuf, EvaluationError> {
        std::fs::create_dir_all(output_dir).map_err(|source| EvaluationError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let path = output_dir.join("evaluation.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| EvaluationError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
