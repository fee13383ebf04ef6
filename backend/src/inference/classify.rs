use image::RgbImage;
use ndarray::{Array2, Array4, ArrayViewD};

use super::model::{ModelError, SharedModel};
use super::preprocess::preprocess;

pub const DEFAULT_INPUT_SIZE: u32 = 128;

/// Classification result for a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPrediction {
    pub probabilities: Vec<f32>,
    pub class_index: usize,
    pub confidence: f32,
}

impl ClassPrediction {
    pub fn from_probabilities(probabilities: Vec<f32>) -> Option<Self> {
        let class_index = argmax(&probabilities)?;
        let confidence = probabilities[class_index];
        Some(Self {
            probabilities,
            class_index,
            confidence,
        })
    }

    /// Confidence as a percentage string with two decimals, e.g. `"97.45%"`.
    pub fn confidence_percent(&self) -> String {
        format_percent(self.confidence)
    }
}

pub fn format_percent(fraction: f32) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Index of the largest value; the first one wins on ties. NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// A classifier member together with its post-processing flag and the square
/// resolution it was trained on. The meta model ignores `input_size`.
#[derive(Clone)]
pub struct ClassifierModel {
    pub model: SharedModel,
    pub softmax: bool,
    pub input_size: u32,
}

impl ClassifierModel {
    pub fn new(model: SharedModel, softmax: bool) -> Self {
        Self {
            model,
            softmax,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }

    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Runs the model and flattens its output into a probability row.
    pub fn probabilities(&self, input: ArrayViewD<'_, f32>) -> Result<Vec<f32>, ModelError> {
        let output = self.model.forward(input)?;
        let probabilities: Vec<f32> = output.iter().copied().collect();
        if probabilities.is_empty() {
            return Err(ModelError::OutputShape {
                model: self.name().to_string(),
                shape: output.shape().to_vec(),
            });
        }
        Ok(if self.softmax {
            softmax(&probabilities)
        } else {
            probabilities
        })
    }

    fn classify_image(&self, image: &RgbImage) -> Result<Vec<f32>, ModelError> {
        let tensor = preprocess(image, self.input_size);
        self.probabilities(tensor.view().into_dyn())
    }
}

/// The two classification arrangements the service can run.
#[derive(Clone)]
pub enum Classifier {
    Single(ClassifierModel),
    /// Two base classifiers whose probability rows are concatenated (primary first)
    /// and refined by a meta model.
    Ensemble {
        primary: ClassifierModel,
        secondary: ClassifierModel,
        meta: ClassifierModel,
    },
}

/// Per-member outputs of one classification, used by the evaluation tooling.
#[derive(Debug, Clone)]
pub struct ClassifierTrace {
    pub members: Vec<(String, Vec<f32>)>,
    pub final_probabilities: Vec<f32>,
}

impl Classifier {
    pub fn classify(&self, image: &RgbImage) -> Result<ClassPrediction, ModelError> {
        let trace = self.classify_traced(image)?;
        ClassPrediction::from_probabilities(trace.final_probabilities).ok_or_else(|| {
            ModelError::OutputShape {
                model: self.final_model_name().to_string(),
                shape: vec![0],
            }
        })
    }

    /// Each base model sees the image resized to its own input size; members that
    /// share a size share one preprocessed tensor.
    pub fn classify_traced(&self, image: &RgbImage) -> Result<ClassifierTrace, ModelError> {
        match self {
            Classifier::Single(model) => {
                let probs = model.classify_image(image)?;
                Ok(ClassifierTrace {
                    members: vec![(model.name().to_string(), probs.clone())],
                    final_probabilities: probs,
                })
            }
            Classifier::Ensemble {
                primary,
                secondary,
                meta,
            } => {
                let shared_size = primary.input_size == secondary.input_size;
                let (primary_probs, secondary_probs) = if shared_size {
                    let tensor: Array4<f32> = preprocess(image, primary.input_size);
                    (
                        primary.probabilities(tensor.view().into_dyn())?,
                        secondary.probabilities(tensor.view().into_dyn())?,
                    )
                } else {
                    (primary.classify_image(image)?, secondary.classify_image(image)?)
                };
                let combined = combine_predictions(&primary_probs, &secondary_probs)?;
                let meta_probs = meta.probabilities(combined.view().into_dyn())?;
                Ok(ClassifierTrace {
                    members: vec![
                        (primary.name().to_string(), primary_probs),
                        (secondary.name().to_string(), secondary_probs),
                        (meta.name().to_string(), meta_probs.clone()),
                    ],
                    final_probabilities: meta_probs,
                })
            }
        }
    }

    pub fn is_ensemble(&self) -> bool {
        matches!(self, Classifier::Ensemble { .. })
    }

    fn final_model_name(&self) -> &str {
        match self {
            Classifier::Single(model) => model.name(),
            Classifier::Ensemble { meta, .. } => meta.name(),
        }
    }
}

/// Stacks two probability rows side by side into the meta model's `1×(a+b)` input.
pub fn combine_predictions(primary: &[f32], secondary: &[f32]) -> Result<Array2<f32>, ModelError> {
    let row: Vec<f32> = primary.iter().chain(secondary).copied().collect();
    Ok(Array2::from_shape_vec((1, row.len()), row)?)
}
