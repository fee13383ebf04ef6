use image::RgbImage;
use sha2::{Digest, Sha256};
use shared::{class_name, PredictionResponse, TumorClass};
use std::panic::{self, AssertUnwindSafe};
use uuid::Uuid;

use super::classify::{ClassPrediction, Classifier, ClassifierModel};
use super::model::{load_model, ModelError, SharedModel};
use super::overlay::{encode_overlay, mask_from_output, render_overlay, OverlayError};
use super::preprocess::{decode_image, preprocess};
use crate::config::{ClassifierConfig, ModelSpec, ModelsConfig, OverlayConfig, ServiceConfig};

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Classification failed: {0}")]
    Classification(#[from] ModelError),
}

#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    #[error("segmentation model is not loaded")]
    ModelUnavailable,
    #[error("segmentation inference failed: {0}")]
    Model(#[from] ModelError),
    #[error("overlay rendering failed: {0}")]
    Overlay(#[from] OverlayError),
    #[error("segmentation panicked: {0}")]
    Panicked(String),
}

/// What the segmentation stage produced for one request.
#[derive(Debug)]
pub enum SegmentationOutcome {
    /// The classifier found no tumor, so nothing was attempted.
    Skipped,
    /// Base64 JPEG of the original image with the mask blended on top.
    Rendered(String),
    /// Segmentation was attempted and failed; the classification still stands.
    Degraded(SegmentationError),
}

impl SegmentationOutcome {
    pub fn performed(&self) -> bool {
        matches!(self, SegmentationOutcome::Rendered(_))
    }

    pub fn into_image(self) -> Option<String> {
        match self {
            SegmentationOutcome::Rendered(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SegmentationModel {
    pub model: SharedModel,
    pub input_size: u32,
}

/// The frozen set of model handles and settings a [`Predictor`] runs with.
#[derive(Clone)]
pub struct ModelSet {
    pub classifier: Classifier,
    pub segmentation: Option<SegmentationModel>,
}

impl ModelSet {
    /// Loads every configured artifact. Called once at startup; the result is never mutated.
    pub fn load(config: &ModelsConfig) -> Result<Self, ModelError> {
        let dir = config.dir.as_path();
        let member = |spec: &ModelSpec| -> Result<ClassifierModel, ModelError> {
            let model = ClassifierModel::new(load_model(dir, spec)?, spec.softmax);
            Ok(match spec.input_size {
                Some(size) => model.with_input_size(size),
                None => model,
            })
        };

        let classifier = match &config.classifier {
            ClassifierConfig::Single { model } => Classifier::Single(member(model)?),
            ClassifierConfig::Ensemble {
                primary,
                secondary,
                meta,
            } => {
                if meta.input_size.is_some() {
                    log::warn!(
                        "Ignoring input_size on meta model {}; it consumes probability rows",
                        meta.file
                    );
                }
                Classifier::Ensemble {
                    primary: member(primary)?,
                    secondary: member(secondary)?,
                    meta: member(meta)?,
                }
            }
        };

        let segmentation = match &config.segmentation {
            Some(spec) => Some(SegmentationModel {
                model: load_model(dir, spec)?,
                input_size: spec.input_size.unwrap_or(256),
            }),
            None => {
                log::warn!("No segmentation model configured; overlays are disabled");
                None
            }
        };

        Ok(Self {
            classifier,
            segmentation,
        })
    }
}

/// Runs the full request flow: decode, classify, conditionally segment, assemble.
///
/// Holds only read-only state and is shared across all HTTP workers.
pub struct Predictor {
    models: ModelSet,
    overlay: OverlayConfig,
    service: ServiceConfig,
}

impl Predictor {
    pub fn new(models: ModelSet, overlay: OverlayConfig, service: ServiceConfig) -> Self {
        Self {
            models,
            overlay,
            service,
        }
    }

    pub fn segmentation_loaded(&self) -> bool {
        self.models.segmentation.is_some()
    }

    pub fn is_ensemble(&self) -> bool {
        self.models.classifier.is_ensemble()
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    pub fn predict(
        &self,
        image_bytes: &[u8],
        filename: &str,
    ) -> Result<PredictionResponse, PredictError> {
        let request_id = Uuid::new_v4();
        log::info!(
            "[{}] Processing {} ({} bytes, sha256 {})",
            request_id,
            filename,
            image_bytes.len(),
            image_digest(image_bytes)
        );

        let image = decode_image(image_bytes)?;
        let prediction = self.classify(&image)?;
        let name = class_name(prediction.class_index);
        log::info!(
            "[{}] Result: {} - Confidence: {}",
            request_id,
            name,
            prediction.confidence_percent()
        );

        let outcome = self.segment(&image, &prediction);
        match &outcome {
            SegmentationOutcome::Skipped => {
                log::info!("[{}] No tumor - segmentation skipped", request_id)
            }
            SegmentationOutcome::Rendered(_) => {
                log::info!("[{}] Segmentation complete", request_id)
            }
            SegmentationOutcome::Degraded(e) => {
                log::warn!("[{}] Segmentation failed: {}", request_id, e)
            }
        }

        Ok(PredictionResponse {
            final_class: prediction.class_index,
            class_name: name,
            confidence: prediction.confidence_percent(),
            model_used: self.service.model_name.clone(),
            model_accuracy: self.service.model_accuracy.clone(),
            segmentation_performed: outcome.performed(),
            segment_image: outcome.into_image(),
        })
    }

    pub fn classify(&self, image: &RgbImage) -> Result<ClassPrediction, PredictError> {
        Ok(self.models.classifier.classify(image)?)
    }

    /// Runs segmentation for tumor classes. Errors and panics are folded into the outcome.
    pub fn segment(&self, image: &RgbImage, prediction: &ClassPrediction) -> SegmentationOutcome {
        let is_tumor = TumorClass::from_index(prediction.class_index)
            .map(TumorClass::is_tumor)
            .unwrap_or(true);
        if !is_tumor {
            return SegmentationOutcome::Skipped;
        }
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| self.render_segmentation(image)))
            .unwrap_or_else(|payload| Err(SegmentationError::Panicked(panic_message(&*payload))));
        match rendered {
            Ok(encoded) => SegmentationOutcome::Rendered(encoded),
            Err(e) => SegmentationOutcome::Degraded(e),
        }
    }

    fn render_segmentation(&self, image: &RgbImage) -> Result<String, SegmentationError> {
        let segmentation = self
            .models
            .segmentation
            .as_ref()
            .ok_or(SegmentationError::ModelUnavailable)?;
        let tensor = preprocess(image, segmentation.input_size);
        let output = segmentation.model.forward(tensor.into_dyn().view())?;
        let mask = mask_from_output(&output)?;
        let overlay = render_overlay(image, &mask, &self.overlay);
        Ok(encode_overlay(&overlay, self.overlay.jpeg_quality)?)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn image_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
