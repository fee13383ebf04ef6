pub mod classify;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

pub use classify::{ClassPrediction, Classifier, ClassifierModel};
pub use model::{load_model, ModelError, SharedModel, TensorModel};
pub use pipeline::{ModelSet, PredictError, Predictor, SegmentationModel, SegmentationOutcome};
