use ndarray::{ArrayD, ArrayViewD};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ModelSpec, TensorLayout};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to load model from {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("Model {model} forward pass failed: {reason}")]
    Forward { model: String, reason: String },
    #[error("Unexpected output shape from {model}: {shape:?}")]
    OutputShape { model: String, shape: Vec<usize> },
    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "No model backend compiled in; rebuild with `--features torch` to load {}",
        .0.display()
    )]
    BackendUnavailable(PathBuf),
}

/// An opaque pre-trained network: a function from one tensor to another.
///
/// Image models receive NHWC batches with values in [0,1]. The meta model receives a
/// `1×N` row of concatenated probabilities. Implementations must be safe to call from
/// several request threads at once; backends that are not reentrant serialize internally.
pub trait TensorModel: Send + Sync {
    fn name(&self) -> &str;

    fn forward(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError>;
}

pub type SharedModel = Arc<dyn TensorModel>;

/// Loads a model artifact with whichever backend this build was compiled with.
pub fn load_model(dir: &Path, spec: &ModelSpec) -> Result<SharedModel, ModelError> {
    let path = spec.path(dir);
    if !path.exists() {
        return Err(ModelError::Load {
            path,
            reason: "file not found".to_string(),
        });
    }
    log::info!("Loading model {} ({:?} layout)", path.display(), spec.layout);
    load_with_backend(&path, spec.layout)
}

#[cfg(feature = "torch")]
fn load_with_backend(path: &Path, layout: TensorLayout) -> Result<SharedModel, ModelError> {
    let model = super::torch::TorchModel::load(path, layout)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "torch"))]
fn load_with_backend(path: &Path, _layout: TensorLayout) -> Result<SharedModel, ModelError> {
    Err(ModelError::BackendUnavailable(path.to_path_buf()))
}
