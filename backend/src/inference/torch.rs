use ndarray::{ArrayD, ArrayViewD, IxDyn};
use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, TchError, Tensor};

use super::model::{ModelError, TensorModel};
use crate::config::TensorLayout;

/// A TorchScript module loaded through libtorch.
pub struct TorchModel {
    name: String,
    device: Device,
    layout: TensorLayout,
    module: Mutex<CModule>,
}

impl TorchModel {
    pub fn load(path: &Path, layout: TensorLayout) -> Result<Self, ModelError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(path, device).map_err(|e| ModelError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        log::info!("Loaded TorchScript module {} on {:?}", name, device);
        Ok(Self {
            name,
            device,
            layout,
            module: Mutex::new(module),
        })
    }

    fn to_tensor(&self, input: &ArrayViewD<'_, f32>) -> Result<Tensor, TchError> {
        let dims: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::f_from_slice(&data)?.f_view(dims.as_slice())?;
        // image batches arrive as NHWC
        let tensor = if self.layout == TensorLayout::Nchw && dims.len() == 4 {
            tensor.f_permute([0, 3, 1, 2])?
        } else {
            tensor
        };
        tensor.f_to_device(self.device)
    }

    fn forward_err(&self, reason: impl ToString) -> ModelError {
        ModelError::Forward {
            model: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl TensorModel for TorchModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        let tensor = self.to_tensor(&input).map_err(|e| self.forward_err(e))?;
        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| self.forward_err("module lock poisoned"))?;
            tch::no_grad(|| module.forward_ts(&[tensor]))
                .map_err(|e| self.forward_err(e))?
        };
        let (shape, values) = host_values(&output).map_err(|e| self.forward_err(e))?;
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }
}

/// Copies a model output of any layout back to host memory as a shape and flat values.
fn host_values(output: &Tensor) -> Result<(Vec<usize>, Vec<f32>), TchError> {
    let output = output.f_to_kind(Kind::Float)?.f_to_device(Device::Cpu)?;
    let shape: Vec<usize> = output.size().iter().map(|&d| d as usize).collect();
    // reshape copies non-contiguous outputs
    let values = Vec::<f32>::try_from(&output.f_reshape([-1])?)?;
    Ok((shape, values))
}
