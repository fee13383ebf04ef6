#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use neurodl_backend::config::{OverlayConfig, ServiceConfig};
use neurodl_backend::inference::{
    Classifier, ClassifierModel, ModelError, ModelSet, Predictor, SegmentationModel, SharedModel,
    TensorModel,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BOUNDARY: &str = "neurodl-test-boundary";

/// Always returns the same probability row.
pub struct FixedModel {
    pub output: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FixedModel {
    pub fn new(output: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TensorModel for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    fn forward(&self, _input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ArrayD::from_shape_vec(
            IxDyn(&[1, self.output.len()]),
            self.output.clone(),
        )?)
    }
}

/// Picks a class from the mean intensity of the input: darker images score lower classes.
pub struct BrightnessModel;

impl TensorModel for BrightnessModel {
    fn name(&self) -> &str {
        "brightness"
    }

    fn forward(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        let mean = input.iter().sum::<f32>() / input.len().max(1) as f32;
        let class = ((mean * 4.0) as usize).min(3);
        let mut row = vec![0.05f32; 4];
        row[class] = 0.85;
        Ok(ArrayD::from_shape_vec(IxDyn(&[1, 4]), row)?)
    }
}

/// Returns a `(1, S, S, 1)` mask that is set in the centre quarter.
pub struct CenterMaskModel {
    pub calls: AtomicUsize,
}

impl CenterMaskModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TensorModel for CenterMaskModel {
    fn name(&self) -> &str {
        "center-mask"
    }

    fn forward(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let side = input.shape()[1];
        Ok(ArrayD::from_shape_fn(IxDyn(&[1, side, side, 1]), |idx| {
            let (y, x) = (idx[1], idx[2]);
            let inside = |v: usize| v >= side / 4 && v < side * 3 / 4;
            if inside(x) && inside(y) { 0.9 } else { 0.1 }
        }))
    }
}

pub struct FailingModel;

impl TensorModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn forward(&self, _input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        Err(ModelError::Forward {
            model: "failing".to_string(),
            reason: "out of memory".to_string(),
        })
    }
}

/// Panics inside `forward`, the way a backend bug would.
pub struct PanickingModel;

impl TensorModel for PanickingModel {
    fn name(&self) -> &str {
        "panicking"
    }

    fn forward(&self, _input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        panic!("segmentation kernel crashed")
    }
}

/// Records the shape of every input it sees and answers with a fixed row.
pub struct ShapeRecorder {
    pub output: Vec<f32>,
    pub shapes: std::sync::Mutex<Vec<Vec<usize>>>,
}

impl ShapeRecorder {
    pub fn new(output: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            output,
            shapes: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn shapes(&self) -> Vec<Vec<usize>> {
        self.shapes.lock().unwrap().clone()
    }
}

impl TensorModel for ShapeRecorder {
    fn name(&self) -> &str {
        "shape-recorder"
    }

    fn forward(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        self.shapes.lock().unwrap().push(input.shape().to_vec());
        Ok(ArrayD::from_shape_vec(
            IxDyn(&[1, self.output.len()]),
            self.output.clone(),
        )?)
    }
}

pub fn one_hot(class: usize, confidence: f32) -> Vec<f32> {
    let rest = (1.0 - confidence) / 3.0;
    let mut row = vec![rest; 4];
    row[class] = confidence;
    row
}

pub fn predictor_with(classifier: SharedModel, segmentation: Option<SharedModel>) -> Predictor {
    let models = ModelSet {
        classifier: Classifier::Single(ClassifierModel::new(classifier, false)),
        segmentation: segmentation.map(|model| SegmentationModel {
            model,
            input_size: 256,
        }),
    };
    Predictor::new(models, OverlayConfig::default(), ServiceConfig::default())
}

pub fn jpeg_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let shade = ((x + y) % 16) as u8;
        Rgb([
            color[0].saturating_add(shade),
            color[1].saturating_add(shade),
            color[2].saturating_add(shade),
        ])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode_image(&image)
        .unwrap();
    bytes
}

pub fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, name),
        None => format!("form-data; name=\"{}\"", field),
    };
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
