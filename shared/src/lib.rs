use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// The four diagnostic classes, in the index order the classifiers were trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum TumorClass {
    #[strum(serialize = "Glioma Tumor")]
    Glioma,
    #[strum(serialize = "Meningioma Tumor")]
    Meningioma,
    #[strum(serialize = "No Tumor")]
    NoTumor,
    #[strum(serialize = "Pituitary Tumor")]
    Pituitary,
}

pub const UNKNOWN_CLASS_NAME: &str = "Unknown";

impl TumorClass {
    pub const COUNT: usize = 4;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(TumorClass::Glioma),
            1 => Some(TumorClass::Meningioma),
            2 => Some(TumorClass::NoTumor),
            3 => Some(TumorClass::Pituitary),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_tumor(self) -> bool {
        self != TumorClass::NoTumor
    }
}

/// Human readable name for a class index. Total over `usize`.
pub fn class_name(index: usize) -> String {
    TumorClass::from_index(index)
        .map(|class| class.to_string())
        .unwrap_or_else(|| UNKNOWN_CLASS_NAME.to_string())
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    pub final_class: usize,
    pub class_name: String,
    pub confidence: String,
    pub model_used: String,
    pub model_accuracy: String,
    pub segmentation_performed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ServiceInfo {
    pub status: String,
    pub service: String,
    pub version: String,
    pub model: String,
    pub accuracy: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub classification_model_loaded: bool,
    pub segmentation_model_loaded: bool,
    pub ensemble: bool,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
