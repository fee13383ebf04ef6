use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 5001;
pub const CONFIG_ENV: &str = "NEURODL_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub models: ModelsConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Static metadata reported by `GET /` and echoed in every prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub model_name: String,
    pub model_accuracy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    pub classifier: ClassifierConfig,
    /// Leaving this out disables segmentation; tumor predictions then come back without an overlay.
    pub segmentation: Option<ModelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClassifierConfig {
    Single {
        model: ModelSpec,
    },
    Ensemble {
        primary: ModelSpec,
        secondary: ModelSpec,
        meta: ModelSpec,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub file: String,
    #[serde(default)]
    pub input_size: Option<u32>,
    #[serde(default = "default_layout")]
    pub layout: TensorLayout,
    #[serde(default)]
    pub softmax: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub threshold: f32,
    pub alpha: f32,
    pub color: [u8; 3],
    pub jpeg_quality: u8,
}

fn default_layout() -> TensorLayout {
    TensorLayout::Nhwc
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "NeuroDL Brain Tumor Detection API".to_string(),
            version: "1.0.0".to_string(),
            model_name: "ResNet50V2".to_string(),
            model_accuracy: "84.13%".to_string(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            classifier: ClassifierConfig::Single {
                model: ModelSpec::new("ResNet50V2.pt", Some(128)),
            },
            segmentation: Some(ModelSpec::new("seg_model2.pt", Some(256))),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            alpha: 0.4,
            color: [255, 0, 0],
            jpeg_quality: 95,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            service: ServiceConfig::default(),
            models: ModelsConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl ModelSpec {
    pub fn new(file: &str, input_size: Option<u32>) -> Self {
        Self {
            file: file.to_string(),
            input_size,
            layout: TensorLayout::Nhwc,
            softmax: false,
        }
    }

    pub fn path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file)
    }
}

impl ClassifierConfig {
    /// The ensemble layout used by the evaluation tooling: ResNet50V2 and the custom CNN
    /// feed the meta model.
    pub fn default_ensemble() -> Self {
        ClassifierConfig::Ensemble {
            primary: ModelSpec::new("ResNet50V2.pt", Some(128)),
            secondary: ModelSpec::new("new_custom_model.pt", Some(128)),
            meta: ModelSpec::new("meta_model.pt", None),
        }
    }

    pub fn is_ensemble(&self) -> bool {
        matches!(self, ClassifierConfig::Ensemble { .. })
    }
}

impl AppConfig {
    /// Loads `.env`, then the YAML file named by `NEURODL_CONFIG` if set, then applies env
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(dir) = lookup("MODEL_DIR") {
            self.models.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
