pub mod config;
pub mod evaluation;
pub mod inference;
pub mod routes;

pub use config::AppConfig;
pub use inference::{ModelSet, Predictor};
pub use routes::configure_routes;
