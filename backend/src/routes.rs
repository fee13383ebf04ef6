use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use futures::StreamExt;
use log::{error, warn};
use shared::{ErrorResponse, HealthResponse, ServiceInfo};

use crate::inference::Predictor;

const IMAGE_FIELD: &str = "image";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image provided")]
    NoImage,
    #[error("Empty filename")]
    EmptyFilename,
    #[error("Prediction failed: {0}")]
    Prediction(String),
}

impl ApiError {
    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::NoImage => ErrorResponse {
                error: "No image provided".to_string(),
                message: Some("Please upload an image file".to_string()),
            },
            ApiError::EmptyFilename => ErrorResponse {
                error: "Empty filename".to_string(),
                message: None,
            },
            ApiError::Prediction(message) => ErrorResponse {
                error: "Prediction failed".to_string(),
                message: Some(message.clone()),
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoImage | ApiError::EmptyFilename => StatusCode::BAD_REQUEST,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .default_service(web::to(not_found));
}

async fn home(predictor: web::Data<Predictor>) -> HttpResponse {
    let service = predictor.service();
    HttpResponse::Ok().json(ServiceInfo {
        status: "online".to_string(),
        service: service.name.clone(),
        version: service.version.clone(),
        model: service.model_name.clone(),
        accuracy: service.model_accuracy.clone(),
    })
}

async fn health(predictor: web::Data<Predictor>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        // the server only binds after the classifier loaded
        classification_model_loaded: true,
        segmentation_model_loaded: predictor.segmentation_loaded(),
        ensemble: predictor.is_ensemble(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Endpoint not found".to_string(),
        message: None,
    })
}

struct UploadedImage {
    filename: String,
    bytes: Vec<u8>,
}

/// Finds the first file part named `image`. Parts without a filename are form values, not uploads.
async fn read_image_field(mut payload: Multipart) -> Result<UploadedImage, ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            warn!("Malformed multipart upload: {}", e);
            ApiError::NoImage
        })?;

        let is_image = field.name() == Some(IMAGE_FIELD);
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| {
                warn!("Failed to read multipart field: {}", e);
                ApiError::NoImage
            })?;
            if is_image {
                bytes.extend_from_slice(&data);
            }
        }

        match (is_image, filename) {
            (true, Some(filename)) if filename.is_empty() => return Err(ApiError::EmptyFilename),
            (true, Some(filename)) => return Ok(UploadedImage { filename, bytes }),
            _ => continue,
        }
    }
    Err(ApiError::NoImage)
}

async fn predict(
    predictor: web::Data<Predictor>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_image_field(payload).await?;

    let predictor = predictor.clone();
    let result = web::block(move || predictor.predict(&upload.bytes, &upload.filename))
        .await
        .map_err(|e| {
            error!("[ERROR] inference worker failed: {}", e);
            ApiError::Prediction(e.to_string())
        })?;

    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            error!("[ERROR] {}", e);
            Err(ApiError::Prediction(e.to_string()))
        }
    }
}
