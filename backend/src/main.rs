use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use neurodl_backend::{configure_routes, AppConfig, ModelSet, Predictor};
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("Loading models from {}", config.models.dir.display());
    let models = ModelSet::load(&config.models).map_err(|e| {
        log::error!("Failed to preload models at startup: {}", e);
        std::io::Error::other(format!("Model loading failed: {}", e))
    })?;
    log::info!(
        "All models loaded (classifier: {}, segmentation: {})",
        if models.classifier.is_ensemble() { "ensemble" } else { "single" },
        models.segmentation.is_some()
    );

    let bind_address = config.bind_address();
    let predictor = web::Data::new(Predictor::new(
        models,
        config.overlay.clone(),
        config.service.clone(),
    ));

    log::info!(
        "Starting {} on {} (model: {}, accuracy: {})",
        config.service.name,
        bind_address,
        config.service.model_name,
        config.service.model_accuracy
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(predictor.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
