use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer};
use backend::auth::{AuthMiddleware, JwtService};
use backend::config::{AppConfig, StorageBackend};
use backend::detection::{model_handle_from_config, DetectorAdapter};
use backend::lists::{DynamoListStore, ListStore, MemoryListStore};
use backend::prediction::{LabelMapper, PredictionPipeline};
use backend::AppServices;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let mapper = match &config.detection.label_map_path {
        Some(path) => LabelMapper::load(path).map_err(|e| {
            log::error!("Failed to load label map from {}: {}", path.display(), e);
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?,
        None => {
            log::info!("Using built-in label map");
            LabelMapper::default()
        }
    };
    let pipeline = PredictionPipeline::new(mapper, config.detection.min_confidence);

    let model = model_handle_from_config(&config.detection);
    let detector = DetectorAdapter::new(model, &config.detection);

    let store: Arc<dyn ListStore> = match &config.storage {
        StorageBackend::Memory => {
            log::warn!("Using in-memory list storage; lists are lost on restart");
            Arc::new(MemoryListStore::new())
        }
        StorageBackend::DynamoDb { table } => {
            Arc::new(DynamoListStore::from_env(table.clone()).await)
        }
    };

    let services = AppServices::new(store, detector, pipeline);
    let auth_middleware = AuthMiddleware::new(JwtService::new(&config.jwt_secret));

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let services = services.clone();
        let auth_middleware = auth_middleware.clone();
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .configure(move |cfg| services.configure(cfg, auth_middleware))
    })
    .bind(&bind_address)?
    .run()
    .await
}
