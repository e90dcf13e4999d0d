pub mod auth;
pub mod config;
pub mod detection;
pub mod error;
pub mod lists;
pub mod prediction;
pub mod routes;

use std::sync::Arc;

use actix_web::web;

use auth::AuthMiddleware;
use detection::DetectorAdapter;
use lists::{ListLifecycleManager, ListQueryService, ListStore};
use prediction::PredictionPipeline;

/// Services shared by every worker of the HTTP server.
#[derive(Clone)]
pub struct AppServices {
    pub lists: ListLifecycleManager,
    pub queries: ListQueryService,
    pub detector: DetectorAdapter,
    pub pipeline: PredictionPipeline,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn ListStore>,
        detector: DetectorAdapter,
        pipeline: PredictionPipeline,
    ) -> Self {
        Self {
            lists: ListLifecycleManager::new(store.clone()),
            queries: ListQueryService::new(store),
            detector,
            pipeline,
        }
    }

    /// Registers the services as app data and mounts the API routes.
    pub fn configure(&self, cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddleware) {
        cfg.app_data(web::Data::new(self.lists.clone()))
            .app_data(web::Data::new(self.queries.clone()))
            .app_data(web::Data::new(self.detector.clone()))
            .app_data(web::Data::new(self.pipeline.clone()));
        routes::configure_routes(cfg, auth_middleware);
    }
}
