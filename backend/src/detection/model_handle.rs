use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{DetectionError, ObjectDetector};

type Loader = dyn Fn() -> Result<Arc<dyn ObjectDetector>, DetectionError> + Send + Sync;

/// Process-wide handle to the detection model. The model is loaded on first
/// use, exactly once, and shared read-only afterwards. Concurrent first
/// callers wait on the same load. A failed load is not cached.
#[derive(Clone)]
pub struct ModelHandle {
    cell: Arc<OnceCell<Arc<dyn ObjectDetector>>>,
    loader: Arc<Loader>,
}

impl ModelHandle {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ObjectDetector>, DetectionError> + Send + Sync + 'static,
    {
        Self {
            cell: Arc::new(OnceCell::new()),
            loader: Arc::new(loader),
        }
    }

    /// A handle around an already constructed detector.
    pub fn ready(detector: Arc<dyn ObjectDetector>) -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(detector))),
            loader: Arc::new(|| {
                Err(DetectionError::Unavailable(
                    "detector was provided pre-loaded".to_string(),
                ))
            }),
        }
    }

    /// A handle whose load always fails, used when no model is configured.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move || Err(DetectionError::Unavailable(reason.clone())))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Resolves the model, loading it if needed. The load runs on a detached
    /// task, so a caller that stops waiting does not abort it.
    pub async fn get(&self) -> Result<Arc<dyn ObjectDetector>, DetectionError> {
        if let Some(detector) = self.cell.get() {
            return Ok(detector.clone());
        }
        let handle = self.clone();
        tokio::spawn(async move { handle.load().await })
            .await
            .map_err(|e| DetectionError::Unavailable(format!("model load task failed: {}", e)))?
    }

    async fn load(&self) -> Result<Arc<dyn ObjectDetector>, DetectionError> {
        let loader = self.loader.clone();
        self.cell
            .get_or_try_init(|| async move {
                log::info!("Loading detection model");
                // Model loading is blocking work (file I/O, device setup).
                let loaded = actix_web::rt::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| {
                        DetectionError::Unavailable(format!("model loader panicked: {}", e))
                    })?;
                match &loaded {
                    Ok(_) => log::info!("Detection model loaded"),
                    Err(e) => log::error!("Failed to load detection model: {}", e),
                }
                loaded
            })
            .await
            .cloned()
    }
}
