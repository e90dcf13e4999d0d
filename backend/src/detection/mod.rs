pub mod coco;
pub mod model_handle;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;
pub use model_handle::ModelHandle;
pub use preprocess::PreparedImage;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum DetectionError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Detection unavailable: {0}")]
    Unavailable(String),
}

/// Box in original image pixels. Carried through for completeness only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
            bbox: BoundingBox::default(),
        }
    }
}

/// A loaded vision model. Calls are blocking and may be issued from many
/// threads at once.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image: &PreparedImage) -> Result<Vec<RawDetection>, DetectionError>;
}

/// Turns uploaded bytes into raw detections: validates and decodes the image,
/// resolves the shared model, and runs inference on the blocking pool under a
/// deadline.
#[derive(Clone)]
pub struct DetectorAdapter {
    model: ModelHandle,
    timeout: Duration,
    max_upload_bytes: usize,
    input_size: u32,
}

impl DetectorAdapter {
    pub fn new(model: ModelHandle, config: &DetectionConfig) -> Self {
        Self {
            model,
            timeout: config.timeout,
            max_upload_bytes: config.max_upload_bytes,
            input_size: config.input_size,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn detect(
        &self,
        image_bytes: Vec<u8>,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        let format = preprocess::validate(&image_bytes, self.max_upload_bytes)?;
        let model = self.model.clone();
        let input_size = self.input_size;

        // The deadline covers model resolution as well as inference.
        let work = async move {
            let detector = model.get().await?;
            actix_web::rt::task::spawn_blocking(move || {
                let decoded = preprocess::decode(&image_bytes, format)?;
                let prepared = preprocess::prepare(&decoded, input_size);
                drop(decoded);
                run_detector(detector, &prepared)
            })
            .await
            .map_err(|join_error| {
                log::error!("Detection task failed: {}", join_error);
                DetectionError::Unavailable("detection task failed".to_string())
            })?
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Detection timed out after {:?}", self.timeout);
                Err(DetectionError::Unavailable(format!(
                    "detection timed out after {}s",
                    self.timeout.as_secs_f32()
                )))
            }
        }
    }
}

fn run_detector(
    detector: Arc<dyn ObjectDetector>,
    image: &PreparedImage,
) -> Result<Vec<RawDetection>, DetectionError> {
    let detections = detector.detect(image)?;
    log::debug!("Detector returned {} raw detections", detections.len());
    Ok(detections)
}

/// Builds the model handle for the configured backend. Without the `torch`
/// feature or a `MODEL_PATH`, every detection reports unavailable.
pub fn model_handle_from_config(config: &DetectionConfig) -> ModelHandle {
    match &config.model_path {
        #[cfg(feature = "torch")]
        Some(path) => {
            let path = path.clone();
            ModelHandle::new(move || {
                torch::TorchDetector::load(&path)
                    .map(|d| Arc::new(d) as Arc<dyn ObjectDetector>)
            })
        }
        #[cfg(not(feature = "torch"))]
        Some(path) => {
            log::warn!(
                "MODEL_PATH is set to {} but the torch feature is disabled",
                path.display()
            );
            ModelHandle::unavailable("built without the torch feature")
        }
        None => ModelHandle::unavailable("MODEL_PATH is not configured"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::preprocess::encode_test_png;

    struct FixedDetector(Vec<RawDetection>);

    impl ObjectDetector for FixedDetector {
        fn detect(&self, _image: &PreparedImage) -> Result<Vec<RawDetection>, DetectionError> {
            Ok(self.0.clone())
        }
    }

    struct SlowDetector;

    impl ObjectDetector for SlowDetector {
        fn detect(&self, _image: &PreparedImage) -> Result<Vec<RawDetection>, DetectionError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Vec::new())
        }
    }

    fn config(timeout: Duration) -> DetectionConfig {
        DetectionConfig {
            timeout,
            input_size: 16,
            ..DetectionConfig::default()
        }
    }

    #[tokio::test]
    async fn returns_detector_output_for_valid_png() {
        let detector = FixedDetector(vec![RawDetection::new("banana", 0.9)]);
        let adapter = DetectorAdapter::new(
            ModelHandle::ready(Arc::new(detector)),
            &config(Duration::from_secs(5)),
        );
        let detections = adapter.detect(encode_test_png(32, 32, [1, 2, 3])).await.unwrap();
        assert_eq!(detections, vec![RawDetection::new("banana", 0.9)]);
    }

    #[tokio::test]
    async fn invalid_bytes_are_rejected_before_model_load() {
        let adapter = DetectorAdapter::new(
            ModelHandle::unavailable("no model"),
            &config(Duration::from_secs(5)),
        );
        let err = adapter.detect(b"GIF89a-not-really".to_vec()).await.unwrap_err();
        assert!(matches!(err, DetectionError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn missing_model_is_unavailable() {
        let adapter = DetectorAdapter::new(
            ModelHandle::unavailable("no model"),
            &config(Duration::from_secs(5)),
        );
        let err = adapter.detect(encode_test_png(8, 8, [0, 0, 0])).await.unwrap_err();
        assert!(matches!(err, DetectionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn slow_inference_times_out() {
        let adapter = DetectorAdapter::new(
            ModelHandle::ready(Arc::new(SlowDetector)),
            &config(Duration::from_millis(50)),
        );
        let err = adapter.detect(encode_test_png(8, 8, [0, 0, 0])).await.unwrap_err();
        assert!(matches!(err, DetectionError::Unavailable(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn slow_model_load_counts_against_deadline() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let model = ModelHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            Ok(Arc::new(FixedDetector(Vec::new())) as Arc<dyn ObjectDetector>)
        });

        let adapter = DetectorAdapter::new(model.clone(), &config(Duration::from_millis(50)));
        let started = std::time::Instant::now();
        let err = adapter.detect(encode_test_png(8, 8, [0, 0, 0])).await.unwrap_err();
        assert!(matches!(err, DetectionError::Unavailable(msg) if msg.contains("timed out")));
        assert!(started.elapsed() < Duration::from_millis(250));

        // The abandoned load finishes in the background and is kept.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(model.is_loaded());

        let adapter = DetectorAdapter::new(model, &config(Duration::from_secs(5)));
        assert!(adapter.detect(encode_test_png(8, 8, [0, 0, 0])).await.unwrap().is_empty());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
