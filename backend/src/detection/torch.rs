use std::path::Path;
use std::sync::Mutex;

use tch::{CModule, Device, IValue, Kind, Tensor};

use super::coco::category_name;
use super::{DetectionError, ObjectDetector, PreparedImage, RawDetection};

impl From<tch::TchError> for DetectionError {
    fn from(err: tch::TchError) -> Self {
        DetectionError::Unavailable(format!("torch error: {}", err))
    }
}

/// TorchScript detection export returning `(boxes[N, 4], labels[N], scores[N])`
/// with boxes as `x1, y1, x2, y2` in model-input pixels.
pub struct TorchDetector {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchDetector {
    pub fn load(model_path: &Path) -> Result<Self, DetectionError> {
        let device = Device::cuda_if_available();
        log::info!(
            "Loading TorchScript detector from {} on {:?}",
            model_path.display(),
            device
        );
        let module = CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }

    fn to_input(&self, image: &PreparedImage) -> Result<Tensor, DetectionError> {
        let shape: Vec<i64> = image.tensor.shape().iter().map(|d| *d as i64).collect();
        let data = image
            .tensor
            .as_slice()
            .ok_or_else(|| {
                DetectionError::Unavailable("input tensor is not contiguous".to_string())
            })?;
        Ok(Tensor::from_slice(data).view(shape.as_slice()).to_device(self.device))
    }
}

impl ObjectDetector for TorchDetector {
    fn detect(&self, image: &PreparedImage) -> Result<Vec<RawDetection>, DetectionError> {
        let input = self.to_input(image)?;
        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| DetectionError::Unavailable("model lock poisoned".to_string()))?;
            tch::no_grad(|| module.forward_is(&[IValue::Tensor(input)]))?
        };

        let (boxes, labels, scores) = match output {
            IValue::Tuple(mut parts) if parts.len() == 3 => {
                let scores = take_tensor(parts.pop())?;
                let labels = take_tensor(parts.pop())?;
                let boxes = take_tensor(parts.pop())?;
                (boxes, labels, scores)
            }
            other => {
                return Err(DetectionError::Unavailable(format!(
                    "unexpected model output: {:?}",
                    other
                )));
            }
        };

        let boxes = Vec::<f32>::try_from(flatten_on_cpu(&boxes, Kind::Float))?;
        let labels = Vec::<i64>::try_from(flatten_on_cpu(&labels, Kind::Int64))?;
        let scores = Vec::<f32>::try_from(flatten_on_cpu(&scores, Kind::Float))?;

        if boxes.len() != labels.len() * 4 || scores.len() != labels.len() {
            return Err(DetectionError::Unavailable(format!(
                "mismatched model output: {} boxes, {} labels, {} scores",
                boxes.len() / 4,
                labels.len(),
                scores.len()
            )));
        }

        let detections = labels
            .iter()
            .zip(scores.iter())
            .zip(boxes.chunks_exact(4))
            .filter_map(|((label, score), b)| {
                category_name(*label).map(|name| RawDetection {
                    label: name.to_string(),
                    score: score.clamp(0.0, 1.0),
                    bbox: image.rescale(b[0], b[1], b[2], b[3]),
                })
            })
            .collect();
        Ok(detections)
    }
}

fn flatten_on_cpu(tensor: &Tensor, kind: Kind) -> Tensor {
    tensor.to_kind(kind).to_device(Device::Cpu).view([-1])
}

fn take_tensor(value: Option<IValue>) -> Result<Tensor, DetectionError> {
    match value {
        Some(IValue::Tensor(t)) => Ok(t),
        other => Err(DetectionError::Unavailable(format!(
            "expected tensor in model output, got {:?}",
            other
        ))),
    }
}
