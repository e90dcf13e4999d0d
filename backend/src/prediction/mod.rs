pub mod label_map;
pub mod reducer;

use shared::PredictionItem;

use crate::detection::RawDetection;
pub use label_map::{LabelMapper, MappedCandidate};
pub use reducer::reduce;

/// Label mapping followed by reduction. Total over its input.
#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    mapper: LabelMapper,
    min_confidence: f32,
}

impl PredictionPipeline {
    pub fn new(mapper: LabelMapper, min_confidence: f32) -> Self {
        Self {
            mapper,
            min_confidence,
        }
    }

    pub fn run(&self, detections: &[RawDetection]) -> Vec<PredictionItem> {
        let candidates = self.mapper.map_all(detections);
        let items = reduce(&candidates, self.min_confidence);
        log::debug!(
            "Reduced {} detections ({} mapped) to {} items",
            detections.len(),
            candidates.len(),
            items.len()
        );
        items
    }
}
