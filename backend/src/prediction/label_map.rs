use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::detection::RawDetection;

lazy_static! {
    static ref DEFAULT_LABELS: HashMap<String, String> = [
        ("bottle", "Minuman"),
        ("cup", "Minuman"),
        ("bowl", "Makanan"),
        ("sandwich", "Makanan"),
        ("orange", "Buah"),
        ("apple", "Buah"),
        ("banana", "Buah"),
        ("carrot", "Sayuran"),
    ]
    .into_iter()
    .map(|(label, category)| (label.to_string(), category.to_string()))
    .collect();
}

#[derive(Debug, thiserror::Error)]
pub enum LabelMapError {
    #[error("Failed to read label map: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse label map: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// On-disk form of a label map.
#[derive(Debug, Serialize, Deserialize)]
pub struct LabelMapFile {
    pub version: f32,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedCandidate {
    pub category: String,
    pub score: f32,
}

/// Maps detector vocabulary onto product categories. Labels are matched
/// case-insensitively after trimming.
#[derive(Debug, Clone)]
pub struct LabelMapper {
    table: HashMap<String, String>,
}

impl Default for LabelMapper {
    fn default() -> Self {
        Self {
            table: DEFAULT_LABELS.clone(),
        }
    }
}

impl LabelMapper {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let table = entries
            .into_iter()
            .map(|(label, category)| (normalize(label.as_ref()), category.into()))
            .collect();
        Self { table }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, LabelMapError> {
        let file: LabelMapFile = serde_yaml::from_str(raw)?;
        Ok(Self::new(file.labels))
    }

    pub fn load(path: &Path) -> Result<Self, LabelMapError> {
        let raw = std::fs::read_to_string(path)?;
        let file: LabelMapFile = serde_yaml::from_str(&raw)?;
        let version = file.version;
        let mapper = Self::new(file.labels);
        log::info!(
            "Loaded {} label mappings (version {}) from {}",
            mapper.len(),
            version,
            path.display()
        );
        Ok(mapper)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn map(&self, label: &str) -> Option<&str> {
        self.table.get(&normalize(label)).map(String::as_str)
    }

    /// Keeps one candidate per detection whose label has a mapping.
    pub fn map_all(&self, detections: &[RawDetection]) -> Vec<MappedCandidate> {
        detections
            .iter()
            .filter_map(|d| {
                self.map(&d.label).map(|category| MappedCandidate {
                    category: category.to_string(),
                    score: d.score,
                })
            })
            .collect()
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_grocery_labels() {
        let mapper = LabelMapper::default();
        assert_eq!(mapper.map("banana"), Some("Buah"));
        assert_eq!(mapper.map("cup"), Some("Minuman"));
        assert_eq!(mapper.map("carrot"), Some("Sayuran"));
        assert_eq!(mapper.map("sock"), None);
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let mapper = LabelMapper::new([("Banana", "Buah")]);
        assert_eq!(mapper.map("  BANANA "), Some("Buah"));
    }

    #[test]
    fn unmapped_detections_are_dropped() {
        let mapper = LabelMapper::new([("banana", "Buah")]);
        let detections = vec![
            RawDetection::new("banana", 0.9),
            RawDetection::new("sock", 0.99),
            RawDetection::new("banana", 0.6),
        ];
        let candidates = mapper.map_all(&detections);
        assert_eq!(
            candidates,
            vec![
                MappedCandidate { category: "Buah".into(), score: 0.9 },
                MappedCandidate { category: "Buah".into(), score: 0.6 },
            ]
        );
    }

    #[test]
    fn parses_yaml_table() {
        let mapper = LabelMapper::from_yaml_str(
            "version: 1.0\nlabels:\n  broccoli: Sayuran\n  pizza: Makanan\n",
        )
        .unwrap();
        assert_eq!(mapper.len(), 2);
        assert_eq!(mapper.map("broccoli"), Some("Sayuran"));
        assert_eq!(mapper.map("banana"), None);
    }

    #[test]
    fn loads_label_map_file() {
        let path = std::env::temp_dir().join(format!("label-map-{}.yaml", std::process::id()));
        std::fs::write(&path, "version: 2.0\nlabels:\n  Kiwi: Buah\n").unwrap();
        let mapper = LabelMapper::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(mapper.len(), 1);
        assert_eq!(mapper.map("kiwi"), Some("Buah"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            LabelMapper::from_yaml_str("labels: [not, a, map]"),
            Err(LabelMapError::Parse(_))
        ));
    }
}
