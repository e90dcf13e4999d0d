use std::cmp::Ordering;
use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use shared::PredictionItem;

use super::label_map::MappedCandidate;

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Stable short identifier for an item derived from its category and a
/// position. Identical inputs always give the same id.
pub fn product_id(scope: &str, category: &str, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update([0u8]);
    hasher.update(category.as_bytes());
    hasher.update([0u8]);
    hasher.update(position.to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", slug(category), &digest[..12])
}

fn slug(category: &str) -> String {
    let slug: String = category
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug.to_string()
    }
}

/// Orders by confidence descending, then name ascending.
pub fn compare_items(a: &PredictionItem, b: &PredictionItem) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.name.cmp(&b.name))
}

/// Filters candidates below `min_confidence`, merges candidates of the same
/// category into one item whose quantity is the group size and whose
/// confidence is the group's best score.
pub fn reduce(candidates: &[MappedCandidate], min_confidence: f32) -> Vec<PredictionItem> {
    let mut groups: BTreeMap<&str, (f32, u32)> = BTreeMap::new();

    for candidate in candidates {
        // NaN never passes the threshold.
        if !(candidate.score >= min_confidence) {
            continue;
        }
        let score = candidate.score.clamp(0.0, 1.0);
        let entry = groups.entry(candidate.category.as_str()).or_insert((score, 0));
        entry.0 = entry.0.max(score);
        entry.1 += 1;
    }

    let mut items: Vec<PredictionItem> = groups
        .into_iter()
        .map(|(category, (confidence, quantity))| PredictionItem {
            product_id: String::new(),
            name: category.to_string(),
            confidence,
            quantity,
        })
        .collect();
    items.sort_by(compare_items);

    for (position, item) in items.iter_mut().enumerate() {
        item.product_id = product_id("prediction", &item.name, position);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(category: &str, score: f32) -> MappedCandidate {
        MappedCandidate {
            category: category.to_string(),
            score,
        }
    }

    #[test]
    fn merges_duplicates_with_best_confidence() {
        let items = reduce(
            &[candidate("Buah", 0.9), candidate("Buah", 0.6)],
            DEFAULT_MIN_CONFIDENCE,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Buah");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].confidence, 0.9);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(reduce(&[], DEFAULT_MIN_CONFIDENCE).is_empty());
    }

    #[test]
    fn drops_candidates_below_threshold() {
        let items = reduce(
            &[candidate("Buah", 0.49), candidate("Minuman", 0.5), candidate("Makanan", f32::NAN)],
            0.5,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Minuman");
    }

    #[test]
    fn never_emits_below_any_threshold() {
        let candidates: Vec<_> = (0..=20)
            .map(|i| candidate(["A", "B", "C"][i % 3], i as f32 / 20.0))
            .collect();
        for step in 0..=10 {
            let threshold = step as f32 / 10.0;
            for item in reduce(&candidates, threshold) {
                assert!(item.confidence >= threshold);
            }
        }
    }

    #[test]
    fn quantities_sum_to_surviving_candidates() {
        let candidates = vec![
            candidate("Buah", 0.7),
            candidate("Sayuran", 0.2),
            candidate("Buah", 0.55),
            candidate("Minuman", 0.95),
            candidate("Sayuran", 0.8),
            candidate("Buah", 0.4),
        ];
        let surviving = candidates.iter().filter(|c| c.score >= 0.5).count() as u32;
        let total: u32 = reduce(&candidates, 0.5).iter().map(|i| i.quantity).sum();
        assert_eq!(total, surviving);
    }

    #[test]
    fn orders_by_confidence_then_name() {
        let items = reduce(
            &[
                candidate("Sayuran", 0.7),
                candidate("Buah", 0.7),
                candidate("Minuman", 0.95),
                candidate("Makanan", 0.6),
            ],
            0.5,
        );
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Minuman", "Buah", "Sayuran", "Makanan"]);
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let mut candidates = vec![
            candidate("Buah", 0.8),
            candidate("Minuman", 0.8),
            candidate("Buah", 0.9),
            candidate("Makanan", 0.51),
        ];
        let first = reduce(&candidates, 0.5);
        candidates.reverse();
        let second = reduce(&candidates, 0.5);
        assert_eq!(first, second);
    }

    #[test]
    fn product_ids_are_deterministic_and_distinct() {
        let items = reduce(&[candidate("Buah", 0.9), candidate("Minuman", 0.8)], 0.5);
        let again = reduce(&[candidate("Minuman", 0.8), candidate("Buah", 0.9)], 0.5);
        assert_eq!(items[0].product_id, again[0].product_id);
        assert_ne!(items[0].product_id, items[1].product_id);
        assert!(items[0].product_id.starts_with("buah-"));
    }

    #[test]
    fn slug_falls_back_for_non_ascii_names() {
        assert!(product_id("s", "日本", 0).starts_with("item-"));
    }
}
