use shared::{PredictionItem, ShoppingList};

/// Client-side working copy of a list being edited. Nothing is persisted
/// until the caller hands `into_items()` to `update_items`; dropping or
/// cancelling the session discards every change.
#[derive(Debug, Clone, PartialEq)]
pub struct EditingSession {
    list_id: String,
    working_copy: Vec<PredictionItem>,
}

impl EditingSession {
    pub fn open(list: &ShoppingList) -> Self {
        Self {
            list_id: list.id.clone(),
            working_copy: list.items.clone(),
        }
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    pub fn items(&self) -> &[PredictionItem] {
        &self.working_copy
    }

    /// Sets the quantity at `index`, clamped to at least 1. Returns false if
    /// there is no such item.
    pub fn set_quantity(&mut self, index: usize, quantity: i64) -> bool {
        match self.working_copy.get_mut(index) {
            Some(item) => {
                item.quantity = clamp_quantity(quantity);
                true
            }
            None => false,
        }
    }

    /// Adds `delta` to the quantity at `index`, clamped to at least 1.
    pub fn adjust_quantity(&mut self, index: usize, delta: i64) -> bool {
        match self.working_copy.get(index) {
            Some(item) => {
                let next = i64::from(item.quantity).saturating_add(delta);
                self.set_quantity(index, next)
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<PredictionItem> {
        (index < self.working_copy.len()).then(|| self.working_copy.remove(index))
    }

    pub fn cancel(self) {}

    /// The full replacement sequence for `update_items`.
    pub fn into_items(self) -> Vec<PredictionItem> {
        self.working_copy
    }
}

fn clamp_quantity(quantity: i64) -> u32 {
    quantity.clamp(1, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::ListStatus;

    fn list() -> ShoppingList {
        ShoppingList {
            id: "list".to_string(),
            owner_id: "owner".to_string(),
            created_at: Utc::now(),
            items: vec![
                PredictionItem {
                    product_id: "a".to_string(),
                    name: "Buah".to_string(),
                    confidence: 0.9,
                    quantity: 2,
                },
                PredictionItem {
                    product_id: "b".to_string(),
                    name: "Minuman".to_string(),
                    confidence: 0.7,
                    quantity: 1,
                },
            ],
            status: ListStatus::Active,
        }
    }

    #[test]
    fn quantities_never_drop_below_one() {
        let mut session = EditingSession::open(&list());
        assert!(session.set_quantity(0, -4));
        assert_eq!(session.items()[0].quantity, 1);
        assert!(session.adjust_quantity(1, -1));
        assert_eq!(session.items()[1].quantity, 1);
        assert!(session.adjust_quantity(1, 3));
        assert_eq!(session.items()[1].quantity, 4);
        assert!(!session.set_quantity(5, 2));
    }

    #[test]
    fn editing_does_not_touch_the_source_list() {
        let source = list();
        let mut session = EditingSession::open(&source);
        session.set_quantity(0, 10);
        assert_eq!(session.remove(1).unwrap().name, "Minuman");
        assert!(session.remove(1).is_none());
        assert_eq!(source.items.len(), 2);
        assert_eq!(source.items[0].quantity, 2);
        assert_eq!(session.list_id(), "list");

        let items = session.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 10);
    }
}
