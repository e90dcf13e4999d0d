use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use shared::{ListStatus, PredictionItem, ShoppingList};
use uuid::Uuid;

use super::store::{ListStore, StoreError, VersionedList};
use crate::prediction::reducer::product_id;

/// Attempts for one read-modify-write before giving up on a busy list.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("Shopping list not found: {0}")]
    NotFound(String),
    #[error("Shopping list {list_id} is not owned by {requester_id}")]
    NotOwner {
        list_id: String,
        requester_id: String,
    },
    #[error("Invalid status value: {0}")]
    InvalidStatus(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Shopping list {0} is being modified concurrently")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Parses a requested status. Anything other than `active` or `completed`
/// is rejected.
pub fn parse_status(raw: &str) -> Result<ListStatus, ListError> {
    ListStatus::from_str(raw.trim()).map_err(|_| ListError::InvalidStatus(raw.to_string()))
}

fn validate_items(items: &[PredictionItem]) -> Result<(), ListError> {
    for (index, item) in items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(ListError::Validation(format!("item {} has an empty name", index)));
        }
        if item.quantity < 1 {
            return Err(ListError::Validation(format!(
                "item {} has quantity {}, minimum is 1",
                index, item.quantity
            )));
        }
        if !(0.0..=1.0).contains(&item.confidence) {
            return Err(ListError::Validation(format!(
                "item {} has confidence {} outside [0, 1]",
                index, item.confidence
            )));
        }
    }
    Ok(())
}

/// Owns the list state machine: creation, whole-list item replacement,
/// status transitions and deletion, each restricted to the list's owner.
#[derive(Clone)]
pub struct ListLifecycleManager {
    store: Arc<dyn ListStore>,
}

impl ListLifecycleManager {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ListStore> {
        &self.store
    }

    /// Creates an active list. Item ids are reassigned so they are scoped
    /// to the new list.
    pub async fn create(
        &self,
        owner_id: &str,
        items: Vec<PredictionItem>,
    ) -> Result<ShoppingList, ListError> {
        validate_items(&items)?;
        let id = Uuid::new_v4().to_string();
        let items = items
            .into_iter()
            .enumerate()
            .map(|(position, item)| PredictionItem {
                product_id: product_id(&id, &item.name, position),
                ..item
            })
            .collect();

        let list = ShoppingList {
            id,
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
            items,
            status: ListStatus::Active,
        };
        self.store.put(&list, None).await?;
        log::info!(
            "Created shopping list {} for {} with {} items",
            list.id,
            owner_id,
            list.items.len()
        );
        Ok(list)
    }

    pub async fn get(&self, list_id: &str, requester_id: &str) -> Result<ShoppingList, ListError> {
        Ok(self.load_owned(list_id, requester_id).await?.list)
    }

    /// Replaces the entire item sequence. Items sent without an id get one;
    /// duplicate ids are rejected.
    pub async fn update_items(
        &self,
        list_id: &str,
        requester_id: &str,
        items: Vec<PredictionItem>,
    ) -> Result<ShoppingList, ListError> {
        validate_items(&items)?;
        let items = assign_missing_ids(list_id, items)?;

        let list = self
            .modify(list_id, requester_id, |list| {
                list.items = items.clone();
                true
            })
            .await?;
        log::info!("Replaced items of list {} ({} items)", list_id, list.items.len());
        Ok(list)
    }

    /// Moves the list to `status`. Requesting the current status succeeds
    /// without writing.
    pub async fn set_status(
        &self,
        list_id: &str,
        requester_id: &str,
        status: ListStatus,
    ) -> Result<ShoppingList, ListError> {
        let list = self
            .modify(list_id, requester_id, |list| {
                if list.status == status {
                    return false;
                }
                list.status = status;
                true
            })
            .await?;
        log::info!("List {} is now {}", list_id, list.status);
        Ok(list)
    }

    pub async fn delete(&self, list_id: &str, requester_id: &str) -> Result<(), ListError> {
        self.load_owned(list_id, requester_id).await?;
        if !self.store.delete(list_id).await? {
            return Err(ListError::NotFound(list_id.to_string()));
        }
        log::info!("Deleted list {} for {}", list_id, requester_id);
        Ok(())
    }

    async fn load_owned(
        &self,
        list_id: &str,
        requester_id: &str,
    ) -> Result<VersionedList, ListError> {
        let stored = self
            .store
            .get(list_id)
            .await?
            .ok_or_else(|| ListError::NotFound(list_id.to_string()))?;
        if stored.list.owner_id != requester_id {
            log::warn!(
                "Rejected access to list {} by non-owner {}",
                list_id,
                requester_id
            );
            return Err(ListError::NotOwner {
                list_id: list_id.to_string(),
                requester_id: requester_id.to_string(),
            });
        }
        Ok(stored)
    }

    /// Optimistic read-modify-write. `apply` returns false when there is
    /// nothing to write. A version conflict re-reads and re-applies.
    async fn modify<F>(
        &self,
        list_id: &str,
        requester_id: &str,
        mut apply: F,
    ) -> Result<ShoppingList, ListError>
    where
        F: FnMut(&mut ShoppingList) -> bool,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let VersionedList { mut list, version } = self.load_owned(list_id, requester_id).await?;
            if !apply(&mut list) {
                return Ok(list);
            }
            match self.store.put(&list, Some(version)).await {
                Ok(_) => return Ok(list),
                Err(StoreError::Conflict(_)) => {
                    log::debug!(
                        "Version conflict on list {} (attempt {}/{})",
                        list_id,
                        attempt,
                        MAX_WRITE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        log::warn!("Giving up on list {} after {} conflicts", list_id, MAX_WRITE_ATTEMPTS);
        Err(ListError::Conflict(list_id.to_string()))
    }
}

fn assign_missing_ids(
    list_id: &str,
    items: Vec<PredictionItem>,
) -> Result<Vec<PredictionItem>, ListError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for (position, mut item) in items.into_iter().enumerate() {
        if item.product_id.trim().is_empty() {
            item.product_id = product_id(list_id, &item.name, position);
        }
        if !seen.insert(item.product_id.clone()) {
            return Err(ListError::Validation(format!(
                "duplicate productId {}",
                item.product_id
            )));
        }
        out.push(item);
    }
    Ok(out)
}
