use std::collections::HashMap;

use async_trait::async_trait;
use shared::{ListStatus, ShoppingList};
use tokio::sync::RwLock;

use super::store::{ListStore, StoreError, VersionedList};

/// In-process store. Each write checks and bumps the version under the
/// write lock, which makes it a single atomic conditional update.
#[derive(Default)]
pub struct MemoryListStore {
    lists: RwLock<HashMap<String, VersionedList>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn get(&self, list_id: &str) -> Result<Option<VersionedList>, StoreError> {
        Ok(self.lists.read().await.get(list_id).cloned())
    }

    async fn put(
        &self,
        list: &ShoppingList,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut lists = self.lists.write().await;
        let current = lists.get(&list.id).map(|stored| stored.version);
        let version = match (current, expected_version) {
            (None, None) => 1,
            (Some(_), None) => return Err(StoreError::AlreadyExists(list.id.clone())),
            (Some(found), Some(expected)) if found == expected => found + 1,
            _ => return Err(StoreError::Conflict(list.id.clone())),
        };
        lists.insert(
            list.id.clone(),
            VersionedList {
                list: list.clone(),
                version,
            },
        );
        Ok(version)
    }

    async fn delete(&self, list_id: &str) -> Result<bool, StoreError> {
        Ok(self.lists.write().await.remove(list_id).is_some())
    }

    async fn query_by_owner(
        &self,
        owner_id: &str,
        status: Option<ListStatus>,
    ) -> Result<Vec<ShoppingList>, StoreError> {
        let lists = self.lists.read().await;
        Ok(lists
            .values()
            .map(|stored| &stored.list)
            .filter(|list| list.owner_id == owner_id)
            .filter(|list| status.is_none_or(|s| list.status == s))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn list(id: &str, owner: &str, status: ListStatus) -> ShoppingList {
        ShoppingList {
            id: id.to_string(),
            owner_id: owner.to_string(),
            created_at: Utc::now(),
            items: Vec::new(),
            status,
        }
    }

    #[tokio::test]
    async fn create_then_conditional_update() {
        let store = MemoryListStore::new();
        let l = list("a", "u1", ListStatus::Active);
        assert_eq!(store.put(&l, None).await.unwrap(), 1);
        assert!(matches!(store.put(&l, None).await, Err(StoreError::AlreadyExists(_))));
        assert_eq!(store.put(&l, Some(1)).await.unwrap(), 2);
        assert!(matches!(store.put(&l, Some(1)).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.get("a").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn update_of_deleted_list_conflicts() {
        let store = MemoryListStore::new();
        let l = list("a", "u1", ListStatus::Active);
        store.put(&l, None).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(matches!(store.put(&l, Some(1)).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn query_is_scoped_to_owner_and_status() {
        let store = MemoryListStore::new();
        store.put(&list("a", "u1", ListStatus::Active), None).await.unwrap();
        store.put(&list("b", "u1", ListStatus::Completed), None).await.unwrap();
        store.put(&list("c", "u2", ListStatus::Active), None).await.unwrap();

        assert_eq!(store.query_by_owner("u1", None).await.unwrap().len(), 2);
        let completed = store
            .query_by_owner("u1", Some(ListStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "b");
        assert!(store.query_by_owner("u3", None).await.unwrap().is_empty());
    }
}
