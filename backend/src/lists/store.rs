use async_trait::async_trait;
use shared::{ListStatus, ShoppingList};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Version conflict on list {0}")]
    Conflict(String),
    #[error("List already exists: {0}")]
    AlreadyExists(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// A stored list together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedList {
    pub list: ShoppingList,
    pub version: u64,
}

/// Persistence for shopping lists. Writes are conditional on the version
/// last read, so a read-modify-write never silently overwrites a
/// concurrent change.
#[async_trait]
pub trait ListStore: Send + Sync {
    async fn get(&self, list_id: &str) -> Result<Option<VersionedList>, StoreError>;

    /// Replaces the whole record. `expected_version == None` creates a new
    /// record and fails with `AlreadyExists` if one is present; otherwise the
    /// write fails with `Conflict` unless the stored version still matches.
    /// Returns the new version.
    async fn put(
        &self,
        list: &ShoppingList,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, list_id: &str) -> Result<bool, StoreError>;

    async fn query_by_owner(
        &self,
        owner_id: &str,
        status: Option<ListStatus>,
    ) -> Result<Vec<ShoppingList>, StoreError>;
}
