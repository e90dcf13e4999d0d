pub mod dynamodb_store;
pub mod lifecycle;
pub mod memory_store;
pub mod query;
pub mod session;
pub mod store;

pub use dynamodb_store::DynamoListStore;
pub use lifecycle::{ListError, ListLifecycleManager};
pub use memory_store::MemoryListStore;
pub use query::{ListQuery, ListQueryParams, ListQueryService};
pub use session::EditingSession;
pub use store::{ListStore, StoreError, VersionedList};
