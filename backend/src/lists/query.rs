use std::sync::Arc;

use serde::Deserialize;
use shared::{ListStatus, ShoppingList};

use super::lifecycle::{ListError, parse_status};
use super::store::ListStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ListStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListQuery {
    pub status: StatusFilter,
    pub sort: SortField,
    pub order: SortOrder,
}

/// Raw `?status=&sort=&order=` parameters as sent by clients.
#[derive(Debug, Default, Deserialize)]
pub struct ListQueryParams {
    pub status: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl TryFrom<ListQueryParams> for ListQuery {
    type Error = ListError;

    fn try_from(params: ListQueryParams) -> Result<Self, Self::Error> {
        let status = match params.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => StatusFilter::All,
            Some(raw) => StatusFilter::Only(parse_status(raw)?),
        };
        let sort = match params.sort.as_deref().map(str::trim) {
            None | Some("") | Some("createdAt") | Some("created_at") => SortField::CreatedAt,
            Some("status") => SortField::Status,
            Some(other) => {
                return Err(ListError::Validation(format!("unknown sort field {}", other)));
            }
        };
        let order = match params.order.as_deref().map(str::trim) {
            None | Some("") | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(ListError::Validation(format!("unknown sort order {}", other)));
            }
        };
        Ok(Self { status, sort, order })
    }
}

/// Stable sort of `lists` by the requested field and direction.
pub fn sort_lists(lists: &mut [ShoppingList], sort: SortField, order: SortOrder) {
    lists.sort_by(|a, b| {
        let ordering = match sort {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Status => a.status.as_ref().cmp(b.status.as_ref()),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[derive(Clone)]
pub struct ListQueryService {
    store: Arc<dyn ListStore>,
}

impl ListQueryService {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        Self { store }
    }

    /// Lists owned by `owner_id` only, filtered and ordered per `query`.
    pub async fn query(
        &self,
        owner_id: &str,
        query: ListQuery,
    ) -> Result<Vec<ShoppingList>, ListError> {
        let status = match query.status {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(status),
        };
        let mut lists: Vec<ShoppingList> = self
            .store
            .query_by_owner(owner_id, status)
            .await?
            .into_iter()
            .filter(|list| list.owner_id == owner_id)
            .collect();
        // Store iteration order is arbitrary; fix it so equal keys sort stably.
        lists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sort_lists(&mut lists, query.sort, query.order);
        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lists::memory_store::MemoryListStore;
    use chrono::{Duration, TimeZone, Utc};

    fn list(id: &str, owner: &str, minutes: i64, status: ListStatus) -> ShoppingList {
        ShoppingList {
            id: id.to_string(),
            owner_id: owner.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
            items: Vec::new(),
            status,
        }
    }

    async fn seeded() -> ListQueryService {
        let store = Arc::new(MemoryListStore::new());
        for l in [
            list("a", "u1", 0, ListStatus::Completed),
            list("b", "u1", 10, ListStatus::Active),
            list("c", "u1", 5, ListStatus::Active),
            list("d", "u2", 20, ListStatus::Active),
        ] {
            store.put(&l, None).await.unwrap();
        }
        ListQueryService::new(store)
    }

    fn ids(lists: &[ShoppingList]) -> Vec<&str> {
        lists.iter().map(|l| l.id.as_str()).collect()
    }

    #[tokio::test]
    async fn default_is_newest_first_for_owner_only() {
        let service = seeded().await;
        let lists = service.query("u1", ListQuery::default()).await.unwrap();
        assert_eq!(ids(&lists), vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn filters_by_status() {
        let service = seeded().await;
        let query = ListQuery {
            status: StatusFilter::Only(ListStatus::Active),
            order: SortOrder::Asc,
            ..ListQuery::default()
        };
        let lists = service.query("u1", query).await.unwrap();
        assert_eq!(ids(&lists), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn status_sort_is_lexicographic_and_stable() {
        let service = seeded().await;
        let query = ListQuery {
            sort: SortField::Status,
            order: SortOrder::Asc,
            ..ListQuery::default()
        };
        let lists = service.query("u1", query).await.unwrap();
        // "active" < "completed"; ties keep chronological order.
        assert_eq!(ids(&lists), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn unknown_owner_gets_nothing() {
        let service = seeded().await;
        assert!(service.query("nobody", ListQuery::default()).await.unwrap().is_empty());
    }

    #[test]
    fn parses_query_params() {
        let query = ListQuery::try_from(ListQueryParams {
            status: Some("all".into()),
            sort: Some("created_at".into()),
            order: Some("asc".into()),
        })
        .unwrap();
        assert_eq!(query.status, StatusFilter::All);
        assert_eq!(query.sort, SortField::CreatedAt);
        assert_eq!(query.order, SortOrder::Asc);

        assert_eq!(
            ListQuery::try_from(ListQueryParams::default()).unwrap(),
            ListQuery::default()
        );
    }

    #[test]
    fn rejects_unknown_params() {
        assert!(matches!(
            ListQuery::try_from(ListQueryParams {
                status: Some("archived".into()),
                ..ListQueryParams::default()
            }),
            Err(ListError::InvalidStatus(_))
        ));
        assert!(matches!(
            ListQuery::try_from(ListQueryParams {
                sort: Some("name".into()),
                ..ListQueryParams::default()
            }),
            Err(ListError::Validation(_))
        ));
    }
}
