use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use chrono::{DateTime, Utc};
use shared::{ListStatus, PredictionItem, ShoppingList};

use super::store::{ListStore, StoreError, VersionedList};

/// Shopping lists in a DynamoDB table keyed by `id`. Items are stored as a
/// JSON string; the `version` attribute guards conditional writes.
#[derive(Clone)]
pub struct DynamoListStore {
    client: Client,
    table: String,
}

impl DynamoListStore {
    pub fn new(client: Client, table: String) -> Self {
        Self { client, table }
    }

    pub async fn from_env(table: String) -> Self {
        log::info!("Initializing DynamoDB list store with table: {}", table);
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&config), table)
    }
}

pub(crate) fn list_to_item(
    list: &ShoppingList,
    version: u64,
) -> Result<HashMap<String, AttributeValue>, StoreError> {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(list.id.clone()));
    item.insert(
        "owner_id".to_string(),
        AttributeValue::S(list.owner_id.clone()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(list.created_at.to_rfc3339()),
    );
    item.insert(
        "status".to_string(),
        AttributeValue::S(list.status.to_string()),
    );
    item.insert(
        "items".to_string(),
        AttributeValue::S(serde_json::to_string(&list.items)?),
    );
    item.insert("version".to_string(), AttributeValue::N(version.to_string()));
    Ok(item)
}

fn string_attr<'a>(
    item: &'a HashMap<String, AttributeValue>,
    key: &str,
) -> Result<&'a str, StoreError> {
    item.get(key)
        .and_then(|av| av.as_s().ok())
        .map(String::as_str)
        .ok_or_else(|| StoreError::InvalidData(format!("Missing {} attribute", key)))
}

pub(crate) fn item_to_list(
    item: &HashMap<String, AttributeValue>,
) -> Result<VersionedList, StoreError> {
    let id = string_attr(item, "id")?.to_string();
    let owner_id = string_attr(item, "owner_id")?.to_string();
    let created_at = DateTime::parse_from_rfc3339(string_attr(item, "created_at")?)
        .map_err(|e| StoreError::InvalidData(format!("Invalid created_at: {}", e)))?
        .with_timezone(&Utc);
    let status = ListStatus::from_str(string_attr(item, "status")?)
        .map_err(|e| StoreError::InvalidData(format!("Invalid status: {}", e)))?;
    let items: Vec<PredictionItem> = serde_json::from_str(string_attr(item, "items")?)?;
    let version = item
        .get("version")
        .and_then(|av| av.as_n().ok())
        .ok_or_else(|| StoreError::InvalidData("Missing version attribute".to_string()))?
        .parse::<u64>()
        .map_err(|e| StoreError::InvalidData(format!("Invalid version: {}", e)))?;

    Ok(VersionedList {
        list: ShoppingList {
            id,
            owner_id,
            created_at,
            items,
            status,
        },
        version,
    })
}

#[async_trait]
impl ListStore for DynamoListStore {
    async fn get(&self, list_id: &str) -> Result<Option<VersionedList>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(list_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB get_item failed for list {}: {:?}", list_id, e);
                StoreError::Backend(e.to_string())
            })?;

        match result.item {
            Some(item) => Ok(Some(item_to_list(&item)?)),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        list: &ShoppingList,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let version = expected_version.map_or(1, |v| v + 1);
        let item = list_to_item(list, version)?;

        let request = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item));
        let request = match expected_version {
            None => request.condition_expression("attribute_not_exists(id)"),
            Some(expected) => request
                .condition_expression("#version = :expected")
                .expression_attribute_names("#version", "version")
                .expression_attribute_values(":expected", AttributeValue::N(expected.to_string())),
        };

        match request.send().await {
            Ok(_) => {
                log::debug!("Stored list {} at version {}", list.id, version);
                Ok(version)
            }
            Err(e) => {
                let conditional = e
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_conditional_check_failed_exception());
                if conditional {
                    return Err(match expected_version {
                        None => StoreError::AlreadyExists(list.id.clone()),
                        Some(_) => StoreError::Conflict(list.id.clone()),
                    });
                }
                log::error!("DynamoDB put_item failed for list {}: {:?}", list.id, e);
                Err(StoreError::Backend(e.to_string()))
            }
        }
    }

    async fn delete(&self, list_id: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(list_id.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB delete_item failed for list {}: {:?}", list_id, e);
                StoreError::Backend(e.to_string())
            })?;
        Ok(result.attributes().is_some_and(|attrs| !attrs.is_empty()))
    }

    async fn query_by_owner(
        &self,
        owner_id: &str,
        status: Option<ListStatus>,
    ) -> Result<Vec<ShoppingList>, StoreError> {
        let mut lists = Vec::new();
        let mut start_key = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table)
                .expression_attribute_values(":owner_id", AttributeValue::S(owner_id.to_string()))
                .set_exclusive_start_key(start_key.take());
            request = match status {
                Some(status) => request
                    .filter_expression("owner_id = :owner_id AND #status = :status")
                    .expression_attribute_names("#status", "status")
                    .expression_attribute_values(":status", AttributeValue::S(status.to_string())),
                None => request.filter_expression("owner_id = :owner_id"),
            };

            let result = request.send().await.map_err(|e| {
                log::error!("DynamoDB scan failed for owner {}: {:?}", owner_id, e);
                StoreError::Backend(e.to_string())
            })?;

            for item in result.items() {
                lists.push(item_to_list(item)?.list);
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ShoppingList {
        ShoppingList {
            id: "list-1".to_string(),
            owner_id: "user-1".to_string(),
            created_at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            items: vec![PredictionItem {
                product_id: "buah-1".to_string(),
                name: "Buah".to_string(),
                confidence: 0.9,
                quantity: 2,
            }],
            status: ListStatus::Completed,
        }
    }

    #[test]
    fn item_attributes_round_trip() {
        let item = list_to_item(&sample(), 3).unwrap();
        assert_eq!(item["status"], AttributeValue::S("completed".to_string()));
        assert_eq!(item["version"], AttributeValue::N("3".to_string()));
        let parsed = item_to_list(&item).unwrap();
        assert_eq!(parsed.list, sample());
        assert_eq!(parsed.version, 3);
    }

    #[test]
    fn missing_attributes_are_invalid_data() {
        let mut item = list_to_item(&sample(), 1).unwrap();
        item.remove("owner_id");
        assert!(matches!(item_to_list(&item), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn unknown_status_is_invalid_data() {
        let mut item = list_to_item(&sample(), 1).unwrap();
        item.insert("status".to_string(), AttributeValue::S("draft".to_string()));
        assert!(matches!(item_to_list(&item), Err(StoreError::InvalidData(_))));
    }
}
