use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// One line of a shopping list, as produced by image processing and as stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionItem {
    #[serde(default)]
    pub product_id: String,
    pub name: String,
    pub confidence: f32,
    pub quantity: u32,
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListStatus {
    Active,
    Completed,
}

impl Default for ListStatus {
    fn default() -> Self {
        ListStatus::Active
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PredictionItem>,
    pub status: ListStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateListRequest {
    #[serde(default)]
    pub items: Vec<PredictionItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateItemsRequest {
    pub items: Vec<PredictionItem>,
}

/// The status is kept as raw text so an unknown value can be rejected
/// as an invalid transition instead of a malformed body.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProcessImageResponse {
    pub success: bool,
    pub predictions: Vec<PredictionItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeleteResponse {
    pub success: bool,
}
