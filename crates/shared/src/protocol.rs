use serde::{Deserialize, Serialize};

use crate::domain::{CategoryId, Item, ItemId, ItemStatus};

/// Item as served by `GET /categories`: the catalog record plus the status
/// joined in from the status table. An unset status is omitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload {
    #[serde(flatten)]
    pub item: Item,
    #[serde(default, skip_serializing_if = "status_is_unset")]
    pub status: ItemStatus,
}

fn status_is_unset(status: &ItemStatus) -> bool {
    !status.is_set()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPayload {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_deadline: Option<String>,
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_deadline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub id: ItemId,
    pub category_id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_preferred: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResetResponse {
    pub ok: bool,
    pub cleared: u64,
}
