//! Stock (inventory) management. Only administrators may call these.

use crate::{error::ApiError, Client};
use reqwest::Method;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

pub async fn get_items(client: &Client) -> Result<Value, ApiError> {
    client.get(&["stock"]).await
}

pub async fn add_item(
    client: &Client,
    item: &StockItem,
) -> Result<Value, ApiError> {
    client.send_json(Method::POST, &["stock"], item).await
}

pub async fn update_item(
    client: &Client,
    item_id: &str,
    item: &StockItem,
) -> Result<Value, ApiError> {
    client.send_json(Method::PUT, &["stock", item_id], item).await
}

pub async fn delete_item(
    client: &Client,
    item_id: &str,
) -> Result<Value, ApiError> {
    client.delete(&["stock", item_id]).await
}

/// An entry in the clinic's inventory, as sent to the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit: String,
    #[serde(default)]
    pub supplier: String,
    pub cost_per_unit: f64,
    /// An ISO-8601 date, or empty if the item doesn't expire.
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    /// Restock once the quantity drops below this.
    pub min_stock_level: i64,
}

impl StockItem {
    pub fn is_low(&self) -> bool { self.quantity < self.min_stock_level }
}
