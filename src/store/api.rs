use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::error;

use crate::config::{NetworkConfig, StoreConfig};
use crate::events::SnapshotSource;
use crate::models::{Item, ItemPatch, NewItem};

/// Typed client for the store's row API (`/rest/v1/{table}`). Errors are
/// real here; the adapter in `store::CatalogStore` decides what callers see.
#[derive(Clone)]
pub struct CatalogApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl CatalogApi {
    pub fn new(store: &StoreConfig, network: &NetworkConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network.connection_timeout))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: store.url.trim_end_matches('/').to_string(),
            api_key: store.key.clone(),
            table: store.table.clone(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", self.api_key.as_str())
            .bearer_auth(&self.api_key)
    }

    /// True when the table holds at least one row.
    pub async fn any_items(&self) -> Result<bool> {
        let response = self
            .authed(self.client.get(self.table_url()))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await
            .context("catalog probe failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("catalog probe returned {}", response.status()));
        }

        let rows: Vec<Value> = response.json().await.context("invalid probe response")?;
        Ok(!rows.is_empty())
    }

    /// All items, newest first.
    pub async fn fetch_items(&self) -> Result<Vec<Item>> {
        let response = self
            .authed(self.client.get(self.table_url()))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await
            .context("catalog query failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("catalog query returned {}", response.status()));
        }

        response.json().await.context("invalid catalog response")
    }

    pub async fn fetch_item(&self, id: &str) -> Result<Item> {
        let response = self
            .authed(self.client.get(self.table_url()))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            // Single-object representation; the store answers 406 when the
            // filter matches no row.
            .header(ACCEPT, "application/vnd.pgrst.object+json")
            .send()
            .await
            .context("item lookup failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("item {id} lookup returned {}", response.status()));
        }

        response.json().await.context("invalid item response")
    }

    /// Inserts one item and returns the created row, id and timestamp
    /// assigned by the store.
    pub async fn insert_item(&self, item: &NewItem) -> Result<Item> {
        let response = self
            .authed(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&[item])
            .send()
            .await
            .context("item insert failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("item insert returned {}", response.status()));
        }

        let created: Vec<Item> = response.json().await.context("invalid insert response")?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("store returned no created row"))
    }

    /// Applies a partial update and returns the updated row. Matching no row
    /// is an error, mirroring a single-row update contract.
    pub async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<Item> {
        let response = self
            .authed(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .context("item update failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("item {id} update returned {}", response.status()));
        }

        let updated: Vec<Item> = response.json().await.context("invalid update response")?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no item {id} to update"))
    }

    /// Deletes by id. A delete matching no rows still succeeds.
    pub async fn delete_item(&self, id: &str) -> Result<()> {
        let response = self
            .authed(self.client.delete(self.table_url()))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await
            .context("item delete failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("item {id} delete returned {}", response.status()));
        }

        Ok(())
    }

    /// Values of one scalar text column across all rows. Null cells are
    /// skipped.
    pub async fn fetch_text_column(&self, column: &str) -> Result<Vec<String>> {
        let rows = self.fetch_column_rows(column).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Values of one list-valued column across all rows, flattened.
    pub async fn fetch_list_column(&self, column: &str) -> Result<Vec<String>> {
        let rows = self.fetch_column_rows(column).await?;
        let mut values = Vec::new();
        for row in &rows {
            if let Some(entries) = row.get(column).and_then(Value::as_array) {
                values.extend(entries.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
        Ok(values)
    }

    async fn fetch_column_rows(&self, column: &str) -> Result<Vec<Value>> {
        let response = self
            .authed(self.client.get(self.table_url()))
            .query(&[("select", column)])
            .send()
            .await
            .with_context(|| format!("column {column} query failed"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "column {column} query returned {}",
                response.status()
            ));
        }

        response.json().await.context("invalid column response")
    }
}

#[async_trait]
impl SnapshotSource for CatalogApi {
    async fn snapshot(&self) -> Vec<Item> {
        match self.fetch_items().await {
            Ok(items) => items,
            Err(err) => {
                error!("failed to fetch catalog items: {err:#}");
                Vec::new()
            }
        }
    }
}
