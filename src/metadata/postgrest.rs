//! PostgREST (Supabase REST) metadata store.
//!
//! Issues one `GET {url}/rest/v1/{table}?select=...&id=in.(...)` per batch,
//! embedding the variant, product and brand rows through foreign-key joins.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::metadata::{MetadataRecord, MetadataStore};

/// Embedded select for `product_images` and its parent rows.
pub const DEFAULT_SELECT: &str =
    "id,image_url,product_variants(id,name,model_number,products(id,name,brands(id,name)))";

fn default_table() -> String {
    "product_images".to_string()
}

fn default_select() -> String {
    DEFAULT_SELECT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgrestMetadataStoreConfig {
    /// Project URL; `/rest/v1` is appended.
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing)]
    pub key: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_select")]
    pub select: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PostgrestMetadataStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            table: default_table(),
            select: default_select(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug)]
pub struct PostgrestMetadataStore {
    client: reqwest::Client,
    endpoint: Url,
    key: String,
    select: String,
}

impl PostgrestMetadataStore {
    pub fn new(config: PostgrestMetadataStoreConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(LensError::invalid_config(
                "postgrest metadata store requires a url",
            ));
        }
        let endpoint = Url::parse(&format!(
            "{}/rest/v1/{}",
            config.url.trim_end_matches('/'),
            config.table
        ))
        .map_err(|e| LensError::invalid_config(format!("invalid metadata store url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LensError::metadata(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            key: config.key,
            select: config.select,
        })
    }

    /// Build the request URL for one batch.
    pub fn batch_url(&self, ids: &[String]) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("select", &self.select)
            .append_pair("id", &in_filter(ids));
        url
    }
}

/// PostgREST `in` filter with every value double-quoted.
fn in_filter(ids: &[String]) -> String {
    let quoted = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({quoted})")
}

#[async_trait]
impl MetadataStore for PostgrestMetadataStore {
    async fn fetch(&self, ids: &[String]) -> Result<Vec<MetadataRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(self.batch_url(ids))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .send()
            .await
            .map_err(|e| LensError::metadata(format!("metadata request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LensError::metadata(format!(
                "metadata store returned HTTP {status}: {body}"
            )));
        }

        response
            .json::<Vec<MetadataRecord>>()
            .await
            .map_err(|e| LensError::metadata(format!("invalid metadata response: {e}")))
    }

    fn name(&self) -> &str {
        "postgrest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PostgrestMetadataStore {
        PostgrestMetadataStore::new(PostgrestMetadataStoreConfig {
            url: "https://project.supabase.co/".to_string(),
            key: "secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_in_filter_quotes_values() {
        let ids = vec!["a,b".to_string(), "say \"hi\"".to_string()];
        assert_eq!(in_filter(&ids), r#"in.("a,b","say \"hi\"")"#);
    }

    #[test]
    fn test_batch_url() {
        let url = store().batch_url(&["1".to_string(), "2".to_string()]);
        assert_eq!(url.path(), "/rest/v1/product_images");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("select".to_string(), DEFAULT_SELECT.to_string()));
        assert_eq!(pairs[1], ("id".to_string(), r#"in.("1","2")"#.to_string()));
    }

    #[test]
    fn test_requires_url() {
        assert!(PostgrestMetadataStore::new(PostgrestMetadataStoreConfig::default()).is_err());
    }
}
