//! Supabase Storage blob store.
//!
//! Objects are downloaded from `{url}/storage/v1/object/{bucket}/{key}`
//! using the service key for both the `apikey` and bearer headers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::storage::BlobStore;

fn default_bucket() -> String {
    "faiss".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseBlobStoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    /// Service or anon key. Usually injected from `SUPABASE_KEY`.
    #[serde(default, skip_serializing)]
    pub key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug)]
pub struct SupabaseBlobStore {
    client: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl SupabaseBlobStore {
    pub fn new(config: SupabaseBlobStoreConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(LensError::invalid_config("supabase blob store requires a url"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LensError::storage(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key,
            bucket: config.bucket,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(key))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .send()
            .await
            .map_err(|e| LensError::storage(format!("failed to download {key}: {e}")))?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| LensError::storage(format!("failed to read {key}: {e}")))?;
                Ok(bytes.to_vec())
            }
            // Supabase reports missing objects as 400 with a "not_found" body.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                Err(LensError::not_found(format!("{}/{key}", self.bucket)))
            }
            status => Err(LensError::storage(format!(
                "failed to download {key}: HTTP {status}"
            ))),
        }
    }

    fn name(&self) -> &str {
        "supabase"
    }
}
