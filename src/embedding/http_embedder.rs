//! Remote embedding provider over HTTP.
//!
//! Text goes to `{url}/text` as `{"text": "..."}`; images go to
//! `{url}/image` as a PNG body. Both endpoints answer with
//! `{"embedding": [f32, ...]}`.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::embedding::embedder::{EmbedInput, EmbedInputType, Embedder};
use crate::error::{LensError, Result};
use crate::vector::Vector;

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEmbedderConfig {
    pub url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(LensError::invalid_config("http embedder requires a url"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LensError::internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| LensError::inference(format!("failed to encode query image: {e}")))?;
        Ok(buf.into_inner())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vector> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| LensError::inference(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LensError::inference(format!(
                "embedding service returned HTTP {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LensError::inference(format!("invalid embedding response: {e}")))?;
        Ok(Vector::new(parsed.embedding))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
        match input {
            EmbedInput::Text(text) => {
                let request = self
                    .client
                    .post(self.endpoint("text"))
                    .json(&TextRequest { text });
                self.send(request).await
            }
            EmbedInput::Image(image) => {
                let body = Self::encode_png(image)?;
                let request = self
                    .client
                    .post(self.endpoint("image"))
                    .header(reqwest::header::CONTENT_TYPE, "image/png")
                    .body(body);
                self.send(request).await
            }
        }
    }

    fn supported_input_types(&self) -> Vec<EmbedInputType> {
        vec![EmbedInputType::Text, EmbedInputType::Image]
    }

    fn name(&self) -> &str {
        "http"
    }
}
