//! Query encoding.
//!
//! [`QueryEncoder`] turns a [`QueryInput`] into a unit-length [`Vector`].
//! Image bytes are decoded to RGB; for structure-sensitive modes the image
//! is reduced to luminance and expanded back to three channels so that only
//! shape information reaches the model. The provider's output is then
//! L2-normalized. This is the only place normalization happens.

use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};
use tokio::sync::Semaphore;

use crate::embedding::embedder::{EmbedInput, Embedder};
use crate::error::{LensError, Result};
use crate::registry::IndexMode;
use crate::vector::Vector;

/// A search query, either an uploaded image or free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    Image(Vec<u8>),
    Text(String),
}

impl QueryInput {
    /// Build the query from optional request parts.
    ///
    /// When both are present the image wins. Empty uploads and empty text
    /// count as absent.
    pub fn from_parts(file: Option<Vec<u8>>, text: Option<String>) -> Result<Self> {
        match (file.filter(|f| !f.is_empty()), text.filter(|t| !t.is_empty())) {
            (Some(bytes), _) => Ok(QueryInput::Image(bytes)),
            (None, Some(text)) => Ok(QueryInput::Text(text)),
            (None, None) => Err(LensError::invalid_argument(
                "Either 'file' or 'text' must be provided.",
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryInput::Image(_) => "image",
            QueryInput::Text(_) => "text",
        }
    }
}

/// Wraps the embedding provider and enforces the unit-norm contract.
#[derive(Debug, Clone)]
pub struct QueryEncoder {
    embedder: Arc<dyn Embedder>,
    permits: Arc<Semaphore>,
}

impl QueryEncoder {
    /// `max_concurrent` bounds simultaneous inference calls; 0 means one per CPU.
    pub fn new(embedder: Arc<dyn Embedder>, max_concurrent: usize) -> Self {
        let permits = if max_concurrent == 0 {
            num_cpus::get()
        } else {
            max_concurrent
        };
        Self {
            embedder,
            permits: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub async fn encode(&self, input: &QueryInput, mode: &IndexMode) -> Result<Vector> {
        match input {
            QueryInput::Image(bytes) => self.encode_image(bytes, mode).await,
            QueryInput::Text(text) => self.encode_text(text).await,
        }
    }

    pub async fn encode_image(&self, bytes: &[u8], mode: &IndexMode) -> Result<Vector> {
        let image = prepare_image(bytes, mode.structure_sensitive)?;
        self.run(&EmbedInput::Image(&image)).await
    }

    pub async fn encode_text(&self, text: &str) -> Result<Vector> {
        self.run(&EmbedInput::Text(text)).await
    }

    async fn run(&self, input: &EmbedInput<'_>) -> Result<Vector> {
        if !self.embedder.supports(input.input_type()) {
            return Err(LensError::inference(format!(
                "embedder '{}' does not accept {:?} input",
                self.embedder.name(),
                input.input_type()
            )));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| LensError::internal(format!("inference pool closed: {e}")))?;

        let raw = self.embedder.embed(input).await.map_err(|err| match err {
            err @ LensError::FeatureComputation { .. } => err,
            other => LensError::inference(other.to_string()),
        })?;
        normalize_embedding(raw)
    }
}

/// Decode image bytes to RGB, desaturating when `structure_sensitive`.
pub fn prepare_image(bytes: &[u8], structure_sensitive: bool) -> Result<RgbImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| LensError::decode(format!("cannot identify image: {e}")))?;
    let rgb = DynamicImage::into_rgb8(decoded);
    if structure_sensitive {
        Ok(desaturate(&rgb))
    } else {
        Ok(rgb)
    }
}

/// Replace every pixel with its ITU-R 601-2 luma, replicated on all channels.
pub fn desaturate(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b] = pixel.0;
        let luma =
            ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8;
        *pixel = Rgb([luma, luma, luma]);
    }
    out
}

/// Scale a provider embedding to unit length.
pub fn normalize_embedding(mut vector: Vector) -> Result<Vector> {
    if vector.dimension() == 0 {
        return Err(LensError::inference("embedder returned an empty vector"));
    }
    if !vector.is_valid() {
        return Err(LensError::inference("embedder returned non-finite values"));
    }
    if !vector.normalize() {
        return Err(LensError::inference("embedder returned a zero-length vector"));
    }
    Ok(vector)
}
