//! Embedder trait and input types.

use std::fmt::Debug;

use async_trait::async_trait;
use image::RgbImage;

use crate::error::Result;
use crate::vector::Vector;

/// Input accepted by an embedder.
#[derive(Debug, Clone, Copy)]
pub enum EmbedInput<'a> {
    Text(&'a str),
    /// A decoded three-channel image.
    Image(&'a RgbImage),
}

impl EmbedInput<'_> {
    pub fn input_type(&self) -> EmbedInputType {
        match self {
            EmbedInput::Text(_) => EmbedInputType::Text,
            EmbedInput::Image(_) => EmbedInputType::Image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedInputType {
    Text,
    Image,
}

/// A model that maps text or images into a shared vector space.
///
/// Implementations run inference only; they never update model state, so a
/// single instance is shared by all requests.
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Compute the raw (not necessarily normalized) embedding.
    async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector>;

    fn supported_input_types(&self) -> Vec<EmbedInputType>;

    fn supports(&self, input_type: EmbedInputType) -> bool {
        self.supported_input_types().contains(&input_type)
    }

    fn name(&self) -> &str;
}
