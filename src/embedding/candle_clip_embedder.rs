//! In-process CLIP embedder built on candle.
//!
//! Weights and tokenizer are fetched from the Hugging Face hub on first use
//! and cached locally by `hf-hub`.

use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use image::RgbImage;
use image::imageops::{self, FilterType};
use tokenizers::Tokenizer;

use crate::embedding::embedder::{EmbedInput, EmbedInputType, Embedder};
use crate::error::{LensError, Result};
use crate::vector::Vector;

const PAD_TOKEN: &str = "<|endoftext|>";

/// Per-channel pixel statistics the CLIP image tower was trained with.
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Convert an image into the `3 x size x size` CLIP input layout.
///
/// The short side is resized to `size` with a bicubic filter, the long side
/// is center-cropped, then every channel is scaled to `[0, 1]` and
/// standardized with [`CLIP_MEAN`] and [`CLIP_STD`].
pub fn clip_pixels(image: &RgbImage, size: u32) -> Result<Vec<f32>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || size == 0 {
        return Err(LensError::decode("image has no pixels"));
    }

    let scale =
        |long: u32, short: u32| (u64::from(size) * u64::from(long) / u64::from(short)) as u32;
    let (resized_w, resized_h) = if width <= height {
        (size, scale(height, width))
    } else {
        (scale(width, height), size)
    };
    let resized = imageops::resize(image, resized_w, resized_h, FilterType::CatmullRom);

    let offset = |extent: u32| (f64::from(extent - size) / 2.0).round_ties_even() as u32;
    let cropped =
        imageops::crop_imm(&resized, offset(resized_w), offset(resized_h), size, size).to_image();

    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, pixel) in cropped.pixels().enumerate() {
        for channel in 0..3 {
            let value = f32::from(pixel[channel]) / 255.0;
            data[channel * plane + i] = (value - CLIP_MEAN[channel]) / CLIP_STD[channel];
        }
    }
    Ok(data)
}

struct ClipRuntime {
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    max_tokens: usize,
    pad_id: u32,
}

/// CLIP ViT embedder for both text and images.
#[derive(Clone)]
pub struct CandleClipEmbedder {
    model_id: String,
    runtime: Arc<ClipRuntime>,
}

impl std::fmt::Debug for CandleClipEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleClipEmbedder")
            .field("model_id", &self.model_id)
            .finish()
    }
}

fn inference_err(err: impl std::fmt::Display) -> LensError {
    LensError::inference(err.to_string())
}

impl CandleClipEmbedder {
    /// Download (or reuse cached) weights and build the model.
    pub fn new(model_id: &str, revision: &str) -> Result<Self> {
        let api = Api::new().map_err(inference_err)?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));
        let weights = repo.get("model.safetensors").map_err(inference_err)?;
        let tokenizer_file = repo.get("tokenizer.json").map_err(inference_err)?;

        let tokenizer = Tokenizer::from_file(tokenizer_file).map_err(inference_err)?;
        let pad_id = tokenizer
            .get_vocab(true)
            .get(PAD_TOKEN)
            .copied()
            .ok_or_else(|| LensError::inference(format!("tokenizer has no {PAD_TOKEN} token")))?;

        let config = ClipConfig::vit_base_patch32();
        let device = Device::cuda_if_available(0).map_err(inference_err)?;
        // SAFETY: the weights file is owned by the hub cache and not mutated while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)
                .map_err(inference_err)?
        };
        let model = ClipModel::new(vb, &config).map_err(inference_err)?;

        log::info!("Loaded CLIP model {model_id} on {device:?}");

        Ok(Self {
            model_id: model_id.to_string(),
            runtime: Arc::new(ClipRuntime {
                model,
                tokenizer,
                device,
                image_size: config.image_size,
                max_tokens: config.text_config.max_position_embeddings,
                pad_id,
            }),
        })
    }
}

impl ClipRuntime {
    fn image_features(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let data = clip_pixels(image, self.image_size as u32)?;
        let pixels = Tensor::from_vec(data, (3, self.image_size, self.image_size), &Device::Cpu)
            .and_then(|t| t.unsqueeze(0))
            .and_then(|t| t.to_device(&self.device))
            .map_err(inference_err)?;

        self.model
            .get_image_features(&pixels)
            .and_then(|features| features.squeeze(0))
            .and_then(|features| features.to_vec1::<f32>())
            .map_err(inference_err)
    }

    fn text_features(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self.tokenizer.encode(text, true).map_err(inference_err)?;
        let mut ids = encoding.get_ids().to_vec();
        ids.truncate(self.max_tokens);
        ids.resize(self.max_tokens, self.pad_id);

        let input_ids = Tensor::new(vec![ids], &self.device).map_err(inference_err)?;
        self.model
            .get_text_features(&input_ids)
            .and_then(|features| features.squeeze(0))
            .and_then(|features| features.to_vec1::<f32>())
            .map_err(inference_err)
    }
}

#[async_trait]
impl Embedder for CandleClipEmbedder {
    async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
        let runtime = Arc::clone(&self.runtime);
        let task = match input {
            EmbedInput::Text(text) => {
                let text = text.to_string();
                tokio::task::spawn_blocking(move || runtime.text_features(&text))
            }
            EmbedInput::Image(image) => {
                let image = (*image).clone();
                tokio::task::spawn_blocking(move || runtime.image_features(&image))
            }
        };
        let data = task
            .await
            .map_err(|e| LensError::inference(format!("clip inference task failed: {e}")))??;
        Ok(Vector::new(data))
    }

    fn supported_input_types(&self) -> Vec<EmbedInputType> {
        vec![EmbedInputType::Text, EmbedInputType::Image]
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn expected(channel: usize, value: f32) -> f32 {
        (value - CLIP_MEAN[channel]) / CLIP_STD[channel]
    }

    #[test]
    fn test_clip_pixels_center_crops_wide_image() {
        // 8x4: the two leftmost and two rightmost columns are black.
        let image = RgbImage::from_fn(8, 4, |x, _| {
            if (2..6).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let data = clip_pixels(&image, 4).unwrap();
        assert_eq!(data.len(), 3 * 4 * 4);

        for channel in 0..3 {
            let white = expected(channel, 1.0);
            for value in &data[channel * 16..(channel + 1) * 16] {
                assert!((value - white).abs() < 0.05, "{value} vs {white}");
            }
        }
        assert!((expected(0, 1.0) - 1.9303).abs() < 1e-3);
    }

    #[test]
    fn test_clip_pixels_resizes_short_side() {
        let image = RgbImage::from_pixel(3, 9, Rgb([0, 0, 0]));
        let data = clip_pixels(&image, 6).unwrap();
        assert_eq!(data.len(), 3 * 6 * 6);
        assert!((data[0] - expected(0, 0.0)).abs() < 1e-4);
        assert!((data[2 * 36] - expected(2, 0.0)).abs() < 1e-4);
    }

    #[test]
    fn test_clip_pixels_rejects_empty_image() {
        assert!(clip_pixels(&RgbImage::new(0, 4), 4).is_err());
    }
}
