//! Session configuration independent of `ort` types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Token sequence length of the CLIP text encoders
pub const TEXT_SEQUENCE_LENGTH: i64 = 77;

/// Latent channels produced by the VAE
pub const LATENT_CHANNELS: i64 = 4;

/// Spatial downscale factor between image and latent
pub const VAE_SCALE_FACTOR: u32 = 8;

/// Width of the pooled text embedding fed to the SDXL UNet
pub const XL_TEXT_EMBEDS_SIZE: i64 = 1280;

/// Length of the SDXL micro-conditioning time ids
pub const XL_TIME_IDS_SIZE: i64 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Values for named symbolic dimensions
    pub dimension_overrides: BTreeMap<String, i64>,
    pub memory_pattern: bool,
    pub intra_threads: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dimension_overrides: BTreeMap::new(),
            memory_pattern: true,
            intra_threads: None,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for the graphs of one diffusion run
    ///
    /// Classifier-free guidance doubles the UNet batch. Memory pattern
    /// planning is off because the graphs see varying shapes between the
    /// text encoders and the UNet. Latent sizes round down.
    pub fn for_diffusion(batch_size: u32, height: u32, width: u32, is_xl: bool) -> Self {
        let guided_batch = i64::from(batch_size) * 2;
        let mut options = Self::new()
            .with_memory_pattern(false)
            .with_dimension_override("unet_sample_batch", guided_batch)
            .with_dimension_override("unet_sample_channels", LATENT_CHANNELS)
            .with_dimension_override("unet_sample_height", i64::from(height / VAE_SCALE_FACTOR))
            .with_dimension_override("unet_sample_width", i64::from(width / VAE_SCALE_FACTOR))
            .with_dimension_override("unet_time_batch", 1)
            .with_dimension_override("unet_hidden_batch", guided_batch)
            .with_dimension_override("unet_hidden_sequence", TEXT_SEQUENCE_LENGTH);

        if is_xl {
            options = options
                .with_dimension_override("unet_text_embeds_batch", guided_batch)
                .with_dimension_override("unet_text_embeds_size", XL_TEXT_EMBEDS_SIZE)
                .with_dimension_override("unet_time_ids_batch", guided_batch)
                .with_dimension_override("unet_time_ids_size", XL_TIME_IDS_SIZE);
        }

        options
    }

    pub fn with_dimension_override(mut self, name: impl Into<String>, value: i64) -> Self {
        self.dimension_overrides.insert(name.into(), value);
        self
    }

    pub fn with_memory_pattern(mut self, enable: bool) -> Self {
        self.memory_pattern = enable;
        self
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    pub fn dimension(&self, name: &str) -> Option<i64> {
        self.dimension_overrides.get(name).copied()
    }
}
