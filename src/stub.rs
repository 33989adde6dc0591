//! Bundled deterministic extractor.
//!
//! [`HashExtractor`] stands in for a real detection + embedding backend in
//! tests, benches, and the demo binary. It decodes the image, reduces it to
//! an 8x8 grayscale thumbnail, and derives a seeded unit vector from the
//! thumbnail content. Identical input bytes always yield identical
//! descriptors (distance 0.0), unrelated images land far apart, and a flat
//! single-shade image maps to the no-face signal. Because descriptors derive
//! from decoded content rather than raw bytes, re-encodings of the same
//! photo still match each other.

use async_trait::async_trait;
use fxhash::hash64;
use image::imageops::FilterType;

use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::extractor::{DescriptorExtractor, ModelGate};
use crate::types::Embedding;

const THUMB_SIZE: u32 = 8;

/// Deterministic content-hash extractor.
pub struct HashExtractor {
    dim: usize,
    seed: u64,
    gate: ModelGate<Vec<u64>>,
}

impl HashExtractor {
    pub fn new(dim: usize, seed: u64) -> Self {
        HashExtractor {
            dim,
            seed,
            gate: ModelGate::new(),
        }
    }

    pub fn from_config(cfg: &ExtractorConfig) -> Self {
        Self::new(cfg.dim, cfg.seed)
    }

    /// Descriptor dimensionality this extractor produces.
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, lane_seeds: &[u64], thumb: &[u8]) -> Embedding {
        let h = hash64(thumb);
        let mut v = vec![0f32; self.dim];
        for (idx, value) in v.iter_mut().enumerate() {
            *value = (((h ^ lane_seeds[idx]) >> (idx % 32)) as f32 * 0.0001).sin();
        }
        l2_normalize_in_place(&mut v);
        Embedding::new(v)
    }
}

impl Default for HashExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractorConfig::default())
    }
}

#[async_trait]
impl DescriptorExtractor for HashExtractor {
    async fn load_models(&self) -> Result<(), ExtractError> {
        let dim = self.dim;
        let seed = self.seed;
        self.gate
            .ready(|| async move { Ok(lane_seeds(dim, seed)) })
            .await?;
        Ok(())
    }

    async fn extract(&self, bytes: &[u8]) -> Result<Option<Embedding>, ExtractError> {
        let lane_seeds = self.gate.get()?;
        let thumb = luma_thumbnail(bytes)?;

        // A flat thumbnail carries no face-like structure: the no-face case.
        let min = thumb.iter().copied().min().unwrap_or(0);
        let max = thumb.iter().copied().max().unwrap_or(0);
        if max == min {
            return Ok(None);
        }

        Ok(Some(self.embed(lane_seeds, &thumb)))
    }
}

/// Per-lane seed chain derived from the configured seed.
fn lane_seeds(dim: usize, seed: u64) -> Vec<u64> {
    let mut seeds = Vec::with_capacity(dim);
    let mut s = seed;
    for _ in 0..dim {
        s = hash64(&s.to_le_bytes());
        seeds.push(s);
    }
    seeds
}

fn luma_thumbnail(bytes: &[u8]) -> Result<Vec<u8>, ExtractError> {
    let img = image::load_from_memory(bytes)
        .map_err(|err| ExtractError::InvalidImage(err.to_string()))?;
    let thumb = img
        .resize_exact(THUMB_SIZE, THUMB_SIZE, FilterType::Triangle)
        .to_luma8();
    Ok(thumb.into_raw())
}

fn l2_normalize_in_place(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
