//! Embedding capability: batches of texts in, fixed-dimension vectors out.

use async_trait::async_trait;

use crate::types::PolicyError;

/// Produces one fixed-dimension vector per input text.
///
/// Implementations must return exactly one vector per input, in input order.
/// A failed call surfaces as [`PolicyError::ExternalService`]; it must never
/// silently produce an empty batch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PolicyError>;

    /// Identifier of the underlying model, for logs and diagnostics.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// Deterministic, dependency-free embedder for tests and offline runs.
///
/// Vectors are byte-histogram projections: identical texts always embed
/// identically and different texts almost always differ, which is all the
/// index tests need.
#[derive(Clone, Debug, Default)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub const DEFAULT_DIMENSION: usize = 16;

    pub fn new() -> Self {
        Self {
            dimension: Self::DEFAULT_DIMENSION,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension.max(1)];
        for (position, byte) in text.bytes().enumerate() {
            let slot = (byte as usize).wrapping_add(position) % vector.len();
            vector[slot] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PolicyError> {
        Ok(inputs.iter().map(|text| self.embed_one(text)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-histogram"
    }
}
