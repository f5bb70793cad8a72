//! Reduce a session's embeddings to one representative vector.

use crate::types::Embedding;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AggregateError {
    #[error("embedding {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Element-wise arithmetic mean of `embeddings`.
///
/// Returns `Ok(None)` for an empty slice. Sums are accumulated in f64 so the
/// mean of a single embedding is that embedding bit for bit. The model
/// version is kept only when every input agrees on it.
pub fn average(embeddings: &[Embedding]) -> Result<Option<Embedding>, AggregateError> {
    let Some(first) = embeddings.first() else {
        return Ok(None);
    };

    let dim = first.dim();
    let mut sums = vec![0.0f64; dim];

    for (index, embedding) in embeddings.iter().enumerate() {
        if embedding.dim() != dim {
            return Err(AggregateError::DimensionMismatch {
                index,
                expected: dim,
                actual: embedding.dim(),
            });
        }
        for (sum, &value) in sums.iter_mut().zip(&embedding.values) {
            *sum += value as f64;
        }
    }

    let count = embeddings.len() as f64;
    let values = sums.into_iter().map(|sum| (sum / count) as f32).collect();

    let model_version = first.model_version.clone().filter(|version| {
        embeddings
            .iter()
            .all(|e| e.model_version.as_deref() == Some(version.as_str()))
    });

    Ok(Some(Embedding {
        values,
        model_version,
    }))
}
