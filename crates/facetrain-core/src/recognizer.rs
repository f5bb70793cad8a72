//! ArcFace face recognizer via ONNX Runtime.
//!
//! Extracts 512-dimensional embeddings from colour faces aligned to the
//! canonical 112×112 position, using the w600k_r50 ArcFace model.

use crate::alignment;
use crate::types::{Embedding, Landmarks};
use image::imageops;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different from SCRFD!) ---
const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric normalization
pub const ARCFACE_EMBEDDING_DIM: usize = 512;
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";

/// Landmark offsets cycled through by successive jitter passes.
const JITTER_OFFSETS: [(f32, f32); 5] = [(0.0, 0.0), (1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)];

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based embedding extractor.
pub struct ArcFaceRecognizer {
    session: Session,
}

impl ArcFaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract an L2-normalized embedding for the face at `landmarks`.
    ///
    /// `jitters` is the number of aligned crops averaged before normalizing:
    /// the first is the plain alignment, later ones alternate a horizontal
    /// mirror with one-pixel landmark shifts. Zero is treated as one.
    pub fn extract(
        &mut self,
        image: &RgbImage,
        landmarks: &Landmarks,
        jitters: u32,
    ) -> Result<Embedding, RecognizerError> {
        let mut sum = vec![0.0f32; ARCFACE_EMBEDDING_DIM];
        for crop in jittered_crops(image, landmarks, jitters) {
            let raw = self.infer(&crop)?;
            for (acc, v) in sum.iter_mut().zip(raw) {
                *acc += v;
            }
        }

        Ok(Embedding {
            values: l2_normalize(sum),
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }

    fn infer(&mut self, aligned: &RgbImage) -> Result<Vec<f32>, RecognizerError> {
        let input = preprocess(aligned);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }
        Ok(raw.to_vec())
    }
}

fn jittered_crops(image: &RgbImage, landmarks: &Landmarks, jitters: u32) -> Vec<RgbImage> {
    (0..jitters.max(1) as usize)
        .map(|i| {
            let (dx, dy) = JITTER_OFFSETS[(i / 2) % JITTER_OFFSETS.len()];
            let shifted = Landmarks {
                points: landmarks.points.map(|(x, y)| (x + dx, y + dy)),
            };
            let crop = alignment::align_face(image, &shifted);
            if i % 2 == 1 {
                imageops::flip_horizontal(&crop)
            } else {
                crop
            }
        })
        .collect()
}

fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.into_iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

/// Aligned 112×112 RGB crop → normalized NCHW tensor.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in aligned.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel.0[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }

    tensor
}
