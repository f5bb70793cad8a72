use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Five facial keypoints in source pixel coordinates:
/// [left_eye, right_eye, nose, left_mouth, right_mouth].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmarks {
    pub points: [(f32, f32); 5],
}

/// A detected face region, with the detector's keypoints when it emits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub keypoints: Option<Landmarks>,
}

impl FaceRegion {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

/// A trained person: the averaged embedding plus how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonProfile {
    pub name: String,
    pub embedding: Embedding,
    /// Number of embeddings averaged into `embedding`.
    pub samples: usize,
    pub trained_at: DateTime<Utc>,
}
