//! Face encoding: image → embeddings, one per selected face.
//!
//! The three model stages sit behind traits so the ONNX implementations can
//! be swapped for fakes in tests.

use crate::detector::{DetectorError, ScrfdDetector};
use crate::recognizer::{ArcFaceRecognizer, RecognizerError};
use crate::types::{Embedding, FaceRegion, Landmarks};
use crate::{DETECTOR_MODEL_FILE, RECOGNIZER_MODEL_FILE};
use image::{imageops, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Number of jitter passes handed to the embedding extractor.
pub const EMBEDDING_JITTERS: u32 = 1;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("face has no keypoints; the detector must emit landmarks for alignment")]
    NoLandmarks,
}

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("landmark error: {0}")]
    Landmark(#[from] LandmarkError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to load face detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("failed to load face recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Image → face regions, run on the single-channel intensity image.
pub trait FaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRegion>, DetectorError>;
}

/// Face region → facial landmark geometry.
pub trait LandmarkLocator {
    fn locate(&mut self, gray: &GrayImage, face: &FaceRegion) -> Result<Landmarks, LandmarkError>;
}

/// Colour image + landmarks → fixed-length embedding.
pub trait EmbeddingExtractor {
    fn extract(
        &mut self,
        image: &RgbImage,
        landmarks: &Landmarks,
        jitters: u32,
    ) -> Result<Embedding, RecognizerError>;
}

/// Image → one embedding per selected face. No faces is an empty vector.
pub trait FaceEncoder {
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncoderError>;
}

impl<T: FaceEncoder + ?Sized> FaceEncoder for Box<T> {
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncoderError> {
        (**self).encode(image)
    }
}

/// Which detected faces in one image contribute embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacePolicy {
    /// Every detected face.
    #[default]
    All,
    /// Only the face with the largest bounding box.
    Largest,
}

impl FacePolicy {
    fn select(self, mut faces: Vec<FaceRegion>) -> Vec<FaceRegion> {
        match self {
            FacePolicy::All => faces,
            FacePolicy::Largest => {
                let largest = (0..faces.len())
                    .max_by(|&a, &b| faces[a].area().total_cmp(&faces[b].area()));
                match largest {
                    Some(idx) => vec![faces.swap_remove(idx)],
                    None => faces,
                }
            }
        }
    }
}

impl FromStr for FacePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FacePolicy::All),
            "largest" => Ok(FacePolicy::Largest),
            other => Err(format!("unknown face policy {other:?} (expected \"all\" or \"largest\")")),
        }
    }
}

impl fmt::Display for FacePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FacePolicy::All => "all",
            FacePolicy::Largest => "largest",
        })
    }
}

/// Detect → locate → extract, composed from the three stages.
pub struct FacePipeline<D, L, X> {
    detector: D,
    locator: L,
    extractor: X,
    policy: FacePolicy,
}

impl<D, L, X> FacePipeline<D, L, X> {
    pub fn new(detector: D, locator: L, extractor: X, policy: FacePolicy) -> Self {
        Self {
            detector,
            locator,
            extractor,
            policy,
        }
    }
}

impl<D, L, X> FaceEncoder for FacePipeline<D, L, X>
where
    D: FaceDetector,
    L: LandmarkLocator,
    X: EmbeddingExtractor,
{
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncoderError> {
        let gray = imageops::grayscale(image);
        let faces = self.detector.detect(&gray)?;
        let detected = faces.len();
        let faces = self.policy.select(faces);

        tracing::debug!(detected, selected = faces.len(), policy = %self.policy, "faces");

        let mut embeddings = Vec::with_capacity(faces.len());
        for face in &faces {
            let landmarks = self.locator.locate(&gray, face)?;
            embeddings.push(self.extractor.extract(image, &landmarks, EMBEDDING_JITTERS)?);
        }
        Ok(embeddings)
    }
}

/// Uses the five keypoints the detector emits alongside each box.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeypointLocator;

impl LandmarkLocator for KeypointLocator {
    fn locate(&mut self, _gray: &GrayImage, face: &FaceRegion) -> Result<Landmarks, LandmarkError> {
        face.keypoints.ok_or(LandmarkError::NoLandmarks)
    }
}

impl FaceDetector for ScrfdDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRegion>, DetectorError> {
        ScrfdDetector::detect(self, gray)
    }
}

impl EmbeddingExtractor for ArcFaceRecognizer {
    fn extract(
        &mut self,
        image: &RgbImage,
        landmarks: &Landmarks,
        jitters: u32,
    ) -> Result<Embedding, RecognizerError> {
        ArcFaceRecognizer::extract(self, image, landmarks, jitters)
    }
}

/// SCRFD + keypoints + ArcFace.
pub type OnnxFaceEncoder = FacePipeline<ScrfdDetector, KeypointLocator, ArcFaceRecognizer>;

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`. Fails if either file is missing or
    /// cannot be turned into an ONNX Runtime session.
    pub fn load(model_dir: &Path, policy: FacePolicy) -> Result<Self, ModelError> {
        let detector = ScrfdDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let recognizer = ArcFaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(FacePipeline::new(detector, KeypointLocator, recognizer, policy))
    }
}
