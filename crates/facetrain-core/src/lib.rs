//! facetrain-core: face enrollment engine.
//!
//! Detects faces with SCRFD, extracts ArcFace embeddings via ONNX Runtime,
//! averages them per person and stores the result as a profile on disk.

pub mod aggregate;
pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod input;
pub mod recognizer;
pub mod store;
pub mod types;

pub use aggregate::{average, AggregateError};
pub use detector::ScrfdDetector;
pub use encoder::{
    EmbeddingExtractor, EncoderError, FaceDetector, FaceEncoder, FacePipeline, FacePolicy,
    KeypointLocator, LandmarkLocator, ModelError, OnnxFaceEncoder,
};
pub use input::{ImageSource, InputError};
pub use recognizer::ArcFaceRecognizer;
pub use store::{NameError, PersonName, ProfileStore, SavedProfile, StoreError};
pub use types::{Embedding, FaceRegion, Landmarks, PersonProfile};

use std::path::PathBuf;

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default model directory: `$XDG_DATA_HOME/facetrain/models`, falling back
/// to `~/.local/share/facetrain/models`, then `./models`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(data) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data).join("facetrain/models");
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/share/facetrain/models"),
        Err(_) => PathBuf::from("models"),
    }
}
