use facetrain_core::FacePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("capture_target must be at least 1")]
    ZeroCaptureTarget,
}

/// Training configuration.
///
/// Layered as: defaults → TOML file → `FACETRAIN_*` environment → flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Where per-person profiles are written.
    pub encodings_dir: PathBuf,
    /// V4L2 device path for webcam training.
    pub camera_device: String,
    /// Embeddings to collect per webcam session.
    pub capture_target: usize,
    /// Which faces in one image contribute embeddings.
    pub face_policy: FacePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: facetrain_core::default_model_dir(),
            encodings_dir: PathBuf::from("trained_encodings"),
            camera_device: "/dev/video0".to_string(),
            capture_target: 10,
            face_policy: FacePolicy::All,
        }
    }
}

impl Config {
    /// Defaults, overlaid with `file` (if given) and then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `FACETRAIN_*` variables. Unparsable values are
    /// logged and ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("FACETRAIN_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("FACETRAIN_ENCODINGS_DIR") {
            self.encodings_dir = PathBuf::from(dir);
        }
        if let Some(device) = lookup("FACETRAIN_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        if let Some(raw) = lookup("FACETRAIN_CAPTURE_TARGET") {
            match raw.trim().parse() {
                Ok(n) => self.capture_target = n,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid FACETRAIN_CAPTURE_TARGET"),
            }
        }
        if let Some(raw) = lookup("FACETRAIN_FACE_POLICY") {
            match raw.parse() {
                Ok(policy) => self.face_policy = policy,
                Err(e) => tracing::warn!(error = %e, "ignoring invalid FACETRAIN_FACE_POLICY"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_target == 0 {
            return Err(ConfigError::ZeroCaptureTarget);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.encodings_dir, PathBuf::from("trained_encodings"));
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.capture_target, 10);
        assert_eq!(config.face_policy, FacePolicy::All);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facetrain.toml");
        std::fs::write(&path, "encodings_dir = \"/srv/enc\"\nface_policy = \"largest\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.encodings_dir, PathBuf::from("/srv/enc"));
        assert_eq!(config.face_policy, FacePolicy::Largest);
        assert_eq!(config.capture_target, 10);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facetrain.toml");
        std::fs::write(&path, "capture_targt = 5\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FACETRAIN_MODEL_DIR", "/opt/models"),
            ("FACETRAIN_CAMERA_DEVICE", "/dev/video4"),
            ("FACETRAIN_CAPTURE_TARGET", "3"),
            ("FACETRAIN_FACE_POLICY", "largest"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.camera_device, "/dev/video4");
        assert_eq!(config.capture_target, 3);
        assert_eq!(config.face_policy, FacePolicy::Largest);
        assert_eq!(config.encodings_dir, PathBuf::from("trained_encodings"));
    }

    #[test]
    fn test_env_garbage_ignored() {
        let mut config = Config::default();
        config.apply_env(|k| match k {
            "FACETRAIN_CAPTURE_TARGET" => Some("many".into()),
            "FACETRAIN_FACE_POLICY" => Some("biggest".into()),
            _ => None,
        });
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_zero_capture_target_invalid() {
        let config = Config { capture_target: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCaptureTarget)));
    }
}
