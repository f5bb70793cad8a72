//! Per-person profile storage: one JSON file per trained name.

use crate::types::{Embedding, PersonProfile};
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PROFILE_EXTENSION: &str = "json";
const MAX_NAME_BYTES: usize = 128;
const RESERVED_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name is longer than 128 bytes")]
    TooLong,
    #[error("name may not start with '.'")]
    LeadingDot,
    #[error("name contains forbidden character {0:?}")]
    ForbiddenChar(char),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed profile {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("refusing to store an empty embedding")]
    EmptyEmbedding,
    #[error("refusing to store an embedding with a non-finite value at index {index}")]
    NonFinite { index: usize },
}

/// A person's name, validated for use as a file name.
///
/// Leading/trailing whitespace is trimmed. Path separators, control
/// characters, reserved punctuation and a leading dot are rejected so a
/// name can never escape the encodings directory or create a hidden file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonName(String);

impl PersonName {
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.len() > MAX_NAME_BYTES {
            return Err(NameError::TooLong);
        }
        if name.starts_with('.') {
            return Err(NameError::LeadingDot);
        }
        if let Some(c) = name
            .chars()
            .find(|c| c.is_control() || RESERVED_CHARS.contains(c))
        {
            return Err(NameError::ForbiddenChar(c));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful save.
#[derive(Debug, Clone)]
pub struct SavedProfile {
    pub path: PathBuf,
    /// Whether a previous profile for the same name was replaced.
    pub overwritten: bool,
}

/// Directory of trained person profiles.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// The directory is created lazily on the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &PersonName) -> PathBuf {
        self.dir
            .join(format!("{}.{PROFILE_EXTENSION}", name.as_str()))
    }

    /// Write `embedding` as the profile for `name`, replacing any previous one.
    ///
    /// The profile is written to a temporary sibling and renamed into place.
    pub fn save(
        &self,
        name: &PersonName,
        embedding: &Embedding,
        samples: usize,
    ) -> Result<SavedProfile, StoreError> {
        if embedding.values.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }
        // JSON has no NaN or infinity; serde_json would write them as null.
        if let Some(index) = embedding.values.iter().position(|v| !v.is_finite()) {
            return Err(StoreError::NonFinite { index });
        }

        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(name);
        let overwritten = path.exists();
        if overwritten {
            tracing::info!(name = %name, path = %path.display(), "overwriting existing encoding");
        }

        let profile = PersonProfile {
            name: name.as_str().to_string(),
            embedding: embedding.clone(),
            samples,
            trained_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&profile).map_err(|source| StoreError::Malformed {
            path: path.clone(),
            source,
        })?;

        let tmp = self.dir.join(format!(".{}.{PROFILE_EXTENSION}.tmp", name.as_str()));
        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            name = %name,
            path = %path.display(),
            samples,
            dim = embedding.dim(),
            "saved encoding"
        );

        Ok(SavedProfile { path, overwritten })
    }

    /// Read the stored profile for `name`, if there is one.
    pub fn load(&self, name: &PersonName) -> Result<Option<PersonProfile>, StoreError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        read_profile(&path).map(Some)
    }

    /// All stored profiles, sorted by name. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<PersonProfile>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut profiles = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_profile = path.extension().and_then(|e| e.to_str()) == Some(PROFILE_EXTENSION)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_profile {
                continue;
            }
            match read_profile(&path) {
                Ok(profile) => profiles.push(profile),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable profile"),
            }
        }

        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }
}

fn read_profile(path: &Path) -> Result<PersonProfile, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
