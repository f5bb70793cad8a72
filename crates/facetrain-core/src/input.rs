//! Input resolution: turn a user-supplied path into a list of images.

use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions accepted when scanning a directory (compared lowercase).
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),
    #[error("no valid images found in folder: {0}")]
    NoImages(PathBuf),
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not determine current directory: {0}")]
    CurrentDir(std::io::Error),
}

/// What a resolved path points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Directory { dir: PathBuf, images: Vec<PathBuf> },
}

impl ImageSource {
    /// Image paths to process, in order.
    pub fn images(&self) -> &[PathBuf] {
        match self {
            ImageSource::File(path) => std::slice::from_ref(path),
            ImageSource::Directory { images, .. } => images,
        }
    }
}

/// Classify `path` as a single image, a directory of images, or invalid.
///
/// Relative paths are made absolute against the current directory.
/// Directory scanning is non-recursive and sorted by path.
pub fn resolve(path: &str) -> Result<ImageSource, InputError> {
    let resolved = absolute(Path::new(path.trim()))?;
    tracing::info!(path = %resolved.display(), "resolved input path");

    if resolved.is_file() {
        return Ok(ImageSource::File(resolved));
    }
    if !resolved.is_dir() {
        return Err(InputError::InvalidPath(resolved));
    }

    let entries = std::fs::read_dir(&resolved).map_err(|source| InputError::ReadDir {
        path: resolved.clone(),
        source,
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    images.sort();

    if images.is_empty() {
        return Err(InputError::NoImages(resolved));
    }

    tracing::info!(count = images.len(), dir = %resolved.display(), "found images");
    Ok(ImageSource::Directory {
        dir: resolved,
        images,
    })
}

/// Decode an image file into 8-bit RGB.
///
/// The format is sniffed from the file contents, so a mislabelled extension
/// does not stop a decodable image from loading.
pub fn load_image(path: &Path) -> Result<RgbImage, InputError> {
    image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::from)
        .and_then(|reader| reader.decode())
        .map(|img| img.to_rgb8())
        .map_err(|source| InputError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn absolute(path: &Path) -> Result<PathBuf, InputError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().map_err(InputError::CurrentDir)?;
        Ok(cwd.join(path))
    }
}
