//! Training orchestration: images or frames → embeddings → mean → profile.

use crate::preview::{Preview, PreviewControl};
use facetrain_core::input::{self, ImageSource};
use facetrain_core::{
    average, AggregateError, Embedding, FaceEncoder, InputError, PersonName, ProfileStore,
    StoreError,
};
use facetrain_hw::FrameSource;
use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("saving failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainOutcome {
    Saved {
        path: PathBuf,
        samples: usize,
        overwritten: bool,
    },
    /// Nothing was captured, so nothing was written.
    NoEmbeddings,
}

/// Runs training sessions against one encoder and one profile store.
pub struct Trainer<E> {
    encoder: E,
    store: ProfileStore,
    capture_target: usize,
}

impl<E: FaceEncoder> Trainer<E> {
    pub fn new(encoder: E, store: ProfileStore, capture_target: usize) -> Self {
        Self {
            encoder,
            store,
            capture_target: capture_target.max(1),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Train `name` from a single image file or a directory of images.
    ///
    /// Unreadable images are skipped. An invalid path or an image-less
    /// directory aborts before anything is written.
    pub fn train_from_path(&mut self, name: &PersonName, path: &str) -> Result<TrainOutcome, TrainError> {
        let source = input::resolve(path)?;
        if let ImageSource::Directory { dir, images } = &source {
            tracing::info!(count = images.len(), dir = %dir.display(), "processing images from folder");
        }

        let mut embeddings = Vec::new();
        for image_path in source.images() {
            let image = match input::load_image(image_path) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping image");
                    continue;
                }
            };
            let label = image_path.display().to_string();
            match self.encode(&image, &label) {
                Some(found) if found.is_empty() => tracing::info!(image = %label, "no faces detected"),
                Some(found) => embeddings.extend(found),
                None => {}
            }
        }

        self.finish(name, &embeddings)
    }

    /// Train `name` from live frames until `capture_target` embeddings are
    /// collected, the preview reports an interrupt, or a frame read fails.
    pub fn train_from_camera<S, P>(
        &mut self,
        name: &PersonName,
        source: &mut S,
        preview: &mut P,
    ) -> Result<TrainOutcome, TrainError>
    where
        S: FrameSource,
        P: Preview,
    {
        let target = self.capture_target;
        tracing::info!(name = %name, target, "starting webcam training, look at the camera");

        let mut embeddings: Vec<Embedding> = Vec::with_capacity(target);
        while embeddings.len() < target {
            let frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "error accessing the camera");
                    break;
                }
            };

            let label = format!("frame {}", frame.sequence);
            let remaining = target - embeddings.len();
            let found = self.encode(&frame.image, &label).unwrap_or_default();
            if found.is_empty() {
                tracing::debug!(frame = frame.sequence, "no faces detected");
            }
            for embedding in found.into_iter().take(remaining) {
                embeddings.push(embedding);
                tracing::info!(name = %name, captured = embeddings.len(), target, "captured encoding");
            }

            match preview.show(&frame, embeddings.len(), target) {
                Ok(PreviewControl::Continue) => {}
                Ok(PreviewControl::Interrupt) => {
                    tracing::info!(captured = embeddings.len(), "training interrupted by user");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "preview failed, stopping capture");
                    break;
                }
            }
        }

        self.finish(name, &embeddings)
    }

    /// Encode one image. `None` means the encoder failed, which is logged.
    fn encode(&mut self, image: &RgbImage, label: &str) -> Option<Vec<Embedding>> {
        match self.encoder.encode(image) {
            Ok(found) => {
                tracing::debug!(image = label, faces = found.len(), "encoded image");
                Some(found)
            }
            Err(e) => {
                tracing::warn!(image = label, error = %e, "face encoding failed");
                None
            }
        }
    }

    fn finish(&self, name: &PersonName, embeddings: &[Embedding]) -> Result<TrainOutcome, TrainError> {
        let Some(mean) = average(embeddings)? else {
            tracing::info!(name = %name, "no encodings captured, nothing saved");
            return Ok(TrainOutcome::NoEmbeddings);
        };

        let saved = self.store.save(name, &mean, embeddings.len())?;
        Ok(TrainOutcome::Saved {
            path: saved.path,
            samples: embeddings.len(),
            overwritten: saved.overwritten,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::{HeadlessPreview, PreviewError};
    use facetrain_core::EncoderError;
    use facetrain_hw::{CameraError, Frame};
    use image::Rgb;
    use std::path::Path;

    /// One embedding per face; an image encodes as many faces as the green
    /// channel of its top-left pixel, each `[red, index]`.
    struct PixelEncoder {
        calls: usize,
    }

    impl FaceEncoder for PixelEncoder {
        fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncoderError> {
            self.calls += 1;
            let [r, faces, _] = image.get_pixel(0, 0).0;
            Ok((0..faces)
                .map(|i| Embedding::new(vec![r as f32, i as f32]))
                .collect())
        }
    }

    fn face_image(red: u8, faces: u8) -> RgbImage {
        RgbImage::from_pixel(4, 4, Rgb([red, faces, 0]))
    }

    fn trainer(dir: &Path, target: usize) -> Trainer<PixelEncoder> {
        Trainer::new(PixelEncoder { calls: 0 }, ProfileStore::new(dir.join("enc")), target)
    }

    fn name(s: &str) -> PersonName {
        PersonName::parse(s).unwrap()
    }

    /// Endless frames of one image; fails after `fail_after` frames if set.
    struct ScriptedSource {
        image: RgbImage,
        served: u32,
        fail_after: Option<u32>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Frame, CameraError> {
            if Some(self.served) == self.fail_after {
                return Err(CameraError::CaptureFailed("unplugged".into()));
            }
            self.served += 1;
            Ok(Frame::new(self.image.clone(), self.served))
        }
    }

    fn source(image: RgbImage) -> ScriptedSource {
        ScriptedSource { image, served: 0, fail_after: None }
    }

    /// Records counters; interrupts once `interrupt_at` embeddings are in.
    #[derive(Default)]
    struct ScriptedPreview {
        interrupt_at: Option<usize>,
        shown: Vec<usize>,
    }

    impl Preview for ScriptedPreview {
        fn show(&mut self, _frame: &Frame, captured: usize, _target: usize) -> Result<PreviewControl, PreviewError> {
            self.shown.push(captured);
            if Some(captured) == self.interrupt_at {
                Ok(PreviewControl::Interrupt)
            } else {
                Ok(PreviewControl::Continue)
            }
        }
    }

    #[test]
    fn test_directory_without_images_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let photos = tmp.path().join("photos");
        std::fs::create_dir(&photos).unwrap();
        std::fs::write(photos.join("a.gif"), b"gif").unwrap();
        std::fs::write(photos.join("b.txt"), b"txt").unwrap();

        let mut t = trainer(tmp.path(), 10);
        let err = t.train_from_path(&name("alice"), photos.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, TrainError::Input(InputError::NoImages(_))));
        assert!(!tmp.path().join("enc").exists());
    }

    #[test]
    fn test_invalid_path_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let missing = tmp.path().join("missing");
        let err = t.train_from_path(&name("alice"), missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, TrainError::Input(InputError::InvalidPath(_))));
        assert!(!tmp.path().join("enc").exists());
    }

    #[test]
    fn test_single_face_single_image_is_raw_embedding() {
        let tmp = tempfile::tempdir().unwrap();
        let photos = tmp.path().join("photos");
        std::fs::create_dir(&photos).unwrap();
        face_image(77, 1).save(photos.join("only.png")).unwrap();

        let mut t = trainer(tmp.path(), 10);
        let outcome = t.train_from_path(&name("bob"), photos.to_str().unwrap()).unwrap();
        assert!(matches!(outcome, TrainOutcome::Saved { samples: 1, overwritten: false, .. }));

        let profile = t.store().load(&name("bob")).unwrap().unwrap();
        assert_eq!(profile.embedding, Embedding::new(vec![77.0, 0.0]));
    }

    #[test]
    fn test_directory_skips_unreadable_and_averages_all_faces() {
        let tmp = tempfile::tempdir().unwrap();
        let photos = tmp.path().join("photos");
        std::fs::create_dir(&photos).unwrap();
        face_image(10, 2).save(photos.join("a.png")).unwrap();
        std::fs::write(photos.join("b.jpg"), b"corrupt").unwrap();
        face_image(40, 1)
            .save_with_format(photos.join("c.PNG"), image::ImageFormat::Png)
            .unwrap();
        face_image(99, 0).save(photos.join("d.png")).unwrap();

        let mut t = trainer(tmp.path(), 10);
        let outcome = t.train_from_path(&name("carol"), photos.to_str().unwrap()).unwrap();
        assert!(matches!(outcome, TrainOutcome::Saved { samples: 3, .. }));
        // Three decodable images were encoded; the corrupt one never reached the encoder.
        assert_eq!(t.encoder.calls, 3);

        // [10,0], [10,1], [40,0] → mean [20, 1/3]
        let profile = t.store().load(&name("carol")).unwrap().unwrap();
        assert!((profile.embedding.values[0] - 20.0).abs() < 1e-5);
        assert!((profile.embedding.values[1] - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_unreadable_single_file_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("broken.jpg");
        std::fs::write(&file, b"junk").unwrap();

        let mut t = trainer(tmp.path(), 10);
        let outcome = t.train_from_path(&name("dave"), file.to_str().unwrap()).unwrap();
        assert_eq!(outcome, TrainOutcome::NoEmbeddings);
        assert!(!tmp.path().join("enc").exists());
    }

    #[test]
    fn test_faceless_image_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("empty.png");
        face_image(5, 0).save(&file).unwrap();

        let mut t = trainer(tmp.path(), 10);
        let outcome = t.train_from_path(&name("erin"), file.to_str().unwrap()).unwrap();
        assert_eq!(outcome, TrainOutcome::NoEmbeddings);
        assert!(t.store().load(&name("erin")).unwrap().is_none());
    }

    #[test]
    fn test_retraining_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first.png");
        let second = tmp.path().join("second.png");
        face_image(1, 1).save(&first).unwrap();
        face_image(200, 1).save(&second).unwrap();

        let mut t = trainer(tmp.path(), 10);
        t.train_from_path(&name("finn"), first.to_str().unwrap()).unwrap();
        let outcome = t.train_from_path(&name("finn"), second.to_str().unwrap()).unwrap();
        assert!(matches!(outcome, TrainOutcome::Saved { overwritten: true, .. }));

        let profile = t.store().load(&name("finn")).unwrap().unwrap();
        assert_eq!(profile.embedding.values, vec![200.0, 0.0]);
    }

    #[test]
    fn test_webcam_stops_at_target() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let mut src = source(face_image(50, 1));
        let mut preview = ScriptedPreview::default();

        let outcome = t.train_from_camera(&name("gail"), &mut src, &mut preview).unwrap();
        assert!(matches!(outcome, TrainOutcome::Saved { samples: 10, .. }));
        assert_eq!(src.served, 10);
        assert_eq!(preview.shown, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_webcam_caps_extra_faces_in_last_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let mut src = source(face_image(50, 3));
        let mut preview = ScriptedPreview::default();

        let outcome = t.train_from_camera(&name("hana"), &mut src, &mut preview).unwrap();
        assert!(matches!(outcome, TrainOutcome::Saved { samples: 10, .. }));
        assert_eq!(src.served, 4);
        assert_eq!(preview.shown, vec![3, 6, 9, 10]);
    }

    #[test]
    fn test_webcam_interrupt_keeps_what_was_captured() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let mut src = source(face_image(50, 1));
        let mut preview = ScriptedPreview { interrupt_at: Some(3), ..Default::default() };

        let outcome = t.train_from_camera(&name("ivan"), &mut src, &mut preview).unwrap();
        assert!(matches!(outcome, TrainOutcome::Saved { samples: 3, .. }));
        let profile = t.store().load(&name("ivan")).unwrap().unwrap();
        assert_eq!(profile.samples, 3);
        assert_eq!(profile.embedding.values, vec![50.0, 0.0]);
    }

    #[test]
    fn test_webcam_read_failure_saves_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let mut src = ScriptedSource { fail_after: Some(4), ..source(face_image(8, 1)) };
        let mut preview = ScriptedPreview::default();

        let outcome = t.train_from_camera(&name("jade"), &mut src, &mut preview).unwrap();
        assert!(matches!(outcome, TrainOutcome::Saved { samples: 4, .. }));
    }

    #[test]
    fn test_webcam_immediate_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let mut src = ScriptedSource { fail_after: Some(0), ..source(face_image(8, 1)) };
        let mut preview = ScriptedPreview::default();

        let outcome = t.train_from_camera(&name("kai"), &mut src, &mut preview).unwrap();
        assert_eq!(outcome, TrainOutcome::NoEmbeddings);
        assert!(preview.shown.is_empty());
        assert!(!tmp.path().join("enc").exists());
    }

    #[test]
    fn test_webcam_faceless_frames_until_interrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let mut src = source(face_image(8, 0));
        let mut preview = ScriptedPreview { interrupt_at: Some(0), ..Default::default() };

        let outcome = t.train_from_camera(&name("lee"), &mut src, &mut preview).unwrap();
        assert_eq!(outcome, TrainOutcome::NoEmbeddings);
        assert_eq!(src.served, 1);
    }

    #[test]
    fn test_headless_capture_without_faces_gives_up() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path(), 10);
        let mut src = source(face_image(8, 0));
        let mut preview = HeadlessPreview::new(5);

        let outcome = t.train_from_camera(&name("mia"), &mut src, &mut preview).unwrap();
        assert_eq!(outcome, TrainOutcome::NoEmbeddings);
        assert_eq!(src.served, 6);
        assert!(!tmp.path().join("enc").exists());
    }
}
