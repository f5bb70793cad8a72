use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facetrain_core::{FaceEncoder, FacePolicy, OnnxFaceEncoder, PersonName, ProfileStore};
use facetrain_hw::Camera;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

mod config;
mod logging;
mod preview;
mod session;
mod trainer;

use config::Config;
use logging::LogSink;
use preview::{HeadlessPreview, TerminalPreview};
use session::TrainRequest;
use trainer::{TrainError, TrainOutcome, Trainer};

#[derive(Parser)]
#[command(name = "facetrain", about = "Train face-recognition profiles from a webcam or image files")]
struct Cli {
    /// TOML config file (default: $FACETRAIN_CONFIG if set)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
    /// Directory where trained profiles are written
    #[arg(long, global = true)]
    encodings_dir: Option<PathBuf>,
    /// V4L2 device used for webcam training
    #[arg(long, global = true)]
    camera: Option<String>,
    /// Faces used per image: "all" or "largest"
    #[arg(long, global = true)]
    face_policy: Option<FacePolicy>,
    /// Embeddings to collect per webcam session
    #[arg(long, global = true)]
    capture_target: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively train people from a webcam or image files (default)
    Train,
    /// List trained profiles
    List,
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let file = self
            .config
            .clone()
            .or_else(|| std::env::var_os("FACETRAIN_CONFIG").map(PathBuf::from));
        let mut config = Config::load(file.as_deref())?;

        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(dir) = &self.encodings_dir {
            config.encodings_dir = dir.clone();
        }
        if let Some(device) = &self.camera {
            config.camera_device = device.clone();
        }
        if let Some(policy) = self.face_policy {
            config.face_policy = policy;
        }
        if let Some(target) = self.capture_target {
            config.capture_target = target;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let logs = logging::init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command.unwrap_or(Commands::Train) {
        Commands::Train => train(&config, &logs),
        Commands::List => list(&config),
    }
}

fn train(config: &Config, logs: &LogSink) -> Result<()> {
    let encoder = OnnxFaceEncoder::load(&config.model_dir, config.face_policy)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))?;
    tracing::info!(
        model_dir = %config.model_dir.display(),
        encodings_dir = %config.encodings_dir.display(),
        policy = %config.face_policy,
        "models loaded"
    );

    let store = ProfileStore::new(&config.encodings_dir);
    let mut trainer = Trainer::new(encoder, store, config.capture_target);

    session::run_session(io::stdin().lock(), io::stdout(), |request| match request {
        TrainRequest::Webcam { name } => {
            let outcome = train_from_webcam(&mut trainer, &name, &config.camera_device, logs);
            summarize(&name, outcome)
        }
        TrainRequest::Path { name, path } => {
            let outcome = trainer.train_from_path(&name, &path);
            summarize(&name, outcome)
        }
    })
    .context("interactive session failed")?;

    Ok(())
}

/// Open the camera and preview for one session. Both are released when this
/// returns, whichever way the capture loop ended.
fn train_from_webcam<E: FaceEncoder>(
    trainer: &mut Trainer<E>,
    name: &PersonName,
    device: &str,
    logs: &LogSink,
) -> Result<TrainOutcome, TrainError> {
    let camera = match Camera::open(device) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::warn!(device, error = %e, "error accessing the camera");
            return Ok(TrainOutcome::NoEmbeddings);
        }
    };
    let mut stream = match camera.stream() {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(device, error = %e, "error accessing the camera");
            return Ok(TrainOutcome::NoEmbeddings);
        }
    };

    let terminal = if io::stdout().is_terminal() {
        TerminalPreview::open(logs)
            .map_err(|e| tracing::warn!(error = %e, "terminal preview unavailable"))
            .ok()
    } else {
        None
    };

    match terminal {
        Some(mut preview) => trainer.train_from_camera(name, &mut stream, &mut preview),
        None => trainer.train_from_camera(name, &mut stream, &mut HeadlessPreview::default()),
    }
}

fn summarize(name: &PersonName, outcome: Result<TrainOutcome, TrainError>) -> String {
    match outcome {
        Ok(TrainOutcome::Saved { path, samples, overwritten }) => {
            let replaced = if overwritten { ", replacing the previous encoding" } else { "" };
            format!(
                "Training for {name} completed and saved at {} ({samples} encodings averaged{replaced}).",
                path.display()
            )
        }
        Ok(TrainOutcome::NoEmbeddings) => {
            format!("No face encodings captured for {name}; nothing saved.")
        }
        Err(e) => {
            tracing::warn!(name = %name, error = %e, "training aborted");
            format!("Training for {name} aborted: {e}")
        }
    }
}

fn list(config: &Config) -> Result<()> {
    let store = ProfileStore::new(&config.encodings_dir);
    let profiles = store
        .list()
        .with_context(|| format!("reading profiles from {}", store.dir().display()))?;

    if profiles.is_empty() {
        println!("No trained profiles in {}", store.dir().display());
        return Ok(());
    }

    for profile in profiles {
        println!(
            "{}\t{} samples\t{} dims\t{}\t{}",
            profile.name,
            profile.samples,
            profile.embedding.dim(),
            profile.embedding.model_version.as_deref().unwrap_or("-"),
            profile.trained_at.to_rfc3339(),
        );
    }
    Ok(())
}
