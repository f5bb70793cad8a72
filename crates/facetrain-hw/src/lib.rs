//! facetrain-hw: hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access and conversion of the negotiated
//! pixel format to RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, PixelFormat};
pub use frame::{Frame, FrameError};

/// A source of colour frames, read one at a time.
///
/// Implemented by [`CameraStream`]; tests feed scripted frames instead.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, CameraError>;
}
