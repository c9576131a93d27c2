mod ultraface;

pub use ultraface::UltraFaceDetector;

use image::DynamicImage;
use thiserror::Error;

/// Bounding box of a detected face, in pixels of the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("session mutex poisoned: {0}")]
    SessionPoisoned(String),
    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("unexpected model output: {0}")]
    OutputShape(String),
}

/// Pluggable face detection backend.
///
/// The scorer only cares whether a frame yields at least one box, but
/// implementations return the full detections so callers can log or
/// inspect them.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>, DetectorError>;
}
