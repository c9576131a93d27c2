use crate::detector::FaceDetector;
use crate::frame;
use serde::Serialize;
use std::sync::Arc;

/// Minimum fraction of submitted frames with a detected face, in percent,
/// for the verification to pass. The boundary is inclusive.
pub const APPROVE_THRESHOLD_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "Approve",
            Decision::Decline => "Decline",
        }
    }
}

/// Outcome of scoring one burst of frames. Computed per request, never
/// persisted.
#[derive(Debug, Clone)]
pub struct PresenceReport {
    pub frames_analyzed: usize,
    pub frames_with_detection: usize,
    pub presence_percent: f64,
    pub decision: Decision,
    pub message: String,
}

impl PresenceReport {
    /// A Decline report carrying an explanation, used for empty requests
    /// and for request-level failures.
    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            frames_analyzed: 0,
            frames_with_detection: 0,
            presence_percent: 0.0,
            decision: Decision::Decline,
            message: message.into(),
        }
    }
}

pub struct PresenceScorer {
    detector: Arc<dyn FaceDetector>,
}

impl PresenceScorer {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    /// Score an ordered burst of data-URL frames.
    ///
    /// Frames that fail to decode or that make the detector error are
    /// logged and skipped; they still count toward `frames_analyzed`,
    /// which reflects the submitted count, but never toward
    /// `frames_with_detection`.
    pub fn score(&self, frames: &[String]) -> PresenceReport {
        let frames_analyzed = frames.len();
        tracing::info!("Analyzing {} frames for person presence", frames_analyzed);

        if frames_analyzed == 0 {
            return PresenceReport::declined("No frames received");
        }

        let mut frames_with_detection = 0;
        for (index, data) in frames.iter().enumerate() {
            let image = match frame::decode_data_url(data) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(frame = index, error = %e, "Skipping frame that failed to decode");
                    continue;
                }
            };

            match self.detector.detect(&image) {
                Ok(faces) if !faces.is_empty() => {
                    tracing::debug!(frame = index, faces = faces.len(), "Person detected");
                    frames_with_detection += 1;
                }
                Ok(_) => {
                    tracing::debug!(frame = index, "No person detected");
                }
                Err(e) => {
                    tracing::warn!(frame = index, error = %e, "Skipping frame that failed detection");
                }
            }
        }

        let presence_percent = 100.0 * frames_with_detection as f64 / frames_analyzed as f64;
        let (decision, message) = if presence_percent >= APPROVE_THRESHOLD_PERCENT {
            (
                Decision::Approve,
                format!("Person consistently present ({presence_percent:.1}% frames)."),
            )
        } else {
            (
                Decision::Decline,
                format!("Person not consistently present ({presence_percent:.1}% frames)."),
            )
        };

        tracing::info!(
            frames_analyzed,
            frames_with_detection,
            presence_percent,
            decision = decision.as_str(),
            "Presence scored"
        );

        PresenceReport {
            frames_analyzed,
            frames_with_detection,
            presence_percent,
            decision,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectorError, FaceBox, FaceDetector};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Detector that replays a script of per-frame outcomes: `Ok(n)` for
    /// n detected faces, `Err(())` for a detector failure.
    struct ScriptedDetector {
        outcomes: Mutex<VecDeque<Result<usize, ()>>>,
    }

    impl ScriptedDetector {
        fn new(outcomes: impl IntoIterator<Item = Result<usize, ()>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
            })
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<FaceBox>, DetectorError> {
            match self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(0)) {
                Ok(faces) => Ok(vec![
                    FaceBox {
                        x1: 10.0,
                        y1: 10.0,
                        x2: 50.0,
                        y2: 50.0,
                        confidence: 0.9,
                    };
                    faces
                ]),
                Err(()) => Err(DetectorError::OutputShape("scripted failure".into())),
            }
        }
    }

    fn scorer(outcomes: impl IntoIterator<Item = Result<usize, ()>>) -> PresenceScorer {
        PresenceScorer::new(ScriptedDetector::new(outcomes))
    }

    fn jpeg_frame() -> String {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(32, 32, Rgb([128, 128, 128]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .unwrap();
        format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes))
    }

    fn frames(count: usize) -> Vec<String> {
        (0..count).map(|_| jpeg_frame()).collect()
    }

    #[test]
    fn test_approves_when_most_frames_have_a_face() {
        let outcomes = std::iter::repeat(Ok(1))
            .take(6)
            .chain(std::iter::repeat(Ok(0)).take(4));

        let report = scorer(outcomes).score(&frames(10));

        assert_eq!(report.decision, Decision::Approve);
        assert_eq!(report.presence_percent, 60.0);
        assert_eq!(report.frames_analyzed, 10);
        assert_eq!(report.frames_with_detection, 6);
    }

    #[test]
    fn test_declines_when_presence_below_threshold() {
        let outcomes = std::iter::repeat(Ok(1))
            .take(4)
            .chain(std::iter::repeat(Ok(0)).take(6));

        let report = scorer(outcomes).score(&frames(10));

        assert_eq!(report.decision, Decision::Decline);
        assert_eq!(report.presence_percent, 40.0);
    }

    #[test]
    fn test_declines_empty_request() {
        let report = scorer([]).score(&[]);

        assert_eq!(report.decision, Decision::Decline);
        assert_eq!(report.presence_percent, 0.0);
        assert_eq!(report.frames_analyzed, 0);
        assert_eq!(report.message, "No frames received");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let outcomes = std::iter::repeat(Ok(1))
            .take(5)
            .chain(std::iter::repeat(Ok(0)).take(5));

        let report = scorer(outcomes).score(&frames(10));

        assert_eq!(report.decision, Decision::Approve);
        assert_eq!(report.presence_percent, 50.0);
        assert!(report.message.contains("50.0% frames"));
    }

    #[test]
    fn test_undecodable_frame_counts_toward_total_only() {
        let mut input = frames(9);
        input.insert(3, "data:image/jpeg;base64,not-valid-base64!!".to_string());

        // The detector only ever sees the nine decodable frames.
        let report = scorer(std::iter::repeat(Ok(1)).take(9)).score(&input);

        assert_eq!(report.frames_analyzed, 10);
        assert_eq!(report.frames_with_detection, 9);
        assert_eq!(report.presence_percent, 90.0);
        assert_eq!(report.decision, Decision::Approve);
    }

    #[test]
    fn test_detector_failure_skips_frame() {
        let report = scorer([Err(()), Ok(1), Ok(0)]).score(&frames(3));

        assert_eq!(report.frames_analyzed, 3);
        assert_eq!(report.frames_with_detection, 1);
        assert_eq!(report.decision, Decision::Decline);
        assert!((report.presence_percent - 100.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_presence_percent_stays_in_range() {
        let all = scorer(std::iter::repeat(Ok(2)).take(5)).score(&frames(5));
        assert_eq!(all.presence_percent, 100.0);

        let none = scorer(std::iter::repeat(Ok(0)).take(5)).score(&frames(5));
        assert_eq!(none.presence_percent, 0.0);

        for with_face in 0..=7 {
            let outcomes = std::iter::repeat(Ok(1))
                .take(with_face)
                .chain(std::iter::repeat(Ok(0)).take(7 - with_face));
            let report = scorer(outcomes).score(&frames(7));
            assert!((0.0..=100.0).contains(&report.presence_percent));
        }
    }
}
